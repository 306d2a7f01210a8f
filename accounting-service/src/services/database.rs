//! Postgres-backed [`RecordStore`].
//!
//! The schema is owned by the hosted database; this module only reads and
//! writes rows. Sales are stored flat: product-specific columns are nullable
//! and only the group matching `product_type` is populated.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{info, instrument};
use uuid::Uuid;

use super::store::RecordStore;
use crate::models::{
    AirTicketDetails, ApprovalStatus, Customer, DateRange, DerivedFields, Expense,
    ExpenseCategory, HotelDetails, PaymentStatus, ProductDetails, ProductType, Sale,
    ShipSelection, ShipTicketDetails, TourPackageDetails, TripType, Vendor, VisaDetails,
};

fn observe(query: &'static str, started: Instant) {
    metrics::histogram!("db_query_duration_seconds", "query" => query)
        .record(started.elapsed().as_secs_f64());
}

/// Keep the backend's message: callers see it in the error details.
fn db_error(context: &str, err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("{}: {}", context, db_err.message()))
        }
        _ => AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, err)),
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[instrument(skip(database_url), fields(service = "accounting-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }
}

// -----------------------------------------------------------------------------
// Row mapping
// -----------------------------------------------------------------------------

const EXPENSE_COLUMNS: &str = "id, user_id, date, category_id, amount, currency, paid_through, \
     tax_amount, tax_percentage, vendor, reference_number, notes, customer_name, \
     attachment_urls, approval_status, tags, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ExpenseRow {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    category_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    paid_through: Option<String>,
    tax_amount: Option<Decimal>,
    tax_percentage: Option<Decimal>,
    vendor: Option<String>,
    reference_number: Option<String>,
    notes: Option<String>,
    customer_name: Option<String>,
    attachment_urls: Option<Vec<String>>,
    approval_status: String,
    tags: Option<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            category_id: row.category_id,
            amount: row.amount,
            currency: row.currency,
            paid_through: row.paid_through,
            tax_amount: row.tax_amount,
            tax_percentage: row.tax_percentage,
            vendor: row.vendor,
            reference_number: row.reference_number,
            notes: row.notes,
            customer_name: row.customer_name,
            attachment_urls: row.attachment_urls.unwrap_or_default(),
            approval_status: ApprovalStatus::from_string(&row.approval_status),
            tags: row.tags.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SALE_COLUMNS: &str = "id, user_id, transaction_date, product_type, customer_id, \
     customer_name, customer_phone, customer_email, sale_amount, cogs, transaction_fee_percent, \
     payment_received, payment_status, transaction_fee_amount, profit_loss, net_profit_loss, \
     profit_margin, net_profit_margin, outstanding_balance, attachment_urls, notes, \
     route_from, route_to, passenger_count, departure_date, return_date, airline, \
     hotel_name, room_count, night_count, checkin_date, checkout_date, \
     destinations, duration_days, visa_country, visa_type, visa_status, \
     trip_type, ship_selections, commission_percent, travel_date, created_at, updated_at";

#[derive(Debug, Default, FromRow)]
struct SaleRow {
    id: Uuid,
    user_id: Uuid,
    transaction_date: NaiveDate,
    product_type: String,
    customer_id: Option<Uuid>,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    sale_amount: Decimal,
    cogs: Decimal,
    transaction_fee_percent: Decimal,
    payment_received: Decimal,
    payment_status: String,
    transaction_fee_amount: Decimal,
    profit_loss: Decimal,
    net_profit_loss: Decimal,
    profit_margin: Decimal,
    net_profit_margin: Decimal,
    outstanding_balance: Decimal,
    attachment_urls: Option<Vec<String>>,
    notes: Option<String>,
    route_from: Option<String>,
    route_to: Option<String>,
    passenger_count: Option<i32>,
    departure_date: Option<NaiveDate>,
    return_date: Option<NaiveDate>,
    airline: Option<String>,
    hotel_name: Option<String>,
    room_count: Option<i32>,
    night_count: Option<i32>,
    checkin_date: Option<NaiveDate>,
    checkout_date: Option<NaiveDate>,
    destinations: Option<Vec<String>>,
    duration_days: Option<i32>,
    visa_country: Option<String>,
    visa_type: Option<String>,
    visa_status: Option<String>,
    trip_type: Option<String>,
    ship_selections: Option<serde_json::Value>,
    commission_percent: Option<Decimal>,
    travel_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn count(value: Option<i32>, default: u32) -> u32 {
    value
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Ship selections are stored as a JSON array. Rows written by older clients
/// hold the same array encoded as a JSON string; anything else is rejected
/// instead of guessed at.
fn decode_ship_selections(value: Option<serde_json::Value>) -> Result<Vec<ShipSelection>, AppError> {
    let invalid = |e: serde_json::Error| {
        AppError::DatabaseError(anyhow::anyhow!("Invalid ship_selections column: {}", e))
    };

    match value {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::String(encoded)) => serde_json::from_str(&encoded).map_err(invalid),
        Some(array) => serde_json::from_value(array).map_err(invalid),
    }
}

impl TryFrom<SaleRow> for Sale {
    type Error = AppError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        let product_type = ProductType::parse(&row.product_type).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Unknown product_type '{}' on sale {}",
                row.product_type,
                row.id
            ))
        })?;

        let details = match product_type {
            ProductType::AirTicket => ProductDetails::AirTicket(AirTicketDetails {
                route_from: row.route_from.unwrap_or_default(),
                route_to: row.route_to.unwrap_or_default(),
                passenger_count: count(row.passenger_count, 1),
                departure_date: row.departure_date,
                return_date: row.return_date,
                airline: row.airline,
            }),
            ProductType::Hotel => ProductDetails::Hotel(HotelDetails {
                hotel_name: row.hotel_name.unwrap_or_default(),
                room_count: count(row.room_count, 1),
                night_count: count(row.night_count, 1),
                checkin_date: row.checkin_date,
                checkout_date: row.checkout_date,
            }),
            ProductType::TourPackage => ProductDetails::TourPackage(TourPackageDetails {
                destinations: row.destinations.unwrap_or_default(),
                duration_days: count(row.duration_days, 0),
            }),
            ProductType::Visa => ProductDetails::Visa(VisaDetails {
                visa_country: row.visa_country.unwrap_or_default(),
                visa_type: row.visa_type,
                visa_status: row.visa_status.unwrap_or_else(|| "Processing".to_string()),
            }),
            ProductType::ShipTicket => ProductDetails::ShipTicket(ShipTicketDetails {
                trip_type: row
                    .trip_type
                    .as_deref()
                    .map(TripType::from_string)
                    .unwrap_or_default(),
                ship_selections: decode_ship_selections(row.ship_selections)?,
                commission_percent: row.commission_percent.unwrap_or_default(),
                travel_date: row.travel_date,
            }),
        };

        Ok(Sale {
            id: row.id,
            user_id: row.user_id,
            transaction_date: row.transaction_date,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_email: row.customer_email,
            sale_amount: row.sale_amount,
            cogs: row.cogs,
            transaction_fee_percent: row.transaction_fee_percent,
            payment_received: row.payment_received,
            payment_status: PaymentStatus::from_string(&row.payment_status),
            details,
            derived: DerivedFields {
                transaction_fee_amount: row.transaction_fee_amount,
                profit_loss: row.profit_loss,
                net_profit_loss: row.net_profit_loss,
                profit_margin: row.profit_margin,
                net_profit_margin: row.net_profit_margin,
                outstanding_balance: row.outstanding_balance,
            },
            attachment_urls: row.attachment_urls.unwrap_or_default(),
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Sale> for SaleRow {
    fn from(sale: &Sale) -> Self {
        let mut row = SaleRow {
            id: sale.id,
            user_id: sale.user_id,
            transaction_date: sale.transaction_date,
            product_type: sale.product_type().as_str().to_string(),
            customer_id: sale.customer_id,
            customer_name: sale.customer_name.clone(),
            customer_phone: sale.customer_phone.clone(),
            customer_email: sale.customer_email.clone(),
            sale_amount: sale.sale_amount,
            cogs: sale.cogs,
            transaction_fee_percent: sale.transaction_fee_percent,
            payment_received: sale.payment_received,
            payment_status: sale.payment_status.as_str().to_string(),
            transaction_fee_amount: sale.derived.transaction_fee_amount,
            profit_loss: sale.derived.profit_loss,
            net_profit_loss: sale.derived.net_profit_loss,
            profit_margin: sale.derived.profit_margin,
            net_profit_margin: sale.derived.net_profit_margin,
            outstanding_balance: sale.derived.outstanding_balance,
            attachment_urls: Some(sale.attachment_urls.clone()),
            notes: sale.notes.clone(),
            created_at: sale.created_at,
            updated_at: sale.updated_at,
            ..Default::default()
        };

        match &sale.details {
            ProductDetails::AirTicket(d) => {
                row.route_from = Some(d.route_from.clone());
                row.route_to = Some(d.route_to.clone());
                row.passenger_count = Some(to_i32(d.passenger_count));
                row.departure_date = d.departure_date;
                row.return_date = d.return_date;
                row.airline = d.airline.clone();
            }
            ProductDetails::Hotel(d) => {
                row.hotel_name = Some(d.hotel_name.clone());
                row.room_count = Some(to_i32(d.room_count));
                row.night_count = Some(to_i32(d.night_count));
                row.checkin_date = d.checkin_date;
                row.checkout_date = d.checkout_date;
            }
            ProductDetails::TourPackage(d) => {
                row.destinations = Some(d.destinations.clone());
                row.duration_days = Some(to_i32(d.duration_days));
            }
            ProductDetails::Visa(d) => {
                row.visa_country = Some(d.visa_country.clone());
                row.visa_type = d.visa_type.clone();
                row.visa_status = Some(d.visa_status.clone());
            }
            ProductDetails::ShipTicket(d) => {
                row.trip_type = Some(d.trip_type.as_str().to_string());
                row.ship_selections = serde_json::to_value(&d.ship_selections).ok();
                row.commission_percent = Some(d.commission_percent);
                row.travel_date = d.travel_date;
            }
        }

        row
    }
}

fn bind_sale<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, SaleRow, sqlx::postgres::PgArguments>,
    row: SaleRow,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, SaleRow, sqlx::postgres::PgArguments> {
    query
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.transaction_date)
        .bind(row.product_type)
        .bind(row.customer_id)
        .bind(row.customer_name)
        .bind(row.customer_phone)
        .bind(row.customer_email)
        .bind(row.sale_amount)
        .bind(row.cogs)
        .bind(row.transaction_fee_percent)
        .bind(row.payment_received)
        .bind(row.payment_status)
        .bind(row.transaction_fee_amount)
        .bind(row.profit_loss)
        .bind(row.net_profit_loss)
        .bind(row.profit_margin)
        .bind(row.net_profit_margin)
        .bind(row.outstanding_balance)
        .bind(row.attachment_urls)
        .bind(row.notes)
        .bind(row.route_from)
        .bind(row.route_to)
        .bind(row.passenger_count)
        .bind(row.departure_date)
        .bind(row.return_date)
        .bind(row.airline)
        .bind(row.hotel_name)
        .bind(row.room_count)
        .bind(row.night_count)
        .bind(row.checkin_date)
        .bind(row.checkout_date)
        .bind(row.destinations)
        .bind(row.duration_days)
        .bind(row.visa_country)
        .bind(row.visa_type)
        .bind(row.visa_status)
        .bind(row.trip_type)
        .bind(row.ship_selections)
        .bind(row.commission_percent)
        .bind(row.travel_date)
        .bind(row.created_at)
        .bind(row.updated_at)
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `col = $n` pairs for every column except the first two (id, user_id),
/// which identify the row.
fn assignments(columns: &str) -> String {
    columns
        .split(',')
        .map(str::trim)
        .enumerate()
        .skip(2)
        .map(|(i, column)| format!("{} = ${}", column, i + 1))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_count(columns: &str) -> usize {
    columns.split(',').count()
}

// -----------------------------------------------------------------------------
// RecordStore
// -----------------------------------------------------------------------------

#[async_trait]
impl RecordStore for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, expense), fields(user_id = %expense.user_id, expense_id = %expense.id))]
    async fn insert_expense(&self, expense: &Expense) -> Result<Expense, AppError> {
        let started = Instant::now();
        let sql = format!(
            "INSERT INTO expenses ({cols}) VALUES ({vals}) RETURNING {cols}",
            cols = EXPENSE_COLUMNS,
            vals = placeholders(column_count(EXPENSE_COLUMNS))
        );
        let row = bind_expense(sqlx::query_as::<_, ExpenseRow>(&sql), expense)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to create expense", e))?;
        observe("insert_expense", started);
        Ok(row.into())
    }

    #[instrument(skip(self, expense), fields(user_id = %expense.user_id, expense_id = %expense.id))]
    async fn update_expense(&self, expense: &Expense) -> Result<Option<Expense>, AppError> {
        let started = Instant::now();
        let sql = format!(
            "UPDATE expenses SET {set} WHERE id = $1 AND user_id = $2 RETURNING {cols}",
            set = assignments(EXPENSE_COLUMNS),
            cols = EXPENSE_COLUMNS
        );
        let row = bind_expense(sqlx::query_as::<_, ExpenseRow>(&sql), expense)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to update expense", e))?;
        observe("update_expense", started);
        Ok(row.map(Expense::from))
    }

    #[instrument(skip(self))]
    async fn delete_expense(&self, user_id: Uuid, id: Uuid) -> Result<Option<Expense>, AppError> {
        let started = Instant::now();
        let sql = format!(
            "DELETE FROM expenses WHERE id = $1 AND user_id = $2 RETURNING {}",
            EXPENSE_COLUMNS
        );
        let row = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete expense", e))?;
        observe("delete_expense", started);
        Ok(row.map(Expense::from))
    }

    #[instrument(skip(self))]
    async fn get_expense(&self, user_id: Uuid, id: Uuid) -> Result<Option<Expense>, AppError> {
        let started = Instant::now();
        let sql = format!(
            "SELECT {} FROM expenses WHERE id = $1 AND user_id = $2",
            EXPENSE_COLUMNS
        );
        let row = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get expense", e))?;
        observe("get_expense", started);
        Ok(row.map(Expense::from))
    }

    #[instrument(skip(self))]
    async fn list_expenses(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<Expense>, AppError> {
        let started = Instant::now();
        let sql = format!(
            r#"
            SELECT {} FROM expenses
            WHERE user_id = $1
              AND ($2::date IS NULL OR date >= $2)
              AND ($3::date IS NULL OR date <= $3)
            ORDER BY date, created_at
            "#,
            EXPENSE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(user_id)
            .bind(range.from)
            .bind(range.to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list expenses", e))?;
        observe("list_expenses", started);
        Ok(rows.into_iter().map(Expense::from).collect())
    }

    #[instrument(skip(self, sale), fields(user_id = %sale.user_id, sale_id = %sale.id))]
    async fn insert_sale(&self, sale: &Sale) -> Result<Sale, AppError> {
        let started = Instant::now();
        let sql = format!(
            "INSERT INTO sales ({cols}) VALUES ({vals}) RETURNING {cols}",
            cols = SALE_COLUMNS,
            vals = placeholders(column_count(SALE_COLUMNS))
        );
        let row = bind_sale(sqlx::query_as::<_, SaleRow>(&sql), SaleRow::from(sale))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to create sale", e))?;
        observe("insert_sale", started);
        Sale::try_from(row)
    }

    #[instrument(skip(self, sale), fields(user_id = %sale.user_id, sale_id = %sale.id))]
    async fn update_sale(&self, sale: &Sale) -> Result<Option<Sale>, AppError> {
        let started = Instant::now();
        let sql = format!(
            "UPDATE sales SET {set} WHERE id = $1 AND user_id = $2 RETURNING {cols}",
            set = assignments(SALE_COLUMNS),
            cols = SALE_COLUMNS
        );
        let row = bind_sale(sqlx::query_as::<_, SaleRow>(&sql), SaleRow::from(sale))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to update sale", e))?;
        observe("update_sale", started);
        row.map(Sale::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn delete_sale(&self, user_id: Uuid, id: Uuid) -> Result<Option<Sale>, AppError> {
        let started = Instant::now();
        let sql = format!(
            "DELETE FROM sales WHERE id = $1 AND user_id = $2 RETURNING {}",
            SALE_COLUMNS
        );
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete sale", e))?;
        observe("delete_sale", started);
        row.map(Sale::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn get_sale(&self, user_id: Uuid, id: Uuid) -> Result<Option<Sale>, AppError> {
        let started = Instant::now();
        let sql = format!(
            "SELECT {} FROM sales WHERE id = $1 AND user_id = $2",
            SALE_COLUMNS
        );
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get sale", e))?;
        observe("get_sale", started);
        row.map(Sale::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_sales(&self, user_id: Uuid, range: DateRange) -> Result<Vec<Sale>, AppError> {
        let started = Instant::now();
        let sql = format!(
            r#"
            SELECT {} FROM sales
            WHERE user_id = $1
              AND ($2::date IS NULL OR transaction_date >= $2)
              AND ($3::date IS NULL OR transaction_date <= $3)
            ORDER BY transaction_date, created_at
            "#,
            SALE_COLUMNS
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(user_id)
            .bind(range.from)
            .bind(range.to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list sales", e))?;
        observe("list_sales", started);
        rows.into_iter().map(Sale::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn find_customer_by_phone(
        &self,
        user_id: Uuid,
        phone: &str,
    ) -> Result<Option<Customer>, AppError> {
        let started = Instant::now();
        let customer = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, user_id, name, phone, email, created_at
            FROM customers
            WHERE user_id = $1 AND phone = $2
            "#,
        )
        .bind(user_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find customer", e))?;
        observe("find_customer_by_phone", started);
        Ok(customer.map(Customer::from))
    }

    #[instrument(skip(self, customer), fields(user_id = %customer.user_id))]
    async fn insert_customer(&self, customer: &Customer) -> Result<Customer, AppError> {
        let started = Instant::now();
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            INSERT INTO customers (id, user_id, name, phone, email, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, name, phone, email, created_at
            "#,
        )
        .bind(customer.id)
        .bind(customer.user_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create customer", e))?;
        observe("insert_customer", started);
        Ok(row.into())
    }

    #[instrument(skip(self, customer), fields(user_id = %customer.user_id, customer_id = %customer.id))]
    async fn update_customer(&self, customer: &Customer) -> Result<Customer, AppError> {
        let started = Instant::now();
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            UPDATE customers SET name = $3, email = $4
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name, phone, email, created_at
            "#,
        )
        .bind(customer.id)
        .bind(customer.user_id)
        .bind(&customer.name)
        .bind(&customer.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update customer", e))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;
        observe("update_customer", started);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn list_customers(&self, user_id: Uuid) -> Result<Vec<Customer>, AppError> {
        let started = Instant::now();
        let rows = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, user_id, name, phone, email, created_at
            FROM customers
            WHERE user_id = $1
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list customers", e))?;
        observe("list_customers", started);
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    #[instrument(skip(self, vendor), fields(user_id = %vendor.user_id))]
    async fn insert_vendor(&self, vendor: &Vendor) -> Result<Vendor, AppError> {
        let started = Instant::now();
        let row = sqlx::query_as::<_, VendorRow>(
            r#"
            INSERT INTO vendors (id, user_id, name, phone, email, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, name, phone, email, notes
            "#,
        )
        .bind(vendor.id)
        .bind(vendor.user_id)
        .bind(&vendor.name)
        .bind(&vendor.phone)
        .bind(&vendor.email)
        .bind(&vendor.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create vendor", e))?;
        observe("insert_vendor", started);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn list_vendors(&self, user_id: Uuid) -> Result<Vec<Vendor>, AppError> {
        let started = Instant::now();
        let rows = sqlx::query_as::<_, VendorRow>(
            "SELECT id, user_id, name, phone, email, notes FROM vendors WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list vendors", e))?;
        observe("list_vendors", started);
        Ok(rows.into_iter().map(Vendor::from).collect())
    }

    #[instrument(skip(self))]
    async fn delete_vendor(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let started = Instant::now();
        let result = sqlx::query("DELETE FROM vendors WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete vendor", e))?;
        observe("delete_vendor", started);
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, category), fields(user_id = %category.user_id))]
    async fn insert_category(
        &self,
        category: &ExpenseCategory,
    ) -> Result<ExpenseCategory, AppError> {
        let started = Instant::now();
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO expense_categories (id, user_id, name, parent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, parent_id
            "#,
        )
        .bind(category.id)
        .bind(category.user_id)
        .bind(&category.name)
        .bind(category.parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create category", e))?;
        observe("insert_category", started);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn get_category(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ExpenseCategory>, AppError> {
        let started = Instant::now();
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, user_id, name, parent_id FROM expense_categories WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get category", e))?;
        observe("get_category", started);
        Ok(row.map(ExpenseCategory::from))
    }

    #[instrument(skip(self))]
    async fn list_categories(&self, user_id: Uuid) -> Result<Vec<ExpenseCategory>, AppError> {
        let started = Instant::now();
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, user_id, name, parent_id FROM expense_categories WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list categories", e))?;
        observe("list_categories", started);
        Ok(rows.into_iter().map(ExpenseCategory::from).collect())
    }

    #[instrument(skip(self))]
    async fn delete_category(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let started = Instant::now();
        let result = sqlx::query("DELETE FROM expense_categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete category", e))?;
        observe("delete_category", started);
        Ok(result.rows_affected() > 0)
    }
}

fn bind_expense<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, ExpenseRow, sqlx::postgres::PgArguments>,
    expense: &Expense,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, ExpenseRow, sqlx::postgres::PgArguments> {
    query
        .bind(expense.id)
        .bind(expense.user_id)
        .bind(expense.date)
        .bind(expense.category_id)
        .bind(expense.amount)
        .bind(expense.currency.clone())
        .bind(expense.paid_through.clone())
        .bind(expense.tax_amount)
        .bind(expense.tax_percentage)
        .bind(expense.vendor.clone())
        .bind(expense.reference_number.clone())
        .bind(expense.notes.clone())
        .bind(expense.customer_name.clone())
        .bind(expense.attachment_urls.clone())
        .bind(expense.approval_status.as_str())
        .bind(expense.tags.clone())
        .bind(expense.created_at)
        .bind(expense.updated_at)
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    phone: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct VendorRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    notes: Option<String>,
}

impl From<VendorRow> for Vendor {
    fn from(row: VendorRow) -> Self {
        Vendor {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            notes: row.notes,
        }
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    parent_id: Option<Uuid>,
}

impl From<CategoryRow> for ExpenseCategory {
    fn from(row: CategoryRow) -> Self {
        ExpenseCategory {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            parent_id: row.parent_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn update_assignments_skip_identity_columns() {
        let set = assignments("id, user_id, name, email");
        assert_eq!(set, "name = $3, email = $4");
        assert_eq!(placeholders(3), "$1, $2, $3");
    }

    #[test]
    fn sale_columns_match_bound_values() {
        // bind_sale binds one value per column, in column order.
        assert_eq!(column_count(SALE_COLUMNS), 43);
        assert_eq!(column_count(EXPENSE_COLUMNS), 18);
    }

    #[test]
    fn ship_selections_accept_array_or_encoded_array() {
        let array = serde_json::json!([
            {"ship_type": "Bay One", "seat_category": "Economy", "quantity": 2, "unit_price": 1600}
        ]);
        let decoded = decode_ship_selections(Some(array.clone())).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].unit_price, Some(dec!(1600)));

        let encoded = serde_json::Value::String(array.to_string());
        assert_eq!(decode_ship_selections(Some(encoded)).unwrap(), decoded);

        assert!(decode_ship_selections(None).unwrap().is_empty());
    }

    #[test]
    fn malformed_ship_selections_are_rejected() {
        let garbage = serde_json::Value::String("{a},{b}".to_string());
        assert!(matches!(
            decode_ship_selections(Some(garbage)),
            Err(AppError::DatabaseError(_))
        ));
    }

    #[test]
    fn sale_rows_round_trip_product_details() {
        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            transaction_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            customer_id: None,
            customer_name: "Rahim".to_string(),
            customer_phone: "01711000000".to_string(),
            customer_email: None,
            sale_amount: dec!(3600),
            cogs: dec!(3240),
            transaction_fee_percent: Decimal::ZERO,
            payment_received: Decimal::ZERO,
            payment_status: PaymentStatus::Pending,
            details: ProductDetails::ShipTicket(ShipTicketDetails {
                trip_type: TripType::RoundTrip,
                ship_selections: vec![ShipSelection {
                    ship_type: "Bay One".to_string(),
                    seat_category: "Economy".to_string(),
                    quantity: 2,
                    unit_price: Some(dec!(1800)),
                }],
                commission_percent: dec!(10),
                travel_date: None,
            }),
            derived: DerivedFields::default(),
            attachment_urls: vec!["a.pdf".to_string()],
            notes: None,
            created_at: now,
            updated_at: now,
        };

        let restored = Sale::try_from(SaleRow::from(&sale)).unwrap();
        assert_eq!(restored, sale);
    }
}
