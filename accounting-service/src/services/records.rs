//! Transaction record manager.
//!
//! Turns form submissions into records: recomputes every derived field,
//! prices ship tickets, links the customer by phone, then persists through
//! the [`RecordStore`]. Writes are last-write-wins; there is no version check.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::calculator::{compute, FinancialInputs};
use super::pricing::{self, implied_commission, ShipCogsTracker, ShipPricingTable};
use super::store::RecordStore;
use crate::dtos::{CategoryInput, ExpenseInput, QuoteRequest, QuoteResponse, SaleInput, VendorInput};
use crate::models::{
    build_tree, normalize_phone, AuthUser, CategoryNode, Customer, DateRange, Expense,
    ExpenseCategory, ProductDetails, Sale, Vendor,
};

fn not_found(what: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} not found", what))
}

fn pricing_error(err: pricing::PricingError) -> AppError {
    AppError::BadRequest(anyhow::anyhow!(err))
}

/// Sale amount, COGS and product details after pricing.
struct PricedSale {
    sale_amount: Decimal,
    cogs: Decimal,
    details: ProductDetails,
}

pub struct RecordManager {
    store: Arc<dyn RecordStore>,
    pricing: Arc<ShipPricingTable>,
}

impl RecordManager {
    pub fn new(store: Arc<dyn RecordStore>, pricing: Arc<ShipPricingTable>) -> Self {
        Self { store, pricing }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Expenses
    // -------------------------------------------------------------------------

    async fn build_expense(
        &self,
        user: &AuthUser,
        id: Uuid,
        input: ExpenseInput,
    ) -> Result<Expense, AppError> {
        input.validate()?;

        if let Some(category_id) = input.category_id {
            self.store
                .get_category(user.user_id, category_id)
                .await?
                .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown expense category")))?;
        }

        let tax_amount = match (input.tax_amount, input.tax_percentage) {
            (None, Some(percent)) => Some(input.amount * percent / Decimal::ONE_HUNDRED),
            (amount, _) => amount,
        };

        let now = Utc::now();
        Ok(Expense {
            id,
            user_id: user.user_id,
            date: input.date,
            category_id: input.category_id,
            amount: input.amount,
            currency: input.currency.to_uppercase(),
            paid_through: input.paid_through,
            tax_amount,
            tax_percentage: input.tax_percentage,
            vendor: input.vendor,
            reference_number: input.reference_number,
            notes: input.notes,
            customer_name: input.customer_name,
            attachment_urls: input.attachment_urls,
            approval_status: input.approval_status,
            tags: input.tags,
            created_at: now,
            updated_at: now,
        })
    }

    #[instrument(skip(self, user, input), fields(user_id = %user.user_id))]
    pub async fn create_expense(
        &self,
        user: &AuthUser,
        input: ExpenseInput,
    ) -> Result<Expense, AppError> {
        let expense = self.build_expense(user, Uuid::new_v4(), input).await?;
        let expense = self.store.insert_expense(&expense).await?;
        info!(expense_id = %expense.id, amount = %expense.amount, "Expense created");
        Ok(expense)
    }

    #[instrument(skip(self, user, input), fields(user_id = %user.user_id))]
    pub async fn update_expense(
        &self,
        user: &AuthUser,
        id: Uuid,
        input: ExpenseInput,
    ) -> Result<Expense, AppError> {
        let existing = self.get_expense(user, id).await?;
        let mut expense = self.build_expense(user, id, input).await?;
        expense.created_at = existing.created_at;

        let expense = self
            .store
            .update_expense(&expense)
            .await?
            .ok_or_else(|| not_found("Expense"))?;
        info!(expense_id = %expense.id, "Expense updated");
        Ok(expense)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete_expense(&self, user: &AuthUser, id: Uuid) -> Result<Expense, AppError> {
        let expense = self
            .store
            .delete_expense(user.user_id, id)
            .await?
            .ok_or_else(|| not_found("Expense"))?;
        info!(expense_id = %id, "Expense deleted");
        Ok(expense)
    }

    pub async fn get_expense(&self, user: &AuthUser, id: Uuid) -> Result<Expense, AppError> {
        self.store
            .get_expense(user.user_id, id)
            .await?
            .ok_or_else(|| not_found("Expense"))
    }

    pub async fn list_expenses(
        &self,
        user: &AuthUser,
        range: DateRange,
    ) -> Result<Vec<Expense>, AppError> {
        self.store.list_expenses(user.user_id, range).await
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    /// Resolve sale amount and COGS. Ship tickets take both from their seat
    /// selections unless COGS was entered by hand, in which case the
    /// commission is back-solved from it.
    fn price(&self, input: &SaleInput) -> Result<PricedSale, AppError> {
        let ProductDetails::ShipTicket(ship) = &input.details else {
            return Ok(PricedSale {
                sale_amount: input.sale_amount,
                cogs: input.cogs,
                details: input.details.clone(),
            });
        };

        let quote = pricing::resolve(
            &ship.ship_selections,
            ship.trip_type,
            ship.commission_percent,
            &self.pricing,
        )
        .map_err(pricing_error)?;

        let mut details = ship.clone();
        details.ship_selections = quote.selections;

        let cogs = if input.manual_cogs {
            details.commission_percent = implied_commission(quote.total, input.cogs);
            input.cogs
        } else {
            quote.cogs
        };

        Ok(PricedSale {
            sale_amount: quote.total,
            cogs,
            details: ProductDetails::ShipTicket(details),
        })
    }

    async fn build_sale(
        &self,
        user: &AuthUser,
        id: Uuid,
        input: SaleInput,
    ) -> Result<Sale, AppError> {
        input.validate()?;

        let phone = normalize_phone(&input.customer_phone);
        if phone.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Customer phone is required"
            )));
        }

        let priced = self.price(&input)?;

        let customer = self
            .find_or_create_customer(
                user.user_id,
                input.customer_name.trim(),
                &phone,
                input.customer_email.clone(),
            )
            .await?;

        let derived = compute(FinancialInputs {
            sale_amount: priced.sale_amount,
            cogs: priced.cogs,
            transaction_fee_percent: input.transaction_fee_percent,
            payment_received: input.payment_received,
        });

        let now = Utc::now();
        Ok(Sale {
            id,
            user_id: user.user_id,
            transaction_date: input.transaction_date,
            customer_id: Some(customer.id),
            customer_name: customer.name,
            customer_phone: customer.phone,
            customer_email: customer.email,
            sale_amount: priced.sale_amount,
            cogs: priced.cogs,
            transaction_fee_percent: input.transaction_fee_percent,
            payment_received: input.payment_received,
            payment_status: input.payment_status,
            details: priced.details,
            derived,
            attachment_urls: input.attachment_urls,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        })
    }

    #[instrument(skip(self, user, input), fields(user_id = %user.user_id))]
    pub async fn create_sale(&self, user: &AuthUser, input: SaleInput) -> Result<Sale, AppError> {
        let sale = self.build_sale(user, Uuid::new_v4(), input).await?;
        let sale = self.store.insert_sale(&sale).await?;
        info!(
            sale_id = %sale.id,
            product_type = sale.product_type().as_str(),
            sale_amount = %sale.sale_amount,
            "Sale created"
        );
        Ok(sale)
    }

    #[instrument(skip(self, user, input), fields(user_id = %user.user_id))]
    pub async fn update_sale(
        &self,
        user: &AuthUser,
        id: Uuid,
        input: SaleInput,
    ) -> Result<Sale, AppError> {
        let existing = self.get_sale(user, id).await?;
        let mut sale = self.build_sale(user, id, input).await?;
        sale.created_at = existing.created_at;

        let sale = self
            .store
            .update_sale(&sale)
            .await?
            .ok_or_else(|| not_found("Sale"))?;
        info!(sale_id = %sale.id, "Sale updated");
        Ok(sale)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete_sale(&self, user: &AuthUser, id: Uuid) -> Result<Sale, AppError> {
        let sale = self
            .store
            .delete_sale(user.user_id, id)
            .await?
            .ok_or_else(|| not_found("Sale"))?;
        info!(sale_id = %id, "Sale deleted");
        Ok(sale)
    }

    pub async fn get_sale(&self, user: &AuthUser, id: Uuid) -> Result<Sale, AppError> {
        self.store
            .get_sale(user.user_id, id)
            .await?
            .ok_or_else(|| not_found("Sale"))
    }

    pub async fn list_sales(&self, user: &AuthUser, range: DateRange) -> Result<Vec<Sale>, AppError> {
        self.store.list_sales(user.user_id, range).await
    }

    /// Recompute a sale form without saving anything.
    pub fn quote(&self, request: QuoteRequest) -> Result<QuoteResponse, AppError> {
        request.validate()?;

        let (sale_amount, cogs, ship) = match request.ship {
            None => (request.sale_amount, request.cogs, None),
            Some(ship) => {
                let quote = pricing::resolve(
                    &ship.ship_selections,
                    ship.trip_type,
                    ship.commission_percent,
                    &self.pricing,
                )
                .map_err(pricing_error)?;

                let mut tracker = ShipCogsTracker {
                    mode: ship.cogs_mode,
                    sale_amount: quote.total,
                    cogs: request.cogs,
                    commission_percent: ship.commission_percent,
                };
                tracker.apply_quote(&quote);
                if ship.recalculate {
                    tracker.recalculate();
                }
                if let Some(edited) = ship.edited_cogs {
                    tracker.edit_cogs(edited);
                }

                (tracker.sale_amount, tracker.cogs, Some((tracker, quote.selections)))
            }
        };

        let derived = compute(FinancialInputs {
            sale_amount,
            cogs,
            transaction_fee_percent: request.transaction_fee_percent,
            payment_received: request.payment_received,
        });

        let (commission_percent, cogs_mode, ship_selections) = match ship {
            Some((tracker, selections)) => (
                Some(tracker.commission_percent),
                Some(tracker.mode),
                selections,
            ),
            None => (None, None, Vec::new()),
        };

        Ok(QuoteResponse {
            sale_amount,
            cogs,
            commission_percent,
            cogs_mode,
            ship_selections,
            derived,
        })
    }

    // -------------------------------------------------------------------------
    // Customers
    // -------------------------------------------------------------------------

    /// Look the customer up by phone and refresh name and email, or create
    /// them. A concurrent insert of the same phone is resolved by finding
    /// the winner.
    #[instrument(skip(self, email))]
    pub async fn find_or_create_customer(
        &self,
        user_id: Uuid,
        name: &str,
        phone: &str,
        email: Option<String>,
    ) -> Result<Customer, AppError> {
        let phone = normalize_phone(phone);

        if let Some(existing) = self.store.find_customer_by_phone(user_id, &phone).await? {
            return self.refresh_customer(existing, name, email).await;
        }

        let customer = Customer {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            phone: phone.clone(),
            email: email.clone(),
            created_at: Utc::now(),
        };

        match self.store.insert_customer(&customer).await {
            Ok(created) => {
                info!(customer_id = %created.id, "Customer created");
                Ok(created)
            }
            Err(AppError::Conflict(_)) => {
                let existing = self
                    .store
                    .find_customer_by_phone(user_id, &phone)
                    .await?
                    .ok_or_else(|| not_found("Customer"))?;
                self.refresh_customer(existing, name, email).await
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_customer(
        &self,
        existing: Customer,
        name: &str,
        email: Option<String>,
    ) -> Result<Customer, AppError> {
        let updated = Customer {
            name: name.to_string(),
            email: email.or_else(|| existing.email.clone()),
            ..existing.clone()
        };
        if updated == existing {
            return Ok(existing);
        }
        self.store.update_customer(&updated).await
    }

    pub async fn list_customers(&self, user: &AuthUser) -> Result<Vec<Customer>, AppError> {
        self.store.list_customers(user.user_id).await
    }

    // -------------------------------------------------------------------------
    // Vendors and categories
    // -------------------------------------------------------------------------

    pub async fn create_vendor(&self, user: &AuthUser, input: VendorInput) -> Result<Vendor, AppError> {
        input.validate()?;
        let vendor = Vendor {
            id: Uuid::new_v4(),
            user_id: user.user_id,
            name: input.name.trim().to_string(),
            phone: input.phone,
            email: input.email,
            notes: input.notes,
        };
        self.store.insert_vendor(&vendor).await
    }

    pub async fn list_vendors(&self, user: &AuthUser) -> Result<Vec<Vendor>, AppError> {
        self.store.list_vendors(user.user_id).await
    }

    pub async fn delete_vendor(&self, user: &AuthUser, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_vendor(user.user_id, id).await? {
            return Err(not_found("Vendor"));
        }
        Ok(())
    }

    /// Sub-categories may only hang off a main category.
    pub async fn create_category(
        &self,
        user: &AuthUser,
        input: CategoryInput,
    ) -> Result<ExpenseCategory, AppError> {
        input.validate()?;

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .store
                .get_category(user.user_id, parent_id)
                .await?
                .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Parent category not found")))?;
            if !parent.is_main() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Sub-categories cannot have children"
                )));
            }
        }

        let category = ExpenseCategory {
            id: Uuid::new_v4(),
            user_id: user.user_id,
            name: input.name.trim().to_string(),
            parent_id: input.parent_id,
        };
        self.store.insert_category(&category).await
    }

    pub async fn list_categories(&self, user: &AuthUser) -> Result<Vec<ExpenseCategory>, AppError> {
        self.store.list_categories(user.user_id).await
    }

    pub async fn category_tree(&self, user: &AuthUser) -> Result<Vec<CategoryNode>, AppError> {
        Ok(build_tree(&self.list_categories(user).await?))
    }

    pub async fn delete_category(&self, user: &AuthUser, id: Uuid) -> Result<(), AppError> {
        let categories = self.list_categories(user).await?;
        if categories.iter().any(|c| c.parent_id == Some(id)) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Category has sub-categories"
            )));
        }
        if !self.store.delete_category(user.user_id, id).await? {
            return Err(not_found("Category"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::ShipQuoteInput;
    use crate::models::{
        HotelDetails, PaymentStatus, ShipSelection, ShipTicketDetails, TripType,
    };
    use crate::services::calculator::MAX_AMOUNT;
    use crate::services::policy::Role;
    use crate::services::pricing::{CogsMode, SeatPrice};
    use crate::services::store::InMemoryStore;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn manager() -> RecordManager {
        RecordManager::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(ShipPricingTable::standard()),
        )
    }

    fn user() -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            email: Some("clerk@agency.com".to_string()),
            role: Role::Manager,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn hotel_sale(phone: &str, name: &str) -> SaleInput {
        SaleInput {
            transaction_date: date(),
            customer_name: name.to_string(),
            customer_phone: phone.to_string(),
            customer_email: None,
            sale_amount: dec!(1000),
            cogs: dec!(600),
            transaction_fee_percent: dec!(2),
            payment_received: dec!(400),
            payment_status: PaymentStatus::Partial,
            manual_cogs: false,
            attachment_urls: Vec::new(),
            notes: None,
            details: ProductDetails::Hotel(HotelDetails {
                hotel_name: "Sea Pearl".to_string(),
                room_count: 1,
                night_count: 2,
                checkin_date: None,
                checkout_date: None,
            }),
        }
    }

    fn ship_sale(unit_price: Option<Decimal>, manual_cogs: bool, cogs: Decimal) -> SaleInput {
        SaleInput {
            manual_cogs,
            cogs,
            details: ProductDetails::ShipTicket(ShipTicketDetails {
                trip_type: TripType::OneWay,
                ship_selections: vec![ShipSelection {
                    ship_type: "Karnafuli Express".to_string(),
                    seat_category: "Economy".to_string(),
                    quantity: 2,
                    unit_price,
                }],
                commission_percent: dec!(10),
                travel_date: None,
            }),
            ..hotel_sale("01711000000", "Karim")
        }
    }

    #[tokio::test]
    async fn create_sale_computes_derived_fields() {
        let manager = manager();
        let sale = manager
            .create_sale(&user(), hotel_sale("01711000000", "Karim"))
            .await
            .unwrap();

        assert_eq!(sale.derived.transaction_fee_amount, dec!(20));
        assert_eq!(sale.derived.profit_loss, dec!(400));
        assert_eq!(sale.derived.net_profit_loss, dec!(380));
        assert_eq!(sale.derived.profit_margin, dec!(40));
        assert_eq!(sale.derived.net_profit_margin, dec!(38));
        assert_eq!(sale.derived.outstanding_balance, dec!(600));
        assert!(sale.customer_id.is_some());
    }

    #[tokio::test]
    async fn missing_phone_is_rejected_before_any_write() {
        let manager = manager();
        let user = user();

        let err = manager
            .create_sale(&user, hotel_sale("", "Karim"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = manager
            .create_sale(&user, hotel_sale("   ", "Karim"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert!(manager.list_customers(&user).await.unwrap().is_empty());
        assert!(manager
            .list_sales(&user, DateRange::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn repeat_customer_is_found_by_phone_and_refreshed() {
        let manager = manager();
        let user = user();

        let first = manager
            .create_sale(&user, hotel_sale("01711 000000", "Karim"))
            .await
            .unwrap();
        let mut repeat = hotel_sale("01711000000", "Karim Uddin");
        repeat.customer_email = Some("karim@example.com".to_string());
        let second = manager.create_sale(&user, repeat).await.unwrap();

        assert_eq!(first.customer_id, second.customer_id);
        let customers = manager.list_customers(&user).await.unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].name, "Karim Uddin");
        assert_eq!(customers[0].email.as_deref(), Some("karim@example.com"));
    }

    #[tokio::test]
    async fn ship_ticket_sale_is_priced_from_selections() {
        let manager = manager();
        let sale = manager
            .create_sale(&user(), ship_sale(None, false, Decimal::ZERO))
            .await
            .unwrap();

        assert_eq!(sale.sale_amount, dec!(3600));
        assert_eq!(sale.cogs, dec!(3240));
        let ProductDetails::ShipTicket(details) = &sale.details else {
            panic!("expected ship ticket details");
        };
        assert_eq!(details.ship_selections[0].unit_price, Some(dec!(1800)));
    }

    #[tokio::test]
    async fn manual_cogs_back_solves_commission() {
        let manager = manager();
        let sale = manager
            .create_sale(&user(), ship_sale(Some(dec!(250)), true, dec!(200)))
            .await
            .unwrap();

        assert_eq!(sale.sale_amount, dec!(500));
        assert_eq!(sale.cogs, dec!(200));
        let ProductDetails::ShipTicket(details) = &sale.details else {
            panic!("expected ship ticket details");
        };
        assert_eq!(details.commission_percent, dec!(60));
    }

    #[tokio::test]
    async fn reloaded_ship_sale_keeps_its_amount_after_fare_change() {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryStore::new());
        let user = user();
        let original = RecordManager::new(store.clone(), Arc::new(ShipPricingTable::standard()));
        let sale = original
            .create_sale(&user, ship_sale(None, false, Decimal::ZERO))
            .await
            .unwrap();

        let repriced = RecordManager::new(
            store,
            Arc::new(ShipPricingTable::standard().with_price(
                "Karnafuli Express",
                "Economy",
                SeatPrice {
                    one_way: dec!(5000),
                    round_trip: dec!(9000),
                },
            )),
        );
        let reloaded = repriced.get_sale(&user, sale.id).await.unwrap();
        let ProductDetails::ShipTicket(details) = reloaded.details.clone() else {
            panic!("expected ship ticket details");
        };

        let resubmitted = SaleInput {
            details: ProductDetails::ShipTicket(details),
            ..ship_sale(None, false, Decimal::ZERO)
        };
        let updated = repriced
            .update_sale(&user, sale.id, resubmitted)
            .await
            .unwrap();

        assert_eq!(updated.sale_amount, sale.sale_amount);
        assert_eq!(updated.created_at, sale.created_at);
    }

    #[tokio::test]
    async fn unknown_fare_is_a_bad_request() {
        let mut input = ship_sale(None, false, Decimal::ZERO);
        if let ProductDetails::ShipTicket(details) = &mut input.details {
            details.ship_selections[0].ship_type = "Ghost Ship".to_string();
        }
        let err = manager().create_sale(&user(), input).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn other_users_records_are_not_found() {
        let manager = manager();
        let owner = user();
        let sale = manager
            .create_sale(&owner, hotel_sale("01711000000", "Karim"))
            .await
            .unwrap();

        let stranger = user();
        assert!(matches!(
            manager.get_sale(&stranger, sale.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            manager
                .update_sale(&stranger, sale.id, hotel_sale("01711000000", "X"))
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete_sale(&stranger, sale.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn expense_tax_is_derived_from_percentage() {
        let manager = manager();
        let input: ExpenseInput = serde_json::from_value(serde_json::json!({
            "date": "2024-03-01",
            "amount": "1500",
            "tax_percentage": "10"
        }))
        .unwrap();

        let expense = manager.create_expense(&user(), input).await.unwrap();
        assert_eq!(expense.tax_amount, Some(dec!(150)));
        assert_eq!(expense.currency, "BDT");
    }

    #[tokio::test]
    async fn negative_expense_amount_is_rejected() {
        let input: ExpenseInput = serde_json::from_value(serde_json::json!({
            "date": "2024-03-01",
            "amount": -5
        }))
        .unwrap();
        let err = manager().create_expense(&user(), input).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn categories_are_two_levels_deep() {
        let manager = manager();
        let user = user();
        let office = manager
            .create_category(
                &user,
                CategoryInput {
                    name: "Office".to_string(),
                    parent_id: None,
                },
            )
            .await
            .unwrap();
        let rent = manager
            .create_category(
                &user,
                CategoryInput {
                    name: "Rent".to_string(),
                    parent_id: Some(office.id),
                },
            )
            .await
            .unwrap();

        let err = manager
            .create_category(
                &user,
                CategoryInput {
                    name: "Deposit".to_string(),
                    parent_id: Some(rent.id),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert!(matches!(
            manager.delete_category(&user, office.id).await,
            Err(AppError::Conflict(_))
        ));

        let tree = manager.category_tree(&user).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 1);
    }

    #[test]
    fn quote_keeps_manual_cogs_until_recalculated() {
        let manager = manager();
        let ship = |cogs_mode, edited_cogs, recalculate| ShipQuoteInput {
            trip_type: TripType::OneWay,
            ship_selections: vec![ShipSelection {
                ship_type: "Karnafuli Express".to_string(),
                seat_category: "Economy".to_string(),
                quantity: 2,
                unit_price: None,
            }],
            commission_percent: dec!(10),
            cogs_mode,
            edited_cogs,
            recalculate,
        };
        let request = |cogs, ship| QuoteRequest {
            sale_amount: Decimal::ZERO,
            cogs,
            transaction_fee_percent: Decimal::ZERO,
            payment_received: Decimal::ZERO,
            ship: Some(ship),
        };

        let auto = manager
            .quote(request(Decimal::ZERO, ship(CogsMode::Auto, None, false)))
            .unwrap();
        assert_eq!(auto.sale_amount, dec!(3600));
        assert_eq!(auto.cogs, dec!(3240));

        let edited = manager
            .quote(request(auto.cogs, ship(CogsMode::Auto, Some(dec!(3000)), false)))
            .unwrap();
        assert_eq!(edited.cogs_mode, Some(CogsMode::Manual));
        assert_eq!(edited.cogs, dec!(3000));

        let still_manual = manager
            .quote(request(dec!(3000), ship(CogsMode::Manual, None, false)))
            .unwrap();
        assert_eq!(still_manual.cogs, dec!(3000));

        let recalculated = manager
            .quote(request(dec!(3000), ship(CogsMode::Manual, None, true)))
            .unwrap();
        assert_eq!(recalculated.cogs_mode, Some(CogsMode::Auto));
        assert_eq!(recalculated.cogs, dec!(3240));
    }

    #[test]
    fn quote_rejects_out_of_range_amounts() {
        let manager = manager();
        let huge = dec!(100_000_000_000_000_000_000);

        let err = manager
            .quote(QuoteRequest {
                sale_amount: huge,
                cogs: Decimal::ZERO,
                transaction_fee_percent: huge,
                payment_received: Decimal::ZERO,
                ship: None,
            })
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = manager
            .quote(QuoteRequest {
                sale_amount: Decimal::ZERO,
                cogs: Decimal::ZERO,
                transaction_fee_percent: Decimal::ZERO,
                payment_received: Decimal::ZERO,
                ship: Some(ShipQuoteInput {
                    trip_type: TripType::OneWay,
                    ship_selections: vec![ShipSelection {
                        ship_type: "Karnafuli Express".to_string(),
                        seat_category: "Economy".to_string(),
                        quantity: u32::MAX,
                        unit_price: Some(huge),
                    }],
                    commission_percent: dec!(10),
                    cogs_mode: CogsMode::Auto,
                    edited_cogs: None,
                    recalculate: false,
                }),
            })
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn oversized_sale_is_rejected_before_any_write() {
        let manager = manager();
        let user = user();

        let mut input = hotel_sale("01711000000", "Karim");
        input.sale_amount = dec!(1_000_000_000_000_000_000_000_000_000);
        input.transaction_fee_percent = dec!(100);
        let err = manager.create_sale(&user, input).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let mut input = ship_sale(Some(MAX_AMOUNT), false, Decimal::ZERO);
        if let ProductDetails::ShipTicket(ship) = &mut input.details {
            ship.ship_selections[0].quantity = 1_000;
        }
        let err = manager.create_sale(&user, input).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert!(manager.list_sales(&user, DateRange::default()).await.unwrap().is_empty());
        assert!(manager.list_customers(&user).await.unwrap().is_empty());
    }
}
