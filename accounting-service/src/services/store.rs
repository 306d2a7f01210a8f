use async_trait::async_trait;
use service_core::error::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Customer, DateRange, Expense, ExpenseCategory, Sale, Vendor};

/// Persistence for every record the service owns.
///
/// Every query is scoped by owner. Lookups of records that do not exist or
/// belong to another owner return `None` (or `false` for deletes). Listings
/// are ordered by transaction date, then creation time.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn insert_expense(&self, expense: &Expense) -> Result<Expense, AppError>;
    async fn update_expense(&self, expense: &Expense) -> Result<Option<Expense>, AppError>;
    async fn delete_expense(&self, user_id: Uuid, id: Uuid) -> Result<Option<Expense>, AppError>;
    async fn get_expense(&self, user_id: Uuid, id: Uuid) -> Result<Option<Expense>, AppError>;
    async fn list_expenses(&self, user_id: Uuid, range: DateRange)
        -> Result<Vec<Expense>, AppError>;

    async fn insert_sale(&self, sale: &Sale) -> Result<Sale, AppError>;
    async fn update_sale(&self, sale: &Sale) -> Result<Option<Sale>, AppError>;
    async fn delete_sale(&self, user_id: Uuid, id: Uuid) -> Result<Option<Sale>, AppError>;
    async fn get_sale(&self, user_id: Uuid, id: Uuid) -> Result<Option<Sale>, AppError>;
    async fn list_sales(&self, user_id: Uuid, range: DateRange) -> Result<Vec<Sale>, AppError>;

    async fn find_customer_by_phone(
        &self,
        user_id: Uuid,
        phone: &str,
    ) -> Result<Option<Customer>, AppError>;
    /// Fails with `Conflict` when the owner already has a customer with this phone.
    async fn insert_customer(&self, customer: &Customer) -> Result<Customer, AppError>;
    async fn update_customer(&self, customer: &Customer) -> Result<Customer, AppError>;
    async fn list_customers(&self, user_id: Uuid) -> Result<Vec<Customer>, AppError>;

    async fn insert_vendor(&self, vendor: &Vendor) -> Result<Vendor, AppError>;
    async fn list_vendors(&self, user_id: Uuid) -> Result<Vec<Vendor>, AppError>;
    async fn delete_vendor(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    async fn insert_category(&self, category: &ExpenseCategory)
        -> Result<ExpenseCategory, AppError>;
    async fn get_category(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ExpenseCategory>, AppError>;
    async fn list_categories(&self, user_id: Uuid) -> Result<Vec<ExpenseCategory>, AppError>;
    async fn delete_category(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;
}

/// Store kept in process memory. Used by tests and by local runs without a
/// database URL.
#[derive(Default)]
pub struct InMemoryStore {
    expenses: RwLock<Vec<Expense>>,
    sales: RwLock<Vec<Sale>>,
    customers: RwLock<Vec<Customer>>,
    vendors: RwLock<Vec<Vendor>>,
    categories: RwLock<Vec<ExpenseCategory>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace<T: Clone>(
    records: &mut [T],
    record: &T,
    matches: impl Fn(&T) -> bool,
) -> Option<T> {
    let slot = records.iter_mut().find(|r| matches(r))?;
    *slot = record.clone();
    Some(record.clone())
}

fn remove<T>(records: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> Option<T> {
    let index = records.iter().position(matches)?;
    Some(records.remove(index))
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_expense(&self, expense: &Expense) -> Result<Expense, AppError> {
        self.expenses.write().await.push(expense.clone());
        Ok(expense.clone())
    }

    async fn update_expense(&self, expense: &Expense) -> Result<Option<Expense>, AppError> {
        let mut expenses = self.expenses.write().await;
        Ok(replace(&mut expenses, expense, |e| {
            e.id == expense.id && e.user_id == expense.user_id
        }))
    }

    async fn delete_expense(&self, user_id: Uuid, id: Uuid) -> Result<Option<Expense>, AppError> {
        let mut expenses = self.expenses.write().await;
        Ok(remove(&mut expenses, |e| e.id == id && e.user_id == user_id))
    }

    async fn get_expense(&self, user_id: Uuid, id: Uuid) -> Result<Option<Expense>, AppError> {
        let expenses = self.expenses.read().await;
        Ok(expenses
            .iter()
            .find(|e| e.id == id && e.user_id == user_id)
            .cloned())
    }

    async fn list_expenses(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<Expense>, AppError> {
        let mut expenses: Vec<Expense> = self
            .expenses
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == user_id && range.contains(e.date))
            .cloned()
            .collect();
        expenses.sort_by_key(|e| (e.date, e.created_at));
        Ok(expenses)
    }

    async fn insert_sale(&self, sale: &Sale) -> Result<Sale, AppError> {
        self.sales.write().await.push(sale.clone());
        Ok(sale.clone())
    }

    async fn update_sale(&self, sale: &Sale) -> Result<Option<Sale>, AppError> {
        let mut sales = self.sales.write().await;
        Ok(replace(&mut sales, sale, |s| {
            s.id == sale.id && s.user_id == sale.user_id
        }))
    }

    async fn delete_sale(&self, user_id: Uuid, id: Uuid) -> Result<Option<Sale>, AppError> {
        let mut sales = self.sales.write().await;
        Ok(remove(&mut sales, |s| s.id == id && s.user_id == user_id))
    }

    async fn get_sale(&self, user_id: Uuid, id: Uuid) -> Result<Option<Sale>, AppError> {
        let sales = self.sales.read().await;
        Ok(sales
            .iter()
            .find(|s| s.id == id && s.user_id == user_id)
            .cloned())
    }

    async fn list_sales(&self, user_id: Uuid, range: DateRange) -> Result<Vec<Sale>, AppError> {
        let mut sales: Vec<Sale> = self
            .sales
            .read()
            .await
            .iter()
            .filter(|s| s.user_id == user_id && range.contains(s.transaction_date))
            .cloned()
            .collect();
        sales.sort_by_key(|s| (s.transaction_date, s.created_at));
        Ok(sales)
    }

    async fn find_customer_by_phone(
        &self,
        user_id: Uuid,
        phone: &str,
    ) -> Result<Option<Customer>, AppError> {
        let customers = self.customers.read().await;
        Ok(customers
            .iter()
            .find(|c| c.user_id == user_id && c.phone == phone)
            .cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<Customer, AppError> {
        let mut customers = self.customers.write().await;
        if customers
            .iter()
            .any(|c| c.user_id == customer.user_id && c.phone == customer.phone)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Customer with phone {} already exists",
                customer.phone
            )));
        }
        customers.push(customer.clone());
        Ok(customer.clone())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<Customer, AppError> {
        let mut customers = self.customers.write().await;
        replace(&mut customers, customer, |c| {
            c.id == customer.id && c.user_id == customer.user_id
        })
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))
    }

    async fn list_customers(&self, user_id: Uuid) -> Result<Vec<Customer>, AppError> {
        let mut customers: Vec<Customer> = self
            .customers
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn insert_vendor(&self, vendor: &Vendor) -> Result<Vendor, AppError> {
        self.vendors.write().await.push(vendor.clone());
        Ok(vendor.clone())
    }

    async fn list_vendors(&self, user_id: Uuid) -> Result<Vec<Vendor>, AppError> {
        let mut vendors: Vec<Vendor> = self
            .vendors
            .read()
            .await
            .iter()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect();
        vendors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(vendors)
    }

    async fn delete_vendor(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut vendors = self.vendors.write().await;
        Ok(remove(&mut vendors, |v| v.id == id && v.user_id == user_id).is_some())
    }

    async fn insert_category(
        &self,
        category: &ExpenseCategory,
    ) -> Result<ExpenseCategory, AppError> {
        self.categories.write().await.push(category.clone());
        Ok(category.clone())
    }

    async fn get_category(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ExpenseCategory>, AppError> {
        let categories = self.categories.read().await;
        Ok(categories
            .iter()
            .find(|c| c.id == id && c.user_id == user_id)
            .cloned())
    }

    async fn list_categories(&self, user_id: Uuid) -> Result<Vec<ExpenseCategory>, AppError> {
        let mut categories: Vec<ExpenseCategory> = self
            .categories
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn delete_category(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut categories = self.categories.write().await;
        Ok(remove(&mut categories, |c| c.id == id && c.user_id == user_id).is_some())
    }
}
