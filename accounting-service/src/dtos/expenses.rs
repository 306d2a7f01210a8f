use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::common::{amount, percentage};
use crate::models::ApprovalStatus;
use crate::services::calculator::lenient;

fn default_currency() -> String {
    "BDT".to_string()
}

/// Expense form submission. Used for both create and update.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExpenseInput {
    pub date: NaiveDate,
    pub category_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "amount", message = "Amount must be between 0 and 10^15"))]
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    pub paid_through: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_decimal")]
    #[validate(custom(function = "amount", message = "Tax amount must be between 0 and 10^15"))]
    pub tax_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::optional_decimal")]
    #[validate(custom(function = "percentage", message = "Tax percentage must be between 0 and 100"))]
    pub tax_percentage: Option<Decimal>,
    pub vendor: Option<String>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub attachment_urls: Vec<String>,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}
