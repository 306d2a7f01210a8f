//! Expense model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Approval workflow state of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Paid,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "Pending",
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Paid => "Paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "Approved" => ApprovalStatus::Approved,
            "Paid" => ApprovalStatus::Paid,
            _ => ApprovalStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub category_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub paid_through: Option<String>,
    pub tax_amount: Option<Decimal>,
    pub tax_percentage: Option<Decimal>,
    pub vendor: Option<String>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub customer_name: Option<String>,
    pub attachment_urls: Vec<String>,
    pub approval_status: ApprovalStatus,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
