use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::DateRange;
use crate::services::calculator::MAX_AMOUNT;

#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl From<RangeParams> for DateRange {
    fn from(params: RangeParams) -> Self {
        DateRange {
            from: params.from,
            to: params.to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Keep only the first `top` rows of each ranked dimension.
    pub top: Option<usize>,
}

impl ReportParams {
    pub fn range(&self) -> DateRange {
        DateRange {
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    /// Leave the record's files on the CDN.
    #[serde(default)]
    pub keep_attachments: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteRecordResponse {
    pub id: Uuid,
    pub message: String,
    /// Attachments that could not be removed from the CDN.
    pub orphaned_attachments: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VendorInput {
    #[validate(length(min = 1, message = "Vendor name is required"))]
    pub name: String,
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, message = "Category name is required"))]
    pub name: String,
    pub parent_id: Option<Uuid>,
}

/// Money amounts are in `0..=MAX_AMOUNT`.
pub(crate) fn amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > MAX_AMOUNT {
        return Err(ValidationError::new("amount"));
    }
    Ok(())
}

pub(crate) fn percentage(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percentage"));
    }
    Ok(())
}
