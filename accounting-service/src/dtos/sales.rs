use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::{amount, percentage};
use crate::models::{DerivedFields, PaymentStatus, ProductDetails, ShipSelection, TripType};
use crate::services::calculator::lenient;
use crate::services::pricing::CogsMode;

/// Sale form submission. Derived fields sent by the client are ignored.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaleInput {
    pub transaction_date: NaiveDate,
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(length(min = 1, message = "Customer phone is required"))]
    pub customer_phone: String,
    #[validate(email(message = "Invalid email format"))]
    pub customer_email: Option<String>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "amount", message = "Sale amount must be between 0 and 10^15"))]
    pub sale_amount: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "amount", message = "COGS must be between 0 and 10^15"))]
    pub cogs: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "percentage", message = "Fee must be between 0 and 100 percent"))]
    pub transaction_fee_percent: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "amount", message = "Payment must be between 0 and 10^15"))]
    pub payment_received: Decimal,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// Ship tickets only: keep the submitted COGS instead of deriving it
    /// from the commission.
    #[serde(default)]
    pub manual_cogs: bool,
    #[serde(default)]
    pub attachment_urls: Vec<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub details: ProductDetails,
}

/// Ship ticket part of a quote.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ShipQuoteInput {
    #[serde(default)]
    pub trip_type: TripType,
    #[serde(default)]
    pub ship_selections: Vec<ShipSelection>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "percentage", message = "Commission must be between 0 and 100 percent"))]
    pub commission_percent: Decimal,
    #[serde(default)]
    pub cogs_mode: CogsMode,
    /// COGS typed by the user in this keystroke; switches to manual mode.
    #[serde(default, deserialize_with = "lenient::optional_decimal")]
    #[validate(custom(function = "amount", message = "COGS must be between 0 and 10^15"))]
    pub edited_cogs: Option<Decimal>,
    /// Leave manual mode and derive COGS again.
    #[serde(default)]
    pub recalculate: bool,
}

/// Current state of a sale form, recomputed on every change.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuoteRequest {
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "amount", message = "Sale amount must be between 0 and 10^15"))]
    pub sale_amount: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "amount", message = "COGS must be between 0 and 10^15"))]
    pub cogs: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "percentage", message = "Fee must be between 0 and 100 percent"))]
    pub transaction_fee_percent: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[validate(custom(function = "amount", message = "Payment must be between 0 and 10^15"))]
    pub payment_received: Decimal,
    #[validate(nested)]
    pub ship: Option<ShipQuoteInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    pub sale_amount: Decimal,
    pub cogs: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission_percent: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cogs_mode: Option<CogsMode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ship_selections: Vec<ShipSelection>,
    #[serde(flatten)]
    pub derived: DerivedFields,
}
