//! Sale model: common transaction fields plus one product-specific group.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::calculator::lenient;

/// Payment state of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    Partial,
    #[default]
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Partial => "Partial",
            PaymentStatus::Pending => "Pending",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "Paid" => PaymentStatus::Paid,
            "Partial" => PaymentStatus::Partial,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Discriminant of [`ProductDetails`], used for grouping and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "Air Ticket")]
    AirTicket,
    #[serde(rename = "Hotel")]
    Hotel,
    #[serde(rename = "Tour Package")]
    TourPackage,
    #[serde(rename = "Visa")]
    Visa,
    #[serde(rename = "Ship Ticket")]
    ShipTicket,
}

impl ProductType {
    pub const ALL: [ProductType; 5] = [
        ProductType::AirTicket,
        ProductType::Hotel,
        ProductType::TourPackage,
        ProductType::Visa,
        ProductType::ShipTicket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::AirTicket => "Air Ticket",
            ProductType::Hotel => "Hotel",
            ProductType::TourPackage => "Tour Package",
            ProductType::Visa => "Visa",
            ProductType::ShipTicket => "Ship Ticket",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Ship trip direction; selects the fare column in the pricing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    #[default]
    OneWay,
    RoundTrip,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::OneWay => "one_way",
            TripType::RoundTrip => "round_trip",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "round_trip" => TripType::RoundTrip,
            _ => TripType::OneWay,
        }
    }
}

/// One row of seats on a ship ticket.
///
/// `unit_price` is pinned when the sale is saved, so later fare changes do not
/// rewrite historical sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipSelection {
    pub ship_type: String,
    pub seat_category: String,
    pub quantity: u32,
    #[serde(default, deserialize_with = "lenient::optional_decimal")]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AirTicketDetails {
    #[serde(default)]
    pub route_from: String,
    #[serde(default)]
    pub route_to: String,
    #[serde(default = "one")]
    pub passenger_count: u32,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub airline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HotelDetails {
    #[serde(default)]
    pub hotel_name: String,
    #[serde(default = "one")]
    pub room_count: u32,
    #[serde(default = "one")]
    pub night_count: u32,
    pub checkin_date: Option<NaiveDate>,
    pub checkout_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TourPackageDetails {
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(default)]
    pub duration_days: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisaDetails {
    #[serde(default)]
    pub visa_country: String,
    pub visa_type: Option<String>,
    #[serde(default = "default_visa_status")]
    pub visa_status: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShipTicketDetails {
    #[serde(default)]
    pub trip_type: TripType,
    #[serde(default)]
    pub ship_selections: Vec<ShipSelection>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub commission_percent: Decimal,
    pub travel_date: Option<NaiveDate>,
}

fn one() -> u32 {
    1
}

fn default_visa_status() -> String {
    "Processing".to_string()
}

/// Product-specific field group, tagged by `product_type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "product_type")]
pub enum ProductDetails {
    #[serde(rename = "Air Ticket")]
    AirTicket(AirTicketDetails),
    #[serde(rename = "Hotel")]
    Hotel(HotelDetails),
    #[serde(rename = "Tour Package")]
    TourPackage(TourPackageDetails),
    #[serde(rename = "Visa")]
    Visa(VisaDetails),
    #[serde(rename = "Ship Ticket")]
    ShipTicket(ShipTicketDetails),
}

impl ProductDetails {
    pub fn product_type(&self) -> ProductType {
        match self {
            ProductDetails::AirTicket(_) => ProductType::AirTicket,
            ProductDetails::Hotel(_) => ProductType::Hotel,
            ProductDetails::TourPackage(_) => ProductType::TourPackage,
            ProductDetails::Visa(_) => ProductType::Visa,
            ProductDetails::ShipTicket(_) => ProductType::ShipTicket,
        }
    }
}

/// Values computed from the money inputs. Never accepted from clients.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedFields {
    pub transaction_fee_amount: Decimal,
    pub profit_loss: Decimal,
    pub net_profit_loss: Decimal,
    pub profit_margin: Decimal,
    pub net_profit_margin: Decimal,
    pub outstanding_balance: Decimal,
}

/// Persisted sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_date: NaiveDate,
    pub customer_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub sale_amount: Decimal,
    pub cogs: Decimal,
    pub transaction_fee_percent: Decimal,
    pub payment_received: Decimal,
    pub payment_status: PaymentStatus,
    #[serde(flatten)]
    pub details: ProductDetails,
    #[serde(flatten)]
    pub derived: DerivedFields,
    pub attachment_urls: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    pub fn product_type(&self) -> ProductType {
        self.details.product_type()
    }
}
