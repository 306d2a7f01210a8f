//! Ship ticket pricing.
//!
//! A ship ticket sale is a list of seat selections. Each selection is priced
//! from its own `unit_price` when present, otherwise from the fare table for
//! the trip type. Commission is the share of the total the agency keeps; the
//! rest is the cost of goods sold.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::calculator::{percent_of, MAX_AMOUNT};
use crate::models::{ShipSelection, TripType};

/// Fare for one seat category on one ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatPrice {
    pub one_way: Decimal,
    pub round_trip: Decimal,
}

impl SeatPrice {
    pub fn for_trip(&self, trip: TripType) -> Decimal {
        match trip {
            TripType::OneWay => self.one_way,
            TripType::RoundTrip => self.round_trip,
        }
    }
}

/// (ship, seat category, one way, round trip)
const STANDARD_FARES: &[(&str, &str, i64, i64)] = &[
    ("Karnafuli Express", "Economy", 1800, 3400),
    ("Karnafuli Express", "Business", 2800, 5400),
    ("Karnafuli Express", "Cabin", 4500, 8800),
    ("Bay One", "Economy", 1600, 3000),
    ("Bay One", "Business", 2500, 4800),
    ("Bay One", "VIP Cabin", 6000, 11500),
    ("Green Line", "Economy", 1500, 2900),
    ("Green Line", "Business", 2400, 4600),
];

fn key(ship_type: &str, seat_category: &str) -> (String, String) {
    (
        ship_type.trim().to_lowercase(),
        seat_category.trim().to_lowercase(),
    )
}

/// Fare lookup keyed by ship and seat category, case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct ShipPricingTable {
    fares: HashMap<(String, String), SeatPrice>,
}

impl ShipPricingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The fares the agency currently sells at.
    pub fn standard() -> Self {
        STANDARD_FARES
            .iter()
            .fold(Self::empty(), |table, (ship, seat, one_way, round_trip)| {
                table.with_price(
                    ship,
                    seat,
                    SeatPrice {
                        one_way: Decimal::from(*one_way),
                        round_trip: Decimal::from(*round_trip),
                    },
                )
            })
    }

    pub fn with_price(mut self, ship_type: &str, seat_category: &str, price: SeatPrice) -> Self {
        self.fares.insert(key(ship_type, seat_category), price);
        self
    }

    pub fn lookup(&self, ship_type: &str, seat_category: &str) -> Option<SeatPrice> {
        self.fares.get(&key(ship_type, seat_category)).copied()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("no price for {ship_type} / {seat_category}")]
    UnknownFare {
        ship_type: String,
        seat_category: String,
    },
    #[error("commission must be between 0 and 100 percent")]
    CommissionOutOfRange,
    #[error("ship ticket amount out of range")]
    AmountOutOfRange,
}

/// Result of pricing a set of selections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipQuote {
    /// Selections with the unit price that was used pinned on each one.
    pub selections: Vec<ShipSelection>,
    pub total: Decimal,
    pub cogs: Decimal,
}

/// Price every selection and derive COGS from the commission.
///
/// An explicit `unit_price` wins over the table, so a sale saved with pinned
/// prices reproduces the same total after the table changes. Unit prices and
/// the total are bounded by `MAX_AMOUNT`.
pub fn resolve(
    selections: &[ShipSelection],
    trip_type: TripType,
    commission_percent: Decimal,
    table: &ShipPricingTable,
) -> Result<ShipQuote, PricingError> {
    if commission_percent < Decimal::ZERO || commission_percent > Decimal::ONE_HUNDRED {
        return Err(PricingError::CommissionOutOfRange);
    }

    let mut pinned = Vec::with_capacity(selections.len());
    let mut total = Decimal::ZERO;

    for selection in selections {
        let unit = match selection.unit_price {
            Some(price) => price,
            None => table
                .lookup(&selection.ship_type, &selection.seat_category)
                .map(|fare| fare.for_trip(trip_type))
                .ok_or_else(|| PricingError::UnknownFare {
                    ship_type: selection.ship_type.clone(),
                    seat_category: selection.seat_category.clone(),
                })?,
        };

        if unit < Decimal::ZERO || unit > MAX_AMOUNT {
            return Err(PricingError::AmountOutOfRange);
        }
        total = unit
            .checked_mul(Decimal::from(selection.quantity))
            .and_then(|line| total.checked_add(line))
            .filter(|sum| *sum <= MAX_AMOUNT)
            .ok_or(PricingError::AmountOutOfRange)?;
        pinned.push(ShipSelection {
            unit_price: Some(unit),
            ..selection.clone()
        });
    }

    Ok(ShipQuote {
        selections: pinned,
        total,
        cogs: cogs_from_commission(total, commission_percent),
    })
}

/// `total - total * commission / 100`
pub fn cogs_from_commission(total: Decimal, commission_percent: Decimal) -> Decimal {
    total - total * commission_percent / Decimal::ONE_HUNDRED
}

/// Back-solve the commission a hand-entered COGS implies.
pub fn implied_commission(sale_amount: Decimal, cogs: Decimal) -> Decimal {
    percent_of(sale_amount - cogs, sale_amount)
}

/// Whether COGS follows the seat selections or was entered by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CogsMode {
    #[default]
    Auto,
    Manual,
}

/// COGS state of a ship ticket form.
///
/// In `Manual` mode quotes never overwrite COGS; only `recalculate` returns
/// to `Auto`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipCogsTracker {
    pub mode: CogsMode,
    pub sale_amount: Decimal,
    pub cogs: Decimal,
    pub commission_percent: Decimal,
}

impl ShipCogsTracker {
    pub fn new(commission_percent: Decimal) -> Self {
        Self {
            commission_percent,
            ..Default::default()
        }
    }

    /// Take the total from a fresh quote; COGS follows only in `Auto` mode.
    pub fn apply_quote(&mut self, quote: &ShipQuote) {
        self.sale_amount = quote.total;
        if self.mode == CogsMode::Auto {
            self.cogs = quote.cogs;
        }
    }

    /// Hand edit of COGS: switches to `Manual` and back-solves the commission.
    pub fn edit_cogs(&mut self, cogs: Decimal) {
        self.mode = CogsMode::Manual;
        self.cogs = cogs;
        self.commission_percent = implied_commission(self.sale_amount, cogs);
    }

    /// Return to `Auto` and recompute COGS from the current total.
    pub fn recalculate(&mut self) {
        self.mode = CogsMode::Auto;
        self.cogs = cogs_from_commission(self.sale_amount, self.commission_percent);
    }
}
