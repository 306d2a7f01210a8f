mod category;
mod customer;
mod expense;
mod sale;
mod user;
mod vendor;

pub use category::{build_tree, CategoryNode, ExpenseCategory};
pub use customer::{normalize_phone, Customer};
pub use expense::{ApprovalStatus, Expense};
pub use sale::*;
pub use user::AuthUser;
pub use vendor::Vendor;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive date range used by listings and reports. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}
