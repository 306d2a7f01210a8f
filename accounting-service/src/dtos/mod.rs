mod attachments;
mod common;
mod expenses;
mod sales;

pub use attachments::*;
pub use common::*;
pub use expenses::*;
pub use sales::*;
