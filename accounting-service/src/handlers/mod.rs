//! HTTP handlers for accounting-service.

pub mod directory;
pub mod expenses;
pub mod health;
pub mod reports;
pub mod sales;
pub mod upload;
pub mod user;

pub use directory::*;
pub use expenses::*;
pub use health::{health_check, metrics};
pub use reports::get_report;
pub use sales::*;
pub use upload::{delete_file, upload_file, view_file};
pub use user::get_me;
