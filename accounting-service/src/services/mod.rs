//! Services layer for accounting-service.
//!
//! Domain logic (calculator, pricing, records, reports), the role policy,
//! token verification, persistence and the CDN client.

pub mod attachments;
pub mod calculator;
mod cdn_client;
mod database;
mod jwt;
pub mod policy;
pub mod pricing;
mod records;
pub mod reports;
mod store;

pub use attachments::{AttachmentManager, Visibility};
pub use cdn_client::{AttachmentFile, CdnClient, StoredFile, API_KEY_HEADER};
pub use database::PgStore;
pub use jwt::{AccessTokenClaims, JwtVerifier};
pub use policy::{AccessPolicy, Role, Section};
pub use pricing::ShipPricingTable;
pub use records::RecordManager;
pub use store::{InMemoryStore, RecordStore};
