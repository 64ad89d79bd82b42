//! Subscription ledger: persistent storage for users, subscription
//! records and the platform commission total.
//!
//! The `Ledger` trait is implemented twice: `InMemoryLedger` for tests
//! and local development, and `PostgresLedger` backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod user;

pub use common::UserId;
pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use store::{Ledger, LedgerExt};
pub use user::{NewUser, UserRecord};
