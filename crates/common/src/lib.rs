//! Shared types for the billing platform.

pub mod types;

pub use types::UserId;
