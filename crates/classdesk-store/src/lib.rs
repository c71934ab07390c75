//! # classdesk-store
//!
//! SQLite persistence for Classdesk.  The crate exposes a synchronous
//! [`Database`] handle that wraps a `rusqlite::Connection` and provides typed
//! CRUD helpers for the two logical collections, `users` and `complaints`.
//!
//! The complaint status history is stored as a dedicated append-only table
//! (an explicit event log keyed by complaint id) rather than a JSON column,
//! so ledger entries can never be rewritten in place.

pub mod complaints;
pub mod database;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::UserAccount;
