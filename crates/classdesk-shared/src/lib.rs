//! # classdesk-shared
//!
//! Domain model and pure logic shared by every Classdesk crate:
//!
//! - role / status / kind / category enumerations and id newtypes
//! - the [`UserProfile`] and [`Complaint`] records with their append-only
//!   status-history ledger
//! - the authorization predicate ([`authz::can_perform`]) that gates every
//!   lifecycle operation
//!
//! Nothing in this crate performs I/O.

pub mod authz;
pub mod constants;
pub mod models;
pub mod types;

mod error;

pub use error::LifecycleError;
pub use models::*;
pub use types::*;
