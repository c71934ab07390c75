//! # classdesk-core
//!
//! The complaint lifecycle engine and the identity resolver.
//!
//! [`LifecycleEngine`] owns every read and write against the store and gates
//! each one with the authorization predicate from `classdesk-shared` before
//! touching persistence.  The HTTP layer must never bypass it.

pub mod engine;
pub mod identity;

pub use engine::{LifecycleEngine, ListScope, NewComplaint};
pub use identity::{resolve, SessionEvent, SessionHub};
