//! Store-private records.
//!
//! The domain-facing [`UserProfile`] and [`Complaint`] types live in
//! `classdesk-shared`; this module only adds what persistence needs on top.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classdesk_shared::{Role, UserId, UserProfile};

/// A full user row, including credentials.
///
/// Only the auth module ever sees this; everything above the store works with
/// the credential-free [`UserProfile`] view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub blocked: bool,
    /// Argon2id hash in PHC string format.
    pub password_hash: String,
    /// Signup leaves this false; no verification flow delivers email yet.
    pub email_verified: bool,
}

impl UserAccount {
    /// Strip credentials, yielding the profile handed to the lifecycle layer.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
            blocked: self.blocked,
        }
    }
}
