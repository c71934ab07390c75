//! Domain records persisted in the `users` and `complaints` collections.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Category, ComplaintId, ComplaintKind, ComplaintStatus, Role, UserId};

// ---------------------------------------------------------------------------
// UserProfile
// ---------------------------------------------------------------------------

/// The role-bearing record associated with an authenticated principal.
///
/// Credentials (password hash, email-verified flag) never appear here; they
/// stay inside the server's auth module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    /// Stable identity-provider key, immutable for the life of the account.
    pub id: UserId,
    /// Email address, unique per provider.
    pub email: String,
    pub role: Role,
    /// When the account was created.  Set once.
    pub created_at: DateTime<Utc>,
    /// A blocked principal is denied every mutating operation regardless of
    /// role.
    pub blocked: bool,
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

/// A file attached to a complaint.  Size limits are enforced at upload time,
/// before the complaint record is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachedFile {
    /// Original file name as submitted.
    pub name: String,
    /// Fetchable URL of the stored blob.
    pub url: String,
}

// ---------------------------------------------------------------------------
// Status history ledger
// ---------------------------------------------------------------------------

/// One entry in a complaint's append-only status history.
///
/// Entries are never mutated or removed after append; insertion order is
/// chronological.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusHistoryEntry {
    pub status: ComplaintStatus,
    /// Who performed the transition.
    pub actor_id: UserId,
    pub at: DateTime<Utc>,
    /// Optional note, e.g. a rejection reason or the assignee's email.
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Complaint
// ---------------------------------------------------------------------------

/// A submitted complaint or suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Complaint {
    pub id: ComplaintId,
    pub author_id: UserId,
    /// Author's email, denormalized for display.
    pub author_email: String,
    /// Author's role snapshotted at submission time, never re-derived.
    pub author_role: Role,
    pub title: String,
    pub body: String,
    /// `None` when the submitter picked no category.
    pub category: Option<Category>,
    pub kind: ComplaintKind,
    pub status: ComplaintStatus,
    pub created_at: DateTime<Utc>,
    /// Bumped on every status change or response.
    pub updated_at: DateTime<Utc>,
    pub assignee_id: Option<UserId>,
    pub assignee_email: Option<String>,
    pub response_text: Option<String>,
    pub response_at: Option<DateTime<Utc>>,
    pub responder_id: Option<UserId>,
    /// At most [`crate::constants::MAX_ATTACHMENTS`] entries, in upload order.
    pub attachments: Vec<AttachedFile>,
    /// Append-only ledger.  `history[0]` is always the creation entry with
    /// status `New` and the author as actor.
    pub history: Vec<StatusHistoryEntry>,
    /// Derived: true exactly while status is `NeedsClarification`.
    pub clarification_requested: bool,
}

impl Complaint {
    /// Current status reconstructed from the ledger; falls back to the scalar
    /// field for records without history (should not occur in practice).
    pub fn status_from_ledger(&self) -> ComplaintStatus {
        self.history.last().map(|e| e.status).unwrap_or(self.status)
    }
}
