//! Identity resolution and session-change notification.
//!
//! [`resolve`] maps an authenticated principal id to its role-bearing
//! profile.  A principal without a profile record yields `NotFound`; callers
//! must treat that as "cannot authorize anything" rather than defaulting to a
//! role.
//!
//! [`SessionHub`] replaces the original application's ambient auth-state
//! listener with an explicit subscription: interested parties subscribe and
//! receive sign-in/sign-out events over a broadcast channel.

use tokio::sync::broadcast;

use classdesk_shared::{LifecycleError, UserId, UserProfile};
use classdesk_store::{Database, StoreError};

/// Resolve a principal to its profile.  Pure read, no side effects.
pub fn resolve(db: &Database, principal: UserId) -> Result<UserProfile, LifecycleError> {
    match db.get_user(principal) {
        Ok(account) => Ok(account.profile()),
        Err(StoreError::NotFound) => Err(LifecycleError::NotFound(format!(
            "no profile for principal {principal}"
        ))),
        Err(e) => Err(LifecycleError::Persistence(e.to_string())),
    }
}

/// A session lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(UserId),
    SignedOut(UserId),
}

/// Broadcast hub for session events.
///
/// Lagging subscribers lose old events (broadcast semantics); that is fine
/// here, the events are advisory.
#[derive(Clone)]
pub struct SessionHub {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Subscribe to future session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn signed_in(&self, user: UserId) {
        // Ignore the error case: no subscribers is not a failure.
        let _ = self.tx.send(SessionEvent::SignedIn(user));
        tracing::debug!(user = %user, "session opened");
    }

    pub fn signed_out(&self, user: UserId) {
        let _ = self.tx.send(SessionEvent::SignedOut(user));
        tracing::debug!(user = %user, "session closed");
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use classdesk_shared::Role;
    use classdesk_store::UserAccount;

    #[test]
    fn resolve_returns_profile_without_credentials() {
        let db = Database::open_in_memory().unwrap();
        let account = UserAccount {
            id: UserId::new(),
            email: "p@school.example".into(),
            role: Role::Parent,
            created_at: Utc::now(),
            blocked: false,
            password_hash: "$argon2id$stub".into(),
            email_verified: false,
        };
        db.insert_user(&account).unwrap();

        let profile = resolve(&db, account.id).unwrap();
        assert_eq!(profile.id, account.id);
        assert_eq!(profile.role, Role::Parent);
    }

    #[test]
    fn resolve_unknown_principal_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = resolve(&db, UserId::new()).unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }

    #[tokio::test]
    async fn hub_delivers_events_to_subscribers() {
        let hub = SessionHub::new();
        let mut rx = hub.subscribe();
        let user = UserId::new();

        hub.signed_in(user);
        hub.signed_out(user);

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::SignedIn(user));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::SignedOut(user));
    }
}
