//! The identity provider: password hashing, bearer-token sessions, and
//! password-reset tokens.
//!
//! Sessions and reset tokens live in memory only; restarting the server signs
//! everyone out.  Passwords are hashed with Argon2id and stored as PHC
//! strings in the users table.

use std::collections::HashMap;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng as SaltRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::debug;

use classdesk_shared::constants::{RESET_TOKEN_TTL_MINUTES, SESSION_TOKEN_SIZE};
use classdesk_shared::UserId;

use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

/// Hash a password with Argon2id, producing a PHC string.
pub fn hash_password(password: &str) -> Result<String, ServerError> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServerError::Internal(format!("Password hashing failed: {e}")))
}

/// Verify a password against a stored PHC string.  A malformed hash simply
/// fails verification.
pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ResetToken {
    user: UserId,
    expires_at: DateTime<Utc>,
}

/// In-memory session and password-reset token registry.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, UserId>>>,
    resets: Arc<RwLock<HashMap<String, ResetToken>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            resets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Issue a fresh opaque bearer token for the user.
    pub async fn issue(&self, user: UserId) -> String {
        let token = new_token();
        self.sessions.write().await.insert(token.clone(), user);
        debug!(user = %user, "session issued");
        token
    }

    /// Resolve a bearer token to the principal it was issued for.
    pub async fn resolve(&self, token: &str) -> Option<UserId> {
        self.sessions.read().await.get(token).copied()
    }

    /// Drop a session.  Returns the principal it belonged to, if any.
    pub async fn revoke(&self, token: &str) -> Option<UserId> {
        self.sessions.write().await.remove(token)
    }

    /// Issue a password-reset token valid for a limited time.
    pub async fn issue_reset(&self, user: UserId) -> String {
        let token = new_token();
        self.resets.write().await.insert(
            token.clone(),
            ResetToken {
                user,
                expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
            },
        );
        token
    }

    /// Redeem a reset token.  Single use; expired or unknown tokens yield
    /// `None`.
    pub async fn consume_reset(&self, token: &str) -> Option<UserId> {
        let entry = self.resets.write().await.remove(token)?;
        if Utc::now() > entry.expires_at {
            return None;
        }
        Some(entry.user)
    }

    /// Evict expired reset tokens.  Called periodically from a background
    /// task.
    pub async fn purge_expired_resets(&self) {
        let mut resets = self.resets.write().await;
        let before = resets.len();
        let now = Utc::now();
        resets.retain(|_, entry| entry.expires_at > now);
        let removed = before - resets.len();
        if removed > 0 {
            debug!(removed, "Purged expired reset tokens");
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 32 random bytes, hex-encoded.
fn new_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
        assert!(!verify_password("not-a-phc-string", "hunter2"));
    }

    #[tokio::test]
    async fn session_issue_resolve_revoke() {
        let sessions = SessionManager::new();
        let user = UserId::new();

        let token = sessions.issue(user).await;
        assert_eq!(sessions.resolve(&token).await, Some(user));

        assert_eq!(sessions.revoke(&token).await, Some(user));
        assert_eq!(sessions.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let sessions = SessionManager::new();
        assert_eq!(sessions.resolve("deadbeef").await, None);
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let sessions = SessionManager::new();
        let user = UserId::new();

        let token = sessions.issue_reset(user).await;
        assert_eq!(sessions.consume_reset(&token).await, Some(user));
        assert_eq!(sessions.consume_reset(&token).await, None);
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let sessions = SessionManager::new();
        let user = UserId::new();
        let a = sessions.issue(user).await;
        let b = sessions.issue(user).await;
        assert_ne!(a, b);
    }
}
