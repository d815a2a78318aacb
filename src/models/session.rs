use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a user session.
///
/// The record carries no secret material; the client holds only the opaque
/// identifier it was issued at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: Uuid,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Starts a session for `user_id` lasting `ttl_secs`.
    pub fn new(user_id: Uuid, ttl_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs as i64),
        }
    }

    /// Whether the session is past its expiry.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// A resolved session together with the store key it was found under.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub key: String,
    pub session: Session,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_not_expired() {
        let session = Session::new(Uuid::new_v4(), 60);
        assert!(!session.is_expired());
        assert!(session.expires_at > session.created_at);
    }

    #[test]
    fn zero_ttl_session_expires() {
        let mut session = Session::new(Uuid::new_v4(), 0);
        session.expires_at -= chrono::Duration::seconds(1);
        assert!(session.is_expired());
    }
}
