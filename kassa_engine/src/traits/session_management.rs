use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{NewSession, UserId, UserSession};

#[derive(Debug, Clone, Error)]
pub enum SessionApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No session exists for chat id {0}")]
    SessionNotFound(UserId),
}

impl From<sqlx::Error> for SessionApiError {
    fn from(e: sqlx::Error) -> Self {
        SessionApiError::DatabaseError(e.to_string())
    }
}

/// Chat-session bookkeeping. Sessions are created on first contact and soft-deleted only, via the
/// `is_blocked` flag.
#[allow(async_fn_in_trait)]
pub trait SessionManagement {
    /// Creates the session on first contact, or refreshes the display name/username on every
    /// subsequent one. Returns the stored row either way.
    async fn upsert_session(&self, contact: NewSession) -> Result<UserSession, SessionApiError>;

    async fn fetch_session(&self, chat_id: UserId) -> Result<Option<UserSession>, SessionApiError>;

    /// Fetch by internal row id (orders reference sessions this way).
    async fn fetch_session_by_id(&self, id: i64) -> Result<Option<UserSession>, SessionApiError>;

    /// Stores a freshly issued captcha code and its expiry on the session.
    async fn issue_captcha(
        &self,
        chat_id: UserId,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionApiError>;

    /// Clears the captcha fields and stamps `last_action_at`. Called exactly once per successful
    /// verification; a second verification attempt will find no code to match.
    async fn clear_captcha(&self, chat_id: UserId, verified_at: DateTime<Utc>) -> Result<(), SessionApiError>;

    /// Stamps `last_action_at` without touching the captcha fields (the within-cooldown path).
    async fn touch_last_action(&self, chat_id: UserId, at: DateTime<Utc>) -> Result<(), SessionApiError>;

    async fn set_blocked(&self, chat_id: UserId, blocked: bool) -> Result<UserSession, SessionApiError>;

    async fn fetch_blocked_sessions(&self) -> Result<Vec<UserSession>, SessionApiError>;

    async fn session_count(&self) -> Result<i64, SessionApiError>;
}
