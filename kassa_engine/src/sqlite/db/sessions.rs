use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewSession, UserId, UserSession},
    traits::SessionApiError,
};

/// Inserts the session on first contact, or refreshes the identity fields on every subsequent one.
pub async fn upsert_session(contact: NewSession, conn: &mut SqliteConnection) -> Result<UserSession, SessionApiError> {
    let session = sqlx::query_as(
        r#"
            INSERT INTO sessions (chat_id, first_name, username) VALUES ($1, $2, $3)
            ON CONFLICT (chat_id) DO UPDATE SET
                first_name = excluded.first_name,
                username = excluded.username,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(contact.chat_id)
    .bind(contact.first_name)
    .bind(contact.username)
    .fetch_one(conn)
    .await?;
    Ok(session)
}

pub async fn fetch_session(chat_id: UserId, conn: &mut SqliteConnection) -> Result<Option<UserSession>, sqlx::Error> {
    let session =
        sqlx::query_as("SELECT * FROM sessions WHERE chat_id = $1").bind(chat_id).fetch_optional(conn).await?;
    Ok(session)
}

pub async fn fetch_session_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<UserSession>, sqlx::Error> {
    let session = sqlx::query_as("SELECT * FROM sessions WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(session)
}

pub async fn issue_captcha(
    chat_id: UserId,
    code: &str,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SessionApiError> {
    let result = sqlx::query(
        r#"
            UPDATE sessions
            SET captcha_code = $2, captcha_expires_at = $3, updated_at = CURRENT_TIMESTAMP
            WHERE chat_id = $1
        "#,
    )
    .bind(chat_id)
    .bind(code)
    .bind(expires_at)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SessionApiError::SessionNotFound(chat_id));
    }
    debug!("🗃️ Captcha issued for chat {chat_id}, expires at {expires_at}");
    Ok(())
}

/// Clears the stored challenge and stamps the verification time in one statement.
pub async fn clear_captcha(
    chat_id: UserId,
    verified_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SessionApiError> {
    let result = sqlx::query(
        r#"
            UPDATE sessions
            SET captcha_code = NULL, captcha_expires_at = NULL, last_action_at = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE chat_id = $1
        "#,
    )
    .bind(chat_id)
    .bind(verified_at)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SessionApiError::SessionNotFound(chat_id));
    }
    Ok(())
}

pub async fn touch_last_action(
    chat_id: UserId,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SessionApiError> {
    let result =
        sqlx::query("UPDATE sessions SET last_action_at = $2, updated_at = CURRENT_TIMESTAMP WHERE chat_id = $1")
            .bind(chat_id)
            .bind(at)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(SessionApiError::SessionNotFound(chat_id));
    }
    Ok(())
}

pub async fn set_blocked(
    chat_id: UserId,
    blocked: bool,
    conn: &mut SqliteConnection,
) -> Result<UserSession, SessionApiError> {
    let session: Option<UserSession> = sqlx::query_as(
        "UPDATE sessions SET is_blocked = $2, updated_at = CURRENT_TIMESTAMP WHERE chat_id = $1 RETURNING *",
    )
    .bind(chat_id)
    .bind(blocked)
    .fetch_optional(conn)
    .await?;
    session.ok_or(SessionApiError::SessionNotFound(chat_id))
}

pub async fn fetch_blocked_sessions(conn: &mut SqliteConnection) -> Result<Vec<UserSession>, sqlx::Error> {
    let sessions =
        sqlx::query_as("SELECT * FROM sessions WHERE is_blocked = 1 ORDER BY updated_at DESC").fetch_all(conn).await?;
    Ok(sessions)
}

pub async fn session_count(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM sessions").fetch_one(conn).await?;
    Ok(count)
}
