use thiserror::Error;

use crate::db_types::{AdminLogEntry, CommissionSetting, UserId, DEFAULT_COMMISSION_RATE};

#[derive(Debug, Clone, Error)]
pub enum CommissionApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for CommissionApiError {
    fn from(e: sqlx::Error) -> Self {
        CommissionApiError::DatabaseError(e.to_string())
    }
}

/// The commission rate, kept as an append-only history. The current rate is the latest entry,
/// or [`DEFAULT_COMMISSION_RATE`] if none has ever been written.
#[allow(async_fn_in_trait)]
pub trait CommissionManagement {
    async fn current_commission_rate(&self) -> Result<f64, CommissionApiError> {
        Ok(self.latest_commission_setting().await?.map(|s| s.rate).unwrap_or(DEFAULT_COMMISSION_RATE))
    }

    async fn latest_commission_setting(&self) -> Result<Option<CommissionSetting>, CommissionApiError>;

    /// Appends a new rate entry. Earlier entries are never rewritten.
    async fn set_commission_rate(&self, rate: f64) -> Result<CommissionSetting, CommissionApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum AuditApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AuditApiError {
    fn from(e: sqlx::Error) -> Self {
        AuditApiError::DatabaseError(e.to_string())
    }
}

/// The append-only record of privileged actions.
#[allow(async_fn_in_trait)]
pub trait AdminAudit {
    async fn log_admin_action(&self, admin_id: UserId, action: &str) -> Result<AdminLogEntry, AuditApiError>;

    async fn fetch_admin_log(&self, limit: i64) -> Result<Vec<AdminLogEntry>, AuditApiError>;
}
