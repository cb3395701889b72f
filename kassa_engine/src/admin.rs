//! The administrator API: commission, instrument catalog, blocked users and statistics.
//!
//! Every entry point checks the actor against [`AuthPolicy::require_admin`] before touching
//! anything, and every mutation appends a line to the admin audit log.

use ckb_common::Rub;
use log::*;
use thiserror::Error;

use crate::{
    authz::{AuthPolicy, Unauthorized},
    db_types::{AdminLogEntry, NewInstrument, PaymentInstrument, StatusCount, UserId, UserSession},
    traits::{
        AuditApiError,
        CommissionApiError,
        ExchangeDatabase,
        InstrumentApiError,
        OrderApiError,
        SessionApiError,
    },
};

#[derive(Debug, Clone, Error)]
pub enum AdminApiError {
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),
    #[error("Commission rate {0} is not a valid percentage")]
    InvalidCommissionRate(f64),
    #[error("Account number '{0}' must be exactly 16 digits")]
    InvalidAccountNumber(String),
    #[error("An instrument with account number {0} already exists")]
    DuplicateAccountNumber(String),
    #[error("Instrument {0} does not exist")]
    InstrumentNotFound(i64),
    #[error("No session exists for chat id {0}")]
    SessionNotFound(UserId),
    #[error("Chat {0} is not blocked")]
    NotBlocked(UserId),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<InstrumentApiError> for AdminApiError {
    fn from(e: InstrumentApiError) -> Self {
        match e {
            InstrumentApiError::DuplicateAccountNumber(acc) => AdminApiError::DuplicateAccountNumber(acc),
            InstrumentApiError::InstrumentNotFound(id) => AdminApiError::InstrumentNotFound(id),
            InstrumentApiError::DatabaseError(msg) => AdminApiError::DatabaseError(msg),
        }
    }
}

impl From<SessionApiError> for AdminApiError {
    fn from(e: SessionApiError) -> Self {
        match e {
            SessionApiError::SessionNotFound(chat) => AdminApiError::SessionNotFound(chat),
            SessionApiError::DatabaseError(msg) => AdminApiError::DatabaseError(msg),
        }
    }
}

impl From<CommissionApiError> for AdminApiError {
    fn from(e: CommissionApiError) -> Self {
        AdminApiError::DatabaseError(e.to_string())
    }
}

impl From<OrderApiError> for AdminApiError {
    fn from(e: OrderApiError) -> Self {
        AdminApiError::DatabaseError(e.to_string())
    }
}

impl From<AuditApiError> for AdminApiError {
    fn from(e: AuditApiError) -> Self {
        AdminApiError::DatabaseError(e.to_string())
    }
}

/// The service-wide statistics report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeStats {
    /// Sum of the payable totals over completed orders.
    pub turnover: Rub,
    pub commission_rate: f64,
    /// Turnover taken at the *current* commission rate. An estimate, since historical orders may
    /// have been created under a different rate.
    pub estimated_earnings: Rub,
    pub user_count: i64,
    pub total_orders: i64,
    pub by_status: Vec<StatusCount>,
}

pub struct AdminApi<B> {
    db: B,
    auth: AuthPolicy,
}

impl<B> AdminApi<B>
where B: ExchangeDatabase
{
    pub fn new(db: B, auth: AuthPolicy) -> Self {
        Self { db, auth }
    }

    /// Appends a new commission rate. Must be a finite, non-negative percentage.
    pub async fn set_commission(&self, actor: UserId, rate: f64) -> Result<f64, AdminApiError> {
        self.auth.require_admin(actor)?;
        if !rate.is_finite() || rate < 0.0 {
            return Err(AdminApiError::InvalidCommissionRate(rate));
        }
        let setting = self.db.set_commission_rate(rate).await?;
        self.db.log_admin_action(actor, &format!("set commission to {rate}%")).await?;
        info!("🔑️ Admin {actor} set the commission rate to {rate}%");
        Ok(setting.rate)
    }

    pub async fn add_instrument(
        &self,
        actor: UserId,
        instrument: NewInstrument,
    ) -> Result<PaymentInstrument, AdminApiError> {
        self.auth.require_admin(actor)?;
        let digits = regex::Regex::new(r"^\d{16}$").unwrap();
        if !digits.is_match(&instrument.account_number) {
            return Err(AdminApiError::InvalidAccountNumber(instrument.account_number));
        }
        let instrument = self.db.add_instrument(instrument).await?;
        self.db
            .log_admin_action(actor, &format!("added instrument #{} ({})", instrument.id, instrument.bank_name))
            .await?;
        info!("🔑️ Admin {actor} added instrument #{} ({})", instrument.id, instrument.bank_name);
        Ok(instrument)
    }

    pub async fn remove_instrument(&self, actor: UserId, id: i64) -> Result<PaymentInstrument, AdminApiError> {
        self.auth.require_admin(actor)?;
        let removed = self.db.remove_instrument(id).await?;
        self.db.log_admin_action(actor, &format!("removed instrument #{} ({})", removed.id, removed.bank_name)).await?;
        info!("🔑️ Admin {actor} removed instrument #{} ({})", removed.id, removed.bank_name);
        Ok(removed)
    }

    pub async fn list_instruments(&self, actor: UserId) -> Result<Vec<PaymentInstrument>, AdminApiError> {
        self.auth.require_admin(actor)?;
        let instruments = self.db.list_instruments().await?;
        Ok(instruments)
    }

    pub async fn blocked_sessions(&self, actor: UserId) -> Result<Vec<UserSession>, AdminApiError> {
        self.auth.require_admin(actor)?;
        let sessions = self.db.fetch_blocked_sessions().await?;
        Ok(sessions)
    }

    /// Lifts a block. Returns the updated session; notifying the user is the caller's
    /// (best-effort) job.
    pub async fn unblock(&self, actor: UserId, chat_id: UserId) -> Result<UserSession, AdminApiError> {
        self.auth.require_admin(actor)?;
        let session = self.db.fetch_session(chat_id).await?.ok_or(AdminApiError::SessionNotFound(chat_id))?;
        if !session.is_blocked {
            return Err(AdminApiError::NotBlocked(chat_id));
        }
        let session = self.db.set_blocked(chat_id, false).await?;
        self.db.log_admin_action(actor, &format!("unblocked chat {chat_id}")).await?;
        info!("🔑️ Admin {actor} unblocked chat {chat_id}");
        Ok(session)
    }

    pub async fn statistics(&self, actor: UserId) -> Result<ExchangeStats, AdminApiError> {
        self.auth.require_admin(actor)?;
        let aggregates = self.db.order_aggregates().await?;
        let commission_rate = self.db.current_commission_rate().await?;
        let user_count = self.db.session_count().await?;
        let estimated_earnings = aggregates.turnover.percent(commission_rate);
        Ok(ExchangeStats {
            turnover: aggregates.turnover,
            commission_rate,
            estimated_earnings,
            user_count,
            total_orders: aggregates.total_orders,
            by_status: aggregates.by_status,
        })
    }

    /// The most recent `limit` entries of the audit trail, newest first.
    pub async fn audit_trail(&self, actor: UserId, limit: i64) -> Result<Vec<AdminLogEntry>, AdminApiError> {
        self.auth.require_admin(actor)?;
        let entries = self.db.fetch_admin_log(limit).await?;
        Ok(entries)
    }
}
