//! `SqliteDatabase` is a concrete implementation of a Kassa engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{admin_log, commission, db_url, instruments, new_pool, orders, sessions};
use crate::{
    db_types::{
        AdminLogEntry,
        CommissionSetting,
        NewInstrument,
        NewOrder,
        NewSession,
        Order,
        OrderAggregates,
        OrderStatusType,
        PaymentInstrument,
        ProfileSummary,
        SessionOrderStats,
        UserId,
        UserSession,
    },
    traits::{
        AdminAudit,
        AuditApiError,
        CommissionApiError,
        CommissionManagement,
        ExchangeDatabase,
        InstrumentApiError,
        InstrumentManagement,
        OrderApiError,
        OrderManagement,
        SessionApiError,
        SessionManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl ExchangeDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), SessionApiError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SessionManagement for SqliteDatabase {
    async fn upsert_session(&self, contact: NewSession) -> Result<UserSession, SessionApiError> {
        let mut conn = self.pool.acquire().await?;
        sessions::upsert_session(contact, &mut conn).await
    }

    async fn fetch_session(&self, chat_id: UserId) -> Result<Option<UserSession>, SessionApiError> {
        let mut conn = self.pool.acquire().await?;
        let session = sessions::fetch_session(chat_id, &mut conn).await?;
        Ok(session)
    }

    async fn fetch_session_by_id(&self, id: i64) -> Result<Option<UserSession>, SessionApiError> {
        let mut conn = self.pool.acquire().await?;
        let session = sessions::fetch_session_by_id(id, &mut conn).await?;
        Ok(session)
    }

    async fn issue_captcha(
        &self,
        chat_id: UserId,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionApiError> {
        let mut conn = self.pool.acquire().await?;
        sessions::issue_captcha(chat_id, code, expires_at, &mut conn).await
    }

    async fn clear_captcha(&self, chat_id: UserId, verified_at: DateTime<Utc>) -> Result<(), SessionApiError> {
        let mut conn = self.pool.acquire().await?;
        sessions::clear_captcha(chat_id, verified_at, &mut conn).await
    }

    async fn touch_last_action(&self, chat_id: UserId, at: DateTime<Utc>) -> Result<(), SessionApiError> {
        let mut conn = self.pool.acquire().await?;
        sessions::touch_last_action(chat_id, at, &mut conn).await
    }

    async fn set_blocked(&self, chat_id: UserId, blocked: bool) -> Result<UserSession, SessionApiError> {
        let mut conn = self.pool.acquire().await?;
        let session = sessions::set_blocked(chat_id, blocked, &mut conn).await?;
        debug!("🗃️ Session for chat {chat_id} is now {}", if blocked { "blocked" } else { "unblocked" });
        Ok(session)
    }

    async fn fetch_blocked_sessions(&self) -> Result<Vec<UserSession>, SessionApiError> {
        let mut conn = self.pool.acquire().await?;
        let sessions = sessions::fetch_blocked_sessions(&mut conn).await?;
        Ok(sessions)
    }

    async fn session_count(&self) -> Result<i64, SessionApiError> {
        let mut conn = self.pool.acquire().await?;
        let count = sessions::session_count(&mut conn).await?;
        Ok(count)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::insert_order(order, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn finalize_order(&self, order_id: i64, status: OrderStatusType) -> Result<Order, OrderApiError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::finalize_order(order_id, status, &mut tx).await?;
        let order = match updated {
            Some(order) => order,
            // The guard rejected the update. Look at the row to report why.
            None => {
                let err = match orders::fetch_order(order_id, &mut tx).await? {
                    Some(order) => OrderApiError::AlreadyFinalised(order_id, order.status),
                    None => OrderApiError::OrderNotFound(order_id),
                };
                tx.rollback().await?;
                return Err(err);
            },
        };
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} finalised as {status}");
        Ok(order)
    }

    async fn pending_order_for_session(&self, session_id: i64) -> Result<Option<Order>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::pending_order_for_session(session_id, &mut conn).await?;
        Ok(order)
    }

    async fn order_stats_for_session(&self, session_id: i64) -> Result<SessionOrderStats, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let stats = orders::order_stats_for_session(session_id, &mut conn).await?;
        Ok(stats)
    }

    async fn profile_for_session(&self, session_id: i64) -> Result<ProfileSummary, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let profile = orders::profile_for_session(session_id, &mut conn).await?;
        Ok(profile)
    }

    async fn order_aggregates(&self) -> Result<OrderAggregates, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let aggregates = orders::order_aggregates(&mut conn).await?;
        Ok(aggregates)
    }
}

impl InstrumentManagement for SqliteDatabase {
    async fn add_instrument(&self, instrument: NewInstrument) -> Result<PaymentInstrument, InstrumentApiError> {
        let mut conn = self.pool.acquire().await?;
        instruments::add_instrument(instrument, &mut conn).await
    }

    async fn remove_instrument(&self, id: i64) -> Result<PaymentInstrument, InstrumentApiError> {
        let mut conn = self.pool.acquire().await?;
        let removed = instruments::remove_instrument(id, &mut conn).await?;
        removed.ok_or(InstrumentApiError::InstrumentNotFound(id))
    }

    async fn fetch_instrument(&self, id: i64) -> Result<Option<PaymentInstrument>, InstrumentApiError> {
        let mut conn = self.pool.acquire().await?;
        let instrument = instruments::fetch_instrument(id, &mut conn).await?;
        Ok(instrument)
    }

    async fn list_instruments(&self) -> Result<Vec<PaymentInstrument>, InstrumentApiError> {
        let mut conn = self.pool.acquire().await?;
        let list = instruments::list_instruments(&mut conn).await?;
        Ok(list)
    }

    async fn list_banks(&self) -> Result<Vec<String>, InstrumentApiError> {
        let mut conn = self.pool.acquire().await?;
        let banks = instruments::list_banks(&mut conn).await?;
        Ok(banks)
    }

    async fn fetch_instrument_by_bank(
        &self,
        bank_name: &str,
    ) -> Result<Option<PaymentInstrument>, InstrumentApiError> {
        let mut conn = self.pool.acquire().await?;
        let instrument = instruments::fetch_instrument_by_bank(bank_name, &mut conn).await?;
        Ok(instrument)
    }
}

impl CommissionManagement for SqliteDatabase {
    async fn latest_commission_setting(&self) -> Result<Option<CommissionSetting>, CommissionApiError> {
        let mut conn = self.pool.acquire().await?;
        let setting = commission::latest_setting(&mut conn).await?;
        Ok(setting)
    }

    async fn set_commission_rate(&self, rate: f64) -> Result<CommissionSetting, CommissionApiError> {
        let mut conn = self.pool.acquire().await?;
        let setting = commission::append_setting(rate, &mut conn).await?;
        debug!("🗃️ Commission rate set to {rate}%");
        Ok(setting)
    }
}

impl AdminAudit for SqliteDatabase {
    async fn log_admin_action(&self, admin_id: UserId, action: &str) -> Result<AdminLogEntry, AuditApiError> {
        let mut conn = self.pool.acquire().await?;
        let entry = admin_log::insert_entry(admin_id, action, &mut conn).await?;
        Ok(entry)
    }

    async fn fetch_admin_log(&self, limit: i64) -> Result<Vec<AdminLogEntry>, AuditApiError> {
        let mut conn = self.pool.acquire().await?;
        let entries = admin_log::fetch_entries(limit, &mut conn).await?;
        Ok(entries)
    }
}
