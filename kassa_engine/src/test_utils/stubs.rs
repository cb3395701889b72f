use crate::{
    db_types::CryptoAsset,
    traits::{RateError, RateProvider},
};

/// A rate provider that always answers with the configured spot prices.
#[derive(Debug, Clone, Copy)]
pub struct FixedRates {
    pub btc: f64,
    pub ltc: f64,
}

impl Default for FixedRates {
    fn default() -> Self {
        Self { btc: 3_000_000.0, ltc: 9_000.0 }
    }
}

impl RateProvider for FixedRates {
    async fn rate_in_rub(&self, asset: CryptoAsset) -> Result<f64, RateError> {
        match asset {
            CryptoAsset::Btc => Ok(self.btc),
            CryptoAsset::Ltc => Ok(self.ltc),
        }
    }
}

/// A rate provider that always fails, for exercising the unavailable-rate path.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRates;

impl RateProvider for OfflineRates {
    async fn rate_in_rub(&self, _asset: CryptoAsset) -> Result<f64, RateError> {
        Err(RateError::Unavailable("rate source offline".to_string()))
    }
}

#[cfg(feature = "sqlite")]
pub use broken_history::NoHistoryDb;

#[cfg(feature = "sqlite")]
mod broken_history {
    use chrono::{DateTime, Utc};

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
        SqliteDatabase,
    };

    /// Wraps the SQLite backend but fails the per-session order-statistics read, for exercising
    /// what happens when the follow-up work after a committed write goes wrong.
    #[derive(Clone)]
    pub struct NoHistoryDb(pub SqliteDatabase);

    impl ExchangeDatabase for NoHistoryDb {
        fn url(&self) -> &str {
            self.0.url()
        }
    }

    impl SessionManagement for NoHistoryDb {
        async fn upsert_session(&self, contact: NewSession) -> Result<UserSession, SessionApiError> {
            self.0.upsert_session(contact).await
        }

        async fn fetch_session(&self, chat_id: UserId) -> Result<Option<UserSession>, SessionApiError> {
            self.0.fetch_session(chat_id).await
        }

        async fn fetch_session_by_id(&self, id: i64) -> Result<Option<UserSession>, SessionApiError> {
            self.0.fetch_session_by_id(id).await
        }

        async fn issue_captcha(
            &self,
            chat_id: UserId,
            code: &str,
            expires_at: DateTime<Utc>,
        ) -> Result<(), SessionApiError> {
            self.0.issue_captcha(chat_id, code, expires_at).await
        }

        async fn clear_captcha(&self, chat_id: UserId, verified_at: DateTime<Utc>) -> Result<(), SessionApiError> {
            self.0.clear_captcha(chat_id, verified_at).await
        }

        async fn touch_last_action(&self, chat_id: UserId, at: DateTime<Utc>) -> Result<(), SessionApiError> {
            self.0.touch_last_action(chat_id, at).await
        }

        async fn set_blocked(&self, chat_id: UserId, blocked: bool) -> Result<UserSession, SessionApiError> {
            self.0.set_blocked(chat_id, blocked).await
        }

        async fn fetch_blocked_sessions(&self) -> Result<Vec<UserSession>, SessionApiError> {
            self.0.fetch_blocked_sessions().await
        }

        async fn session_count(&self) -> Result<i64, SessionApiError> {
            self.0.session_count().await
        }
    }

    impl OrderManagement for NoHistoryDb {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderApiError> {
            self.0.insert_order(order).await
        }

        async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderApiError> {
            self.0.fetch_order(order_id).await
        }

        async fn finalize_order(&self, order_id: i64, status: OrderStatusType) -> Result<Order, OrderApiError> {
            self.0.finalize_order(order_id, status).await
        }

        async fn pending_order_for_session(&self, session_id: i64) -> Result<Option<Order>, OrderApiError> {
            self.0.pending_order_for_session(session_id).await
        }

        async fn order_stats_for_session(&self, _session_id: i64) -> Result<SessionOrderStats, OrderApiError> {
            Err(OrderApiError::DatabaseError("order history is offline".to_string()))
        }

        async fn profile_for_session(&self, session_id: i64) -> Result<ProfileSummary, OrderApiError> {
            self.0.profile_for_session(session_id).await
        }

        async fn order_aggregates(&self) -> Result<OrderAggregates, OrderApiError> {
            self.0.order_aggregates().await
        }
    }

    impl InstrumentManagement for NoHistoryDb {
        async fn add_instrument(&self, instrument: NewInstrument) -> Result<PaymentInstrument, InstrumentApiError> {
            self.0.add_instrument(instrument).await
        }

        async fn remove_instrument(&self, id: i64) -> Result<PaymentInstrument, InstrumentApiError> {
            self.0.remove_instrument(id).await
        }

        async fn fetch_instrument(&self, id: i64) -> Result<Option<PaymentInstrument>, InstrumentApiError> {
            self.0.fetch_instrument(id).await
        }

        async fn list_instruments(&self) -> Result<Vec<PaymentInstrument>, InstrumentApiError> {
            self.0.list_instruments().await
        }

        async fn list_banks(&self) -> Result<Vec<String>, InstrumentApiError> {
            self.0.list_banks().await
        }

        async fn fetch_instrument_by_bank(
            &self,
            bank_name: &str,
        ) -> Result<Option<PaymentInstrument>, InstrumentApiError> {
            self.0.fetch_instrument_by_bank(bank_name).await
        }
    }

    impl CommissionManagement for NoHistoryDb {
        async fn latest_commission_setting(&self) -> Result<Option<CommissionSetting>, CommissionApiError> {
            self.0.latest_commission_setting().await
        }

        async fn set_commission_rate(&self, rate: f64) -> Result<CommissionSetting, CommissionApiError> {
            self.0.set_commission_rate(rate).await
        }
    }

    impl AdminAudit for NoHistoryDb {
        async fn log_admin_action(&self, admin_id: UserId, action: &str) -> Result<AdminLogEntry, AuditApiError> {
            self.0.log_admin_action(admin_id, action).await
        }

        async fn fetch_admin_log(&self, limit: i64) -> Result<Vec<AdminLogEntry>, AuditApiError> {
            self.0.fetch_admin_log(limit).await
        }
    }
}
