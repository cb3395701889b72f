//! Interface contracts of the engine's backends.
//!
//! The traits here define the behaviour a storage backend must expose in order to support the
//! Kassa engine, plus the contract of the external rate source:
//!
//! * [`SessionManagement`] — chat sessions, captcha fields, blocking.
//! * [`OrderManagement`] — order records, the terminal-once status transition, aggregates.
//! * [`InstrumentManagement`] — the admin-managed payment-instrument catalog.
//! * [`CommissionManagement`] — the append-only commission history.
//! * [`AdminAudit`] — the audit log of privileged actions.
//! * [`ExchangeDatabase`] — the umbrella bound the conversational APIs are generic over.
//! * [`RateProvider`] — the spot-price lookup (not a storage concern, but a seam in the same
//!   spirit: the engine never talks to the price API directly).
mod admin_management;
mod instrument_management;
mod order_management;
mod rate_provider;
mod session_management;

pub use admin_management::{AdminAudit, AuditApiError, CommissionApiError, CommissionManagement};
pub use instrument_management::{InstrumentApiError, InstrumentManagement};
pub use order_management::{OrderApiError, OrderManagement};
pub use rate_provider::{RateError, RateProvider};
pub use session_management::{SessionApiError, SessionManagement};

/// The highest-level bound for backends supporting the Kassa engine.
#[allow(async_fn_in_trait)]
pub trait ExchangeDatabase:
    Clone + SessionManagement + OrderManagement + InstrumentManagement + CommissionManagement + AdminAudit
{
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SessionApiError> {
        Ok(())
    }
}
