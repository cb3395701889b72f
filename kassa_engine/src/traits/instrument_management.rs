use thiserror::Error;

use crate::db_types::{NewInstrument, PaymentInstrument};

#[derive(Debug, Clone, Error)]
pub enum InstrumentApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("An instrument with account number {0} already exists")]
    DuplicateAccountNumber(String),
    #[error("Instrument {0} does not exist")]
    InstrumentNotFound(i64),
}

impl From<sqlx::Error> for InstrumentApiError {
    fn from(e: sqlx::Error) -> Self {
        InstrumentApiError::DatabaseError(e.to_string())
    }
}

/// The admin-managed catalog of payment instruments offered to buyers.
#[allow(async_fn_in_trait)]
pub trait InstrumentManagement {
    /// Adds an instrument. Account numbers are unique across the catalog.
    async fn add_instrument(&self, instrument: NewInstrument) -> Result<PaymentInstrument, InstrumentApiError>;

    /// Removes an instrument by id. Existing orders keep their snapshotted copy of its details.
    async fn remove_instrument(&self, id: i64) -> Result<PaymentInstrument, InstrumentApiError>;

    async fn fetch_instrument(&self, id: i64) -> Result<Option<PaymentInstrument>, InstrumentApiError>;

    async fn list_instruments(&self) -> Result<Vec<PaymentInstrument>, InstrumentApiError>;

    /// The distinct bank names currently on offer, in catalog order.
    async fn list_banks(&self) -> Result<Vec<String>, InstrumentApiError>;

    /// An arbitrary instrument for the given bank, or `None` if the bank has none left.
    async fn fetch_instrument_by_bank(&self, bank_name: &str)
        -> Result<Option<PaymentInstrument>, InstrumentApiError>;
}
