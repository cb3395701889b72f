use thiserror::Error;

use crate::traits::{CommissionApiError, InstrumentApiError, OrderApiError, SessionApiError};

/// A funnel call failed before it could change anything. The chat's stage is left as it was, so
/// the user can simply repeat the action.
#[derive(Debug, Clone, Error)]
pub enum FunnelError {
    #[error("Session storage error: {0}")]
    SessionStorage(#[from] SessionApiError),
    #[error("Order storage error: {0}")]
    OrderStorage(#[from] OrderApiError),
    #[error("Instrument storage error: {0}")]
    InstrumentStorage(#[from] InstrumentApiError),
    #[error("Commission storage error: {0}")]
    CommissionStorage(#[from] CommissionApiError),
}
