use thiserror::Error;

use crate::db_types::CryptoAsset;

#[derive(Debug, Clone, Error)]
pub enum RateError {
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),
    #[error("Rate source unavailable: {0}")]
    Unavailable(String),
}

/// A spot-price source. No retries and no caching: every quote is a fresh call, and the caller
/// decides what a failure means for its own flow.
#[allow(async_fn_in_trait)]
pub trait RateProvider {
    /// The current price of one whole unit of `asset`, in rubles.
    async fn rate_in_rub(&self, asset: CryptoAsset) -> Result<f64, RateError>;
}
