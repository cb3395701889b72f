//! The CoinGecko spot-price adapter.

use kassa_engine::{
    db_types::CryptoAsset,
    traits::{RateError, RateProvider},
};
use log::*;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone)]
pub struct CoinGecko {
    client: reqwest::Client,
    base_url: String,
}

impl Default for CoinGecko {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl CoinGecko {
    pub fn new(base_url: &str) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.trim_end_matches('/').to_string() }
    }
}

impl RateProvider for CoinGecko {
    async fn rate_in_rub(&self, asset: CryptoAsset) -> Result<f64, RateError> {
        let id = asset.coingecko_id();
        let url = format!("{}/simple/price?ids={id}&vs_currencies=rub", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| RateError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RateError::Unavailable(format!("price endpoint returned {}", response.status())));
        }
        let body: serde_json::Value =
            response.json().await.map_err(|e| RateError::Unavailable(e.to_string()))?;
        let rate = body
            .get(id)
            .and_then(|entry| entry.get("rub"))
            .and_then(|price| price.as_f64())
            .ok_or_else(|| RateError::Unavailable(format!("no RUB price for {id} in the response")))?;
        trace!("💱 {asset} = {rate} ₽");
        Ok(rate)
    }
}
