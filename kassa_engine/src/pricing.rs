//! The pricing engine. Pure functions, no I/O.
//!
//! Commission is always a percentage of the fiat principal and is *added* to what the user pays:
//! the buyer receives the requested crypto amount in full, and the markup lands entirely on the
//! fiat side.

use ckb_common::{CryptoAmount, Rub};
use thiserror::Error;

use crate::db_types::CryptoAsset;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// A raw amount entry, resolved to the side of the trade it denominates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmountInput {
    Fiat(f64),
    Crypto(f64),
}

/// The computed terms of an order before the user commits to it.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quote {
    pub asset: CryptoAsset,
    /// What the buyer receives.
    pub crypto_amount: CryptoAmount,
    /// The fiat value of the crypto at the quoted rate, before commission.
    pub fiat_principal: Rub,
    pub commission: Rub,
    /// `fiat_principal + commission` — what the buyer must transfer.
    pub total_payable: Rub,
    /// Spot rate in ₽ per whole coin.
    pub rate: f64,
    pub commission_percent: f64,
}

/// Parses `<positive-decimal> [unit]` where unit is the chosen asset's symbol or the fiat symbol,
/// case-insensitive. Unit-less input is read as fiat when the value is >= 1 and as crypto
/// otherwise. That threshold rule is carried over from the legacy service on purpose; a unit-less
/// "0.5" means half a coin, not half a ruble.
pub fn parse_amount(raw: &str, asset: CryptoAsset) -> Result<AmountInput, PricingError> {
    let pattern = format!(r"(?i)^(\d+(\.\d+)?)\s*({}|₽|RUB)?$", asset.symbol());
    let grammar = regex::Regex::new(&pattern).unwrap();
    let caps = grammar
        .captures(raw.trim())
        .ok_or_else(|| PricingError::InvalidAmount(format!("'{raw}' does not match <amount> [unit]")))?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| PricingError::InvalidAmount(format!("'{}' is not a number", &caps[1])))?;
    if value <= 0.0 {
        return Err(PricingError::InvalidAmount("amount must be positive".to_string()));
    }
    let input = match caps.get(3) {
        Some(unit) => {
            let unit = unit.as_str().to_uppercase();
            if unit == "₽" || unit == "RUB" {
                AmountInput::Fiat(value)
            } else {
                AmountInput::Crypto(value)
            }
        },
        None if value >= 1.0 => AmountInput::Fiat(value),
        None => AmountInput::Crypto(value),
    };
    Ok(input)
}

/// Computes the full quote for a raw amount entry at the given spot rate and commission.
pub fn compute_order(
    raw: &str,
    asset: CryptoAsset,
    rate: f64,
    commission_percent: f64,
) -> Result<Quote, PricingError> {
    let (crypto, principal) = match parse_amount(raw, asset)? {
        AmountInput::Fiat(fiat) => (fiat / rate, fiat),
        AmountInput::Crypto(crypto) => (crypto, crypto * rate),
    };
    let fiat_principal = Rub::from(principal);
    let commission = fiat_principal.percent(commission_percent);
    Ok(Quote {
        asset,
        crypto_amount: CryptoAmount::from(crypto),
        fiat_principal,
        commission,
        total_payable: fiat_principal + commission,
        rate,
        commission_percent,
    })
}
