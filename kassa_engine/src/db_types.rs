use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
pub use ckb_common::{CryptoAmount, Rub};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

/// Commission applied when the history table is empty.
pub const DEFAULT_COMMISSION_RATE: f64 = 2.5;

//--------------------------------------      UserId       -----------------------------------------------------------
/// The stable external chat identity of a participant (what the transport calls a chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl UserId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------    CryptoAsset    -----------------------------------------------------------
/// The fixed set of assets the service sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
pub enum CryptoAsset {
    Btc,
    Ltc,
}

impl CryptoAsset {
    pub const ALL: [CryptoAsset; 2] = [CryptoAsset::Btc, CryptoAsset::Ltc];

    pub fn symbol(&self) -> &'static str {
        match self {
            CryptoAsset::Btc => "BTC",
            CryptoAsset::Ltc => "LTC",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CryptoAsset::Btc => "Bitcoin (BTC)",
            CryptoAsset::Ltc => "Litecoin (LTC)",
        }
    }

    /// The identifier the CoinGecko price endpoint expects.
    pub fn coingecko_id(&self) -> &'static str {
        match self {
            CryptoAsset::Btc => "bitcoin",
            CryptoAsset::Ltc => "litecoin",
        }
    }

    fn wallet_pattern(&self) -> &'static str {
        match self {
            CryptoAsset::Btc => r"^(1|3|bc1)[a-zA-Z0-9]{25,39}$",
            CryptoAsset::Ltc => r"^(L|M|ltc1)[a-zA-Z0-9]{25,39}$",
        }
    }

    /// Shape-checks a destination wallet address for this asset.
    pub fn is_valid_wallet_address(&self, address: &str) -> bool {
        let pattern = regex::Regex::new(self.wallet_pattern()).unwrap();
        pattern.is_match(address)
    }
}

impl Display for CryptoAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unsupported asset: {0}")]
pub struct UnsupportedAsset(pub String);

impl FromStr for CryptoAsset {
    type Err = UnsupportedAsset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" => Ok(CryptoAsset::Btc),
            "LTC" => Ok(CryptoAsset::Ltc),
            other => Err(UnsupportedAsset(other.to_string())),
        }
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Submitted by the user, waiting for the operator's decision.
    Pending,
    /// The operator confirmed receipt of payment and released the funds.
    Completed,
    /// The operator declined the order.
    Rejected,
}

impl OrderStatusType {
    /// Terminal statuses permit no further mutation of the order.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Rejected => write!(f, "Rejected"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for OrderStatusType {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Rejected" => Ok(Self::Rejected),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------    UserSession    -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserSession {
    pub id: i64,
    pub chat_id: UserId,
    pub first_name: Option<String>,
    pub username: Option<String>,
    pub is_blocked: bool,
    pub captcha_code: Option<String>,
    pub captcha_expires_at: Option<DateTime<Utc>>,
    pub last_action_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSession {
    pub fn display_name(&self) -> String {
        self.first_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| format!("User {}", self.chat_id))
    }

    /// A fresh challenge is required only when more than `cooldown` has passed since the last
    /// verified action.
    pub fn needs_captcha(&self, cooldown: Duration, now: DateTime<Utc>) -> bool {
        match self.last_action_at {
            Some(last) => now - last > cooldown,
            None => true,
        }
    }
}

/// The identity data that arrives with every inbound chat update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub chat_id: UserId,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl NewSession {
    pub fn new(chat_id: UserId) -> Self {
        Self { chat_id, first_name: None, username: None }
    }

    pub fn with_names(mut self, first_name: Option<String>, username: Option<String>) -> Self {
        self.first_name = first_name;
        self.username = username;
        self
    }
}

//------------------------------------   PaymentInstrument   ---------------------------------------------------------
/// An admin-managed bank/card target users pay into.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentInstrument {
    pub id: i64,
    pub bank_name: String,
    pub account_number: String,
    pub recipient_name: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstrument {
    pub bank_name: String,
    pub account_number: String,
    pub recipient_name: String,
}

/// A point-in-time copy of an instrument's details. Orders carry a snapshot rather than a live
/// reference, so later edits or deletions never change what the user was told to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub bank_name: String,
    pub account_number: String,
    pub recipient_name: String,
}

impl From<&PaymentInstrument> for InstrumentSnapshot {
    fn from(instrument: &PaymentInstrument) -> Self {
        Self {
            bank_name: instrument.bank_name.clone(),
            account_number: instrument.account_number.clone(),
            recipient_name: instrument.recipient_name.clone(),
        }
    }
}

//------------------------------------   CommissionSetting   ---------------------------------------------------------
/// One row of the append-only commission history. The current rate is the most recent row.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CommissionSetting {
    pub id: i64,
    pub rate: f64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       Order       -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub session_id: i64,
    pub asset: CryptoAsset,
    pub crypto_amount: CryptoAmount,
    /// The total the user was asked to pay, commission included.
    pub fiat_amount: Rub,
    /// The spot rate (₽ per whole coin) the quote was computed at.
    pub rate: f64,
    pub wallet_address: String,
    pub bank_name: String,
    pub account_number: String,
    pub recipient_name: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub session_id: i64,
    pub asset: CryptoAsset,
    pub crypto_amount: CryptoAmount,
    pub fiat_amount: Rub,
    pub rate: f64,
    pub wallet_address: String,
    pub instrument: InstrumentSnapshot,
}

//--------------------------------------    Aggregates     -----------------------------------------------------------
/// Per-session order counters shown to the operator alongside a new order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOrderStats {
    pub total: i64,
    pub completed: i64,
}

/// The read-only profile summary a user can request from the main menu.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub total_orders: i64,
    pub lifetime_fiat: Rub,
    pub last_wallet: Option<String>,
    pub last_asset: Option<CryptoAsset>,
    pub last_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub status: OrderStatusType,
    pub count: i64,
}

/// Raw order-table aggregates; the admin API combines these with the commission rate and session
/// count into the full statistics report.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAggregates {
    /// Sum of `fiat_amount` over completed orders.
    pub turnover: Rub,
    pub total_orders: i64,
    pub by_status: Vec<StatusCount>,
}

//--------------------------------------   AdminLogEntry   -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AdminLogEntry {
    pub id: i64,
    pub admin_id: UserId,
    pub action: String,
    pub logged_at: DateTime<Utc>,
}
