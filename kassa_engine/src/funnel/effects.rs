use ckb_common::Rub;

use crate::{
    db_types::{CryptoAsset, InstrumentSnapshot, Order, ProfileSummary, SessionOrderStats, UserId},
    pricing::Quote,
};

/// What the funnel wants said to the user. Rendering these into actual message text (and into
/// whatever keyboard the transport offers) is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Welcome,
    Blocked,
    CaptchaChallenge { code: String },
    CaptchaExpired { code: String },
    CaptchaMismatch,
    /// No challenge is stored on the session. The user should restart.
    CaptchaMissing,
    CaptchaPassed,
    MainMenu,
    Profile(ProfileSummary),
    ProfileEmpty,
    ChooseAsset { assets: Vec<CryptoAsset> },
    InvalidAsset,
    EnterAmount { asset: CryptoAsset },
    InvalidAmount,
    RateUnavailable,
    NoInstrumentsAvailable,
    ChooseInstrument { quote: Quote, banks: Vec<String> },
    InvalidInstrument,
    EnterWalletAddress { asset: CryptoAsset },
    InvalidWalletAddress { asset: CryptoAsset },
    /// The chosen instrument vanished between selection and wallet entry.
    InstrumentUnavailable,
    PaymentDetails { instrument: InstrumentSnapshot, total_payable: Rub },
    PaymentRegistered { order_id: i64 },
    DeclineAcknowledged,
    PendingOrderExists,
    InvalidInput,
}

/// The notification sent to the operator when an order is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorBrief {
    pub order: Order,
    pub submitter_chat: UserId,
    pub submitter_name: String,
    pub stats: SessionOrderStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunnelEffect {
    /// Deliver a prompt to the chat the input came from.
    Reply(Prompt),
    /// Deliver an order brief to the operator.
    NotifyOperator(OperatorBrief),
}
