use crate::{
    db_types::{CryptoAsset, InstrumentSnapshot},
    pricing::Quote,
};

/// Where a chat currently is in the funnel. Idle chats simply have no entry in the stage map.
///
/// Each variant carries exactly the draft fields accumulated so far, so the only way to reach
/// submission is through every preceding stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationStage {
    /// A challenge has been issued and stored on the session; waiting for the answer.
    AwaitingCaptcha,
    MainMenu,
    ChoosingAsset,
    EnteringAmount { asset: CryptoAsset },
    ChoosingInstrument { quote: Quote },
    EnteringWalletAddress { quote: Quote, bank_name: String },
    ConfirmingPayment { quote: Quote, wallet_address: String, instrument: InstrumentSnapshot },
}

impl ConversationStage {
    /// The generic cancel shortcut works mid-funnel only. The captcha gate cannot be skipped, and
    /// at the confirmation step the explicit decline button is the only way out.
    pub fn allows_generic_cancel(&self) -> bool {
        !matches!(self, ConversationStage::AwaitingCaptcha | ConversationStage::ConfirmingPayment { .. })
    }
}
