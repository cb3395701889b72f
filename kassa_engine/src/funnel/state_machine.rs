use std::{collections::HashMap, sync::Arc};

use chrono::{Duration, Utc};
use log::*;
use tokio::sync::Mutex;

use super::{
    effects::{FunnelEffect, OperatorBrief, Prompt},
    errors::FunnelError,
    stage::ConversationStage,
};
use crate::{
    captcha::{self, CaptchaOutcome},
    db_types::{CryptoAsset, InstrumentSnapshot, NewOrder, NewSession, SessionOrderStats, UserId, UserSession},
    pricing,
    traits::{ExchangeDatabase, RateProvider},
};

/// The identity data arriving with every inbound chat update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub chat_id: UserId,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl Contact {
    pub fn new(chat_id: UserId) -> Self {
        Self { chat_id, first_name: None, username: None }
    }

    pub fn with_names(mut self, first_name: Option<String>, username: Option<String>) -> Self {
        self.first_name = first_name;
        self.username = username;
        self
    }
}

/// A button press, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    BuyCrypto,
    Profile,
    Asset(String),
    Instrument(String),
    ConfirmPaid,
    DeclinePayment,
    Cancel,
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Start,
    Text(String),
    Select(Selection),
}

/// The stage of one chat, behind its own lock. `None` means idle.
type StageSlot = Arc<Mutex<Option<ConversationStage>>>;

/// Walks each chat through the funnel, one stage at a time.
///
/// Stage state is in-memory only and is lost on restart by design: the user simply starts over,
/// and everything durable (session, orders) is already in the database. Each chat has its own
/// stage lock, held for the whole transition, so a chat can never race itself while slow work on
/// one chat (a rate lookup, say) never delays any other. The outer map lock is only held long
/// enough to find the chat's slot.
pub struct ConversationStateMachine<B, R> {
    db: B,
    rates: R,
    captcha_timeout: Duration,
    captcha_cooldown: Duration,
    stages: Mutex<HashMap<UserId, StageSlot>>,
}

impl<B, R> ConversationStateMachine<B, R>
where
    B: ExchangeDatabase,
    R: RateProvider,
{
    /// Creates a state machine whose captcha re-verification cooldown equals the challenge
    /// timeout. Use [`with_captcha_cooldown`](Self::with_captcha_cooldown) to widen it.
    pub fn new(db: B, rates: R, captcha_timeout: Duration) -> Self {
        Self { db, rates, captcha_timeout, captcha_cooldown: captcha_timeout, stages: Mutex::new(HashMap::new()) }
    }

    pub fn with_captcha_cooldown(mut self, cooldown: Duration) -> Self {
        self.captcha_cooldown = cooldown;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    async fn stage_slot(&self, chat: UserId) -> StageSlot {
        let mut stages = self.stages.lock().await;
        stages.entry(chat).or_default().clone()
    }

    /// Processes one inbound update and returns the effects to act on.
    ///
    /// Every call refreshes the session's identity fields first, then applies the blocked gate.
    /// Storage failures propagate as [`FunnelError`] *before* the stage is changed, so a failed
    /// action can simply be retried.
    pub async fn handle(&self, contact: Contact, input: UserInput) -> Result<Vec<FunnelEffect>, FunnelError> {
        let new_session = NewSession::new(contact.chat_id).with_names(contact.first_name, contact.username);
        let session = self.db.upsert_session(new_session).await?;
        if session.is_blocked {
            debug!("🎯 Dropping input from blocked chat {}", session.chat_id);
            return Ok(vec![FunnelEffect::Reply(Prompt::Blocked)]);
        }
        let chat = session.chat_id;
        let slot = self.stage_slot(chat).await;
        let mut current = slot.lock().await;
        // An explicit start, or any contact from an idle chat, resets the funnel.
        let stage = match (&input, current.as_ref()) {
            (UserInput::Start, _) | (_, None) => return self.begin(&session, &mut current).await,
            (_, Some(stage)) => stage.clone(),
        };
        if input == UserInput::Select(Selection::Cancel) && stage.allows_generic_cancel() {
            *current = Some(ConversationStage::MainMenu);
            debug!("🎯 Chat {chat} cancelled out of {stage:?}");
            return Ok(vec![FunnelEffect::Reply(Prompt::MainMenu)]);
        }
        match stage {
            ConversationStage::AwaitingCaptcha => self.on_captcha_answer(&session, input, &mut current).await,
            ConversationStage::MainMenu => self.on_main_menu(&session, input, &mut current).await,
            ConversationStage::ChoosingAsset => self.on_asset_choice(chat, input, &mut current),
            ConversationStage::EnteringAmount { asset } => self.on_amount(chat, asset, input, &mut current).await,
            ConversationStage::ChoosingInstrument { quote } => {
                self.on_instrument_choice(chat, quote, input, &mut current).await
            },
            ConversationStage::EnteringWalletAddress { quote, bank_name } => {
                self.on_wallet_address(chat, quote, bank_name, input, &mut current).await
            },
            ConversationStage::ConfirmingPayment { quote, wallet_address, instrument } => {
                self.on_confirmation(&session, quote, wallet_address, instrument, input, &mut current).await
            },
        }
    }

    async fn begin(
        &self,
        session: &UserSession,
        current: &mut Option<ConversationStage>,
    ) -> Result<Vec<FunnelEffect>, FunnelError> {
        let chat = session.chat_id;
        if session.needs_captcha(self.captcha_cooldown, Utc::now()) {
            let challenge = captcha::generate_challenge(self.captcha_timeout);
            self.db.issue_captcha(chat, &challenge.code, challenge.expires_at).await?;
            *current = Some(ConversationStage::AwaitingCaptcha);
            debug!("🎯 Chat {chat} must pass the captcha before entering the funnel");
            Ok(vec![
                FunnelEffect::Reply(Prompt::Welcome),
                FunnelEffect::Reply(Prompt::CaptchaChallenge { code: challenge.code }),
            ])
        } else {
            self.db.touch_last_action(chat, Utc::now()).await?;
            *current = Some(ConversationStage::MainMenu);
            Ok(vec![FunnelEffect::Reply(Prompt::Welcome), FunnelEffect::Reply(Prompt::MainMenu)])
        }
    }

    async fn on_captcha_answer(
        &self,
        session: &UserSession,
        input: UserInput,
        current: &mut Option<ConversationStage>,
    ) -> Result<Vec<FunnelEffect>, FunnelError> {
        let chat = session.chat_id;
        let UserInput::Text(answer) = input else {
            return Ok(vec![FunnelEffect::Reply(Prompt::InvalidInput)]);
        };
        let (Some(code), Some(expires_at)) = (session.captcha_code.as_deref(), session.captcha_expires_at) else {
            warn!("🎯 Chat {chat} is awaiting a captcha but the session holds no challenge");
            return Ok(vec![FunnelEffect::Reply(Prompt::CaptchaMissing)]);
        };
        match captcha::verify(code, expires_at, answer.trim(), Utc::now()) {
            CaptchaOutcome::Verified => {
                self.db.clear_captcha(chat, Utc::now()).await?;
                *current = Some(ConversationStage::MainMenu);
                info!("🎯 Chat {chat} passed the captcha");
                Ok(vec![FunnelEffect::Reply(Prompt::CaptchaPassed), FunnelEffect::Reply(Prompt::MainMenu)])
            },
            CaptchaOutcome::Expired => {
                let challenge = captcha::generate_challenge(self.captcha_timeout);
                self.db.issue_captcha(chat, &challenge.code, challenge.expires_at).await?;
                debug!("🎯 Chat {chat} answered an expired captcha. A fresh one has been issued");
                Ok(vec![FunnelEffect::Reply(Prompt::CaptchaExpired { code: challenge.code })])
            },
            CaptchaOutcome::Mismatch => Ok(vec![FunnelEffect::Reply(Prompt::CaptchaMismatch)]),
        }
    }

    async fn on_main_menu(
        &self,
        session: &UserSession,
        input: UserInput,
        current: &mut Option<ConversationStage>,
    ) -> Result<Vec<FunnelEffect>, FunnelError> {
        let chat = session.chat_id;
        match input {
            UserInput::Select(Selection::BuyCrypto) => {
                // One live order at a time per session
                if self.db.pending_order_for_session(session.id).await?.is_some() {
                    debug!("🎯 Chat {chat} already has a pending order");
                    return Ok(vec![FunnelEffect::Reply(Prompt::PendingOrderExists)]);
                }
                *current = Some(ConversationStage::ChoosingAsset);
                Ok(vec![FunnelEffect::Reply(Prompt::ChooseAsset { assets: CryptoAsset::ALL.to_vec() })])
            },
            UserInput::Select(Selection::Profile) => {
                let profile = self.db.profile_for_session(session.id).await?;
                let prompt =
                    if profile.total_orders == 0 { Prompt::ProfileEmpty } else { Prompt::Profile(profile) };
                Ok(vec![FunnelEffect::Reply(prompt)])
            },
            _ => Ok(vec![FunnelEffect::Reply(Prompt::InvalidInput), FunnelEffect::Reply(Prompt::MainMenu)]),
        }
    }

    fn on_asset_choice(
        &self,
        chat: UserId,
        input: UserInput,
        current: &mut Option<ConversationStage>,
    ) -> Result<Vec<FunnelEffect>, FunnelError> {
        let label = match input {
            UserInput::Select(Selection::Asset(label)) | UserInput::Text(label) => label,
            _ => return Ok(vec![FunnelEffect::Reply(Prompt::InvalidAsset)]),
        };
        match label.trim().parse::<CryptoAsset>() {
            Ok(asset) => {
                *current = Some(ConversationStage::EnteringAmount { asset });
                Ok(vec![FunnelEffect::Reply(Prompt::EnterAmount { asset })])
            },
            Err(_) => Ok(vec![FunnelEffect::Reply(Prompt::InvalidAsset)]),
        }
    }

    async fn on_amount(
        &self,
        chat: UserId,
        asset: CryptoAsset,
        input: UserInput,
        current: &mut Option<ConversationStage>,
    ) -> Result<Vec<FunnelEffect>, FunnelError> {
        let UserInput::Text(raw) = input else {
            return Ok(vec![FunnelEffect::Reply(Prompt::InvalidAmount)]);
        };
        let rate = match self.rates.rate_in_rub(asset).await {
            Ok(rate) => rate,
            Err(e) => {
                warn!("💱 Rate lookup for {asset} failed: {e}");
                return Ok(vec![FunnelEffect::Reply(Prompt::RateUnavailable)]);
            },
        };
        let commission = self.db.current_commission_rate().await?;
        let quote = match pricing::compute_order(&raw, asset, rate, commission) {
            Ok(quote) => quote,
            Err(e) => {
                debug!("🎯 Chat {chat} entered a bad amount: {e}");
                return Ok(vec![FunnelEffect::Reply(Prompt::InvalidAmount)]);
            },
        };
        let banks = self.db.list_banks().await?;
        if banks.is_empty() {
            debug!("🎯 No payment instruments on offer; chat {chat} cannot proceed");
            return Ok(vec![FunnelEffect::Reply(Prompt::NoInstrumentsAvailable)]);
        }
        *current = Some(ConversationStage::ChoosingInstrument { quote });
        Ok(vec![FunnelEffect::Reply(Prompt::ChooseInstrument { quote, banks })])
    }

    async fn on_instrument_choice(
        &self,
        chat: UserId,
        quote: pricing::Quote,
        input: UserInput,
        current: &mut Option<ConversationStage>,
    ) -> Result<Vec<FunnelEffect>, FunnelError> {
        let bank = match input {
            UserInput::Select(Selection::Back) => {
                *current = Some(ConversationStage::ChoosingAsset);
                return Ok(vec![FunnelEffect::Reply(Prompt::ChooseAsset { assets: CryptoAsset::ALL.to_vec() })]);
            },
            UserInput::Select(Selection::Instrument(bank)) | UserInput::Text(bank) => bank,
            _ => return Ok(vec![FunnelEffect::Reply(Prompt::InvalidInstrument)]),
        };
        let bank = bank.trim().to_string();
        // Re-fetch at selection time; the catalog may have changed since the list was shown
        match self.db.fetch_instrument_by_bank(&bank).await? {
            Some(_) => {
                *current = Some(ConversationStage::EnteringWalletAddress { quote, bank_name: bank });
                Ok(vec![FunnelEffect::Reply(Prompt::EnterWalletAddress { asset: quote.asset })])
            },
            None => Ok(vec![FunnelEffect::Reply(Prompt::InvalidInstrument)]),
        }
    }

    async fn on_wallet_address(
        &self,
        chat: UserId,
        quote: pricing::Quote,
        bank_name: String,
        input: UserInput,
        current: &mut Option<ConversationStage>,
    ) -> Result<Vec<FunnelEffect>, FunnelError> {
        let UserInput::Text(address) = input else {
            return Ok(vec![FunnelEffect::Reply(Prompt::InvalidWalletAddress { asset: quote.asset })]);
        };
        let address = address.trim().to_string();
        if !quote.asset.is_valid_wallet_address(&address) {
            debug!("🎯 Chat {chat} entered a malformed {} address", quote.asset);
            return Ok(vec![FunnelEffect::Reply(Prompt::InvalidWalletAddress { asset: quote.asset })]);
        }
        match self.db.fetch_instrument_by_bank(&bank_name).await? {
            Some(instrument) => {
                let instrument = InstrumentSnapshot::from(&instrument);
                let total_payable = quote.total_payable;
                *current = Some(ConversationStage::ConfirmingPayment {
                    quote,
                    wallet_address: address,
                    instrument: instrument.clone(),
                });
                Ok(vec![FunnelEffect::Reply(Prompt::PaymentDetails { instrument, total_payable })])
            },
            // The chosen bank vanished underneath us (concurrent catalog edit)
            None => {
                let banks = self.db.list_banks().await?;
                if banks.is_empty() {
                    *current = Some(ConversationStage::MainMenu);
                    return Ok(vec![
                        FunnelEffect::Reply(Prompt::InstrumentUnavailable),
                        FunnelEffect::Reply(Prompt::NoInstrumentsAvailable),
                        FunnelEffect::Reply(Prompt::MainMenu),
                    ]);
                }
                *current = Some(ConversationStage::ChoosingInstrument { quote });
                Ok(vec![
                    FunnelEffect::Reply(Prompt::InstrumentUnavailable),
                    FunnelEffect::Reply(Prompt::ChooseInstrument { quote, banks }),
                ])
            },
        }
    }

    async fn on_confirmation(
        &self,
        session: &UserSession,
        quote: pricing::Quote,
        wallet_address: String,
        instrument: InstrumentSnapshot,
        input: UserInput,
        current: &mut Option<ConversationStage>,
    ) -> Result<Vec<FunnelEffect>, FunnelError> {
        let chat = session.chat_id;
        match input {
            UserInput::Select(Selection::ConfirmPaid) => {
                let order = self
                    .db
                    .insert_order(NewOrder {
                        session_id: session.id,
                        asset: quote.asset,
                        crypto_amount: quote.crypto_amount,
                        fiat_amount: quote.total_payable,
                        rate: quote.rate,
                        wallet_address,
                        instrument,
                    })
                    .await?;
                // The order is committed. Clear the stage before anything else can fail, or a
                // retried "paid" would insert a duplicate.
                *current = None;
                info!("🎯 Chat {chat} submitted order #{} ({} for {})", order.id, order.crypto_amount, order.fiat_amount);
                let stats = match self.db.order_stats_for_session(session.id).await {
                    Ok(stats) => stats,
                    Err(e) => {
                        warn!("🎯 Could not load order history for the brief on order #{}: {e}", order.id);
                        SessionOrderStats::default()
                    },
                };
                let brief = OperatorBrief {
                    submitter_chat: chat,
                    submitter_name: session.display_name(),
                    stats,
                    order: order.clone(),
                };
                Ok(vec![
                    FunnelEffect::Reply(Prompt::PaymentRegistered { order_id: order.id }),
                    FunnelEffect::NotifyOperator(brief),
                ])
            },
            UserInput::Select(Selection::DeclinePayment) => {
                *current = Some(ConversationStage::MainMenu);
                debug!("🎯 Chat {chat} declined at the confirmation step");
                Ok(vec![FunnelEffect::Reply(Prompt::DeclineAcknowledged), FunnelEffect::Reply(Prompt::MainMenu)])
            },
            // The draft survives stray input at the final step
            _ => Ok(vec![FunnelEffect::Reply(Prompt::InvalidInput)]),
        }
    }
}
