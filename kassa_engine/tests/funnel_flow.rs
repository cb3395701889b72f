//! End-to-end runs through the conversation funnel against a throwaway SQLite database.
use std::{sync::Arc, time::Instant};

use chrono::{Duration, Utc};
use kassa_engine::{
    db_types::{CryptoAsset, NewInstrument, OrderStatusType, UserId},
    funnel::{Contact, FunnelEffect, OperatorBrief, Prompt, Selection, UserInput},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        stubs::{FixedRates, NoHistoryDb, OfflineRates},
    },
    traits::{ExchangeDatabase, InstrumentManagement, OrderManagement, RateError, RateProvider, SessionManagement},
    ConversationStateMachine,
    SqliteDatabase,
};

const TOLERANCE: f64 = 1e-9;

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

async fn seed_instrument(db: &SqliteDatabase) {
    db.add_instrument(NewInstrument {
        bank_name: "Sberbank".to_string(),
        account_number: "1234567890123456".to_string(),
        recipient_name: "Ivan I.".to_string(),
    })
    .await
    .expect("Error seeding instrument");
}

fn machine(db: SqliteDatabase) -> ConversationStateMachine<SqliteDatabase, FixedRates> {
    ConversationStateMachine::new(db, FixedRates::default(), Duration::minutes(5))
}

fn reply(effects: &[FunnelEffect], i: usize) -> &Prompt {
    match &effects[i] {
        FunnelEffect::Reply(prompt) => prompt,
        other => panic!("Expected a reply at position {i}, got {other:?}"),
    }
}

fn brief(effects: &[FunnelEffect], i: usize) -> &OperatorBrief {
    match &effects[i] {
        FunnelEffect::NotifyOperator(brief) => brief,
        other => panic!("Expected an operator brief at position {i}, got {other:?}"),
    }
}

async fn pass_captcha<B: ExchangeDatabase, R: RateProvider>(
    fsm: &ConversationStateMachine<B, R>,
    db: &SqliteDatabase,
    contact: &Contact,
) {
    let effects = fsm.handle(contact.clone(), UserInput::Start).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::Welcome));
    assert!(matches!(reply(&effects, 1), Prompt::CaptchaChallenge { .. }));
    let session = db.fetch_session(contact.chat_id).await.unwrap().unwrap();
    let code = session.captcha_code.expect("Challenge should be stored on the session");
    let effects = fsm.handle(contact.clone(), UserInput::Text(code)).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::CaptchaPassed));
    assert!(matches!(reply(&effects, 1), Prompt::MainMenu));
}

#[tokio::test]
async fn full_purchase_walkthrough() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(100)).with_names(Some("Alice".to_string()), None);
    pass_captcha(&fsm, &db, &contact).await;

    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::ChooseAsset { .. }));

    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::EnterAmount { .. }));

    // 0.00041 BTC at 3,000,000 ₽/BTC with the default 2.5% commission
    let effects = fsm.handle(contact.clone(), UserInput::Text("0.00041 BTC".to_string())).await.unwrap();
    let Prompt::ChooseInstrument { quote, banks } = reply(&effects, 0) else {
        panic!("Expected the instrument menu, got {effects:?}");
    };
    assert_eq!(banks, &vec!["Sberbank".to_string()]);
    assert!((quote.fiat_principal.value() - 1230.0).abs() < TOLERANCE);
    assert!((quote.commission.value() - 30.75).abs() < TOLERANCE);
    assert!((quote.total_payable.value() - 1260.75).abs() < TOLERANCE);

    let effects =
        fsm.handle(contact.clone(), UserInput::Select(Selection::Instrument("Sberbank".to_string()))).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::EnterWalletAddress { .. }));

    let effects = fsm
        .handle(contact.clone(), UserInput::Text("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string()))
        .await
        .unwrap();
    let Prompt::PaymentDetails { instrument, total_payable } = reply(&effects, 0) else {
        panic!("Expected the payment details, got {effects:?}");
    };
    assert_eq!(instrument.account_number, "1234567890123456");
    assert!((total_payable.value() - 1260.75).abs() < TOLERANCE);

    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::ConfirmPaid)).await.unwrap();
    let Prompt::PaymentRegistered { order_id } = reply(&effects, 0) else {
        panic!("Expected the registration notice, got {effects:?}");
    };
    let brief = brief(&effects, 1);
    assert_eq!(brief.submitter_chat, UserId(100));
    assert_eq!(brief.submitter_name, "Alice");
    assert_eq!(brief.stats.total, 1);
    assert_eq!(brief.stats.completed, 0);
    assert_eq!(brief.order.id, *order_id);

    let order = db.fetch_order(*order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.wallet_address, "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa");
    assert_eq!(order.bank_name, "Sberbank");
    assert!((order.fiat_amount.value() - 1260.75).abs() < TOLERANCE);

    // The cooldown is still warm, so a restart skips the captcha, and the pending order blocks a
    // second purchase.
    let effects = fsm.handle(contact.clone(), UserInput::Start).await.unwrap();
    assert!(matches!(reply(&effects, 1), Prompt::MainMenu));
    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::PendingOrderExists));
}

#[tokio::test]
async fn captcha_mismatch_then_success() {
    let db = new_db().await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(101));
    let effects = fsm.handle(contact.clone(), UserInput::Start).await.unwrap();
    assert!(matches!(reply(&effects, 1), Prompt::CaptchaChallenge { .. }));

    let effects = fsm.handle(contact.clone(), UserInput::Text("not the code".to_string())).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::CaptchaMismatch));

    // The stored challenge is unchanged, so the real code still works
    let code = db.fetch_session(contact.chat_id).await.unwrap().unwrap().captcha_code.unwrap();
    let effects = fsm.handle(contact.clone(), UserInput::Text(code)).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::CaptchaPassed));
}

#[tokio::test]
async fn expired_captcha_is_reissued() {
    let db = new_db().await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(102));
    fsm.handle(contact.clone(), UserInput::Start).await.unwrap();

    // Backdate the stored challenge so even the correct answer arrives too late
    db.issue_captcha(contact.chat_id, "4321", Utc::now() - Duration::seconds(1)).await.unwrap();
    let effects = fsm.handle(contact.clone(), UserInput::Text("4321".to_string())).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::CaptchaExpired { .. }));

    let code = db.fetch_session(contact.chat_id).await.unwrap().unwrap().captcha_code.unwrap();
    assert_ne!(code, "4321");
    let effects = fsm.handle(contact.clone(), UserInput::Text(code)).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::CaptchaPassed));
}

#[tokio::test]
async fn bad_amounts_do_not_advance() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(103));
    pass_captcha(&fsm, &db, &contact).await;
    fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();

    for raw in ["-5", "abc", "0", "0 BTC"] {
        let effects = fsm.handle(contact.clone(), UserInput::Text(raw.to_string())).await.unwrap();
        assert!(matches!(reply(&effects, 0), Prompt::InvalidAmount), "{raw:?} should be rejected");
    }

    // Still at the amount stage: a valid entry goes straight through
    let effects = fsm.handle(contact.clone(), UserInput::Text("1000".to_string())).await.unwrap();
    let Prompt::ChooseInstrument { quote, .. } = reply(&effects, 0) else {
        panic!("Expected the instrument menu, got {effects:?}");
    };
    assert!((quote.total_payable.value() - 1025.0).abs() < TOLERANCE);
}

#[tokio::test]
async fn cancel_mid_funnel_leaves_no_residue() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(104));
    pass_captcha(&fsm, &db, &contact).await;
    fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("LTC".to_string()))).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Text("0.5 LTC".to_string())).await.unwrap();

    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::Cancel)).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::MainMenu));

    // A fresh run behaves exactly like the first
    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::ChooseAsset { .. }));
    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::EnterAmount { .. }));
}

#[tokio::test]
async fn wallet_validation_is_asset_specific() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(105));
    pass_captcha(&fsm, &db, &contact).await;
    fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Text("1000".to_string())).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Instrument("Sberbank".to_string()))).await.unwrap();

    for addr in ["0x0000", "LcHKxGnyBBtqUnu3k1qioGiGVXH4rUH1kM", "1abc"] {
        let effects = fsm.handle(contact.clone(), UserInput::Text(addr.to_string())).await.unwrap();
        assert!(matches!(reply(&effects, 0), Prompt::InvalidWalletAddress { .. }), "{addr:?} should be rejected");
    }

    let effects = fsm
        .handle(contact.clone(), UserInput::Text("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy".to_string()))
        .await
        .unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::PaymentDetails { .. }));
}

#[tokio::test]
async fn vanished_instrument_reprompts() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(106));
    pass_captcha(&fsm, &db, &contact).await;
    fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Text("1000".to_string())).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Instrument("Sberbank".to_string()))).await.unwrap();

    // An admin empties the catalog while the user is typing their address
    let instrument = db.list_instruments().await.unwrap().remove(0);
    db.remove_instrument(instrument.id).await.unwrap();

    let effects = fsm
        .handle(contact.clone(), UserInput::Text("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string()))
        .await
        .unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::InstrumentUnavailable));
    assert!(matches!(reply(&effects, 1), Prompt::NoInstrumentsAvailable));
}

#[tokio::test]
async fn rate_failure_reprompts_without_losing_the_stage() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let fsm = ConversationStateMachine::new(db.clone(), OfflineRates, Duration::minutes(5));
    let contact = Contact::new(UserId(107));
    pass_captcha(&fsm, &db, &contact).await;
    fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();

    for _ in 0..2 {
        let effects = fsm.handle(contact.clone(), UserInput::Text("1000".to_string())).await.unwrap();
        assert!(matches!(reply(&effects, 0), Prompt::RateUnavailable));
    }
}

#[tokio::test]
async fn empty_catalog_blocks_the_funnel() {
    let db = new_db().await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(108));
    pass_captcha(&fsm, &db, &contact).await;
    fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();
    let effects = fsm.handle(contact.clone(), UserInput::Text("1000".to_string())).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::NoInstrumentsAvailable));
}

#[tokio::test]
async fn blocked_users_are_turned_away() {
    let db = new_db().await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(109));
    pass_captcha(&fsm, &db, &contact).await;
    db.set_blocked(contact.chat_id, true).await.unwrap();

    for input in [UserInput::Start, UserInput::Select(Selection::BuyCrypto), UserInput::Text("hi".to_string())] {
        let effects = fsm.handle(contact.clone(), input).await.unwrap();
        assert_eq!(effects, vec![FunnelEffect::Reply(Prompt::Blocked)]);
    }
}

/// A provider that takes its time answering, for exercising funnel concurrency.
#[derive(Debug, Clone, Copy)]
struct SlowRates;

impl RateProvider for SlowRates {
    async fn rate_in_rub(&self, _asset: CryptoAsset) -> Result<f64, RateError> {
        tokio::time::sleep(std::time::Duration::from_millis(750)).await;
        Ok(3_000_000.0)
    }
}

#[tokio::test]
async fn a_slow_rate_lookup_stalls_only_its_own_chat() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let fsm = Arc::new(ConversationStateMachine::new(db.clone(), SlowRates, Duration::minutes(5)));
    let alice = Contact::new(UserId(112));
    let bob = Contact::new(UserId(113));
    pass_captcha(fsm.as_ref(), &db, &alice).await;
    fsm.handle(alice.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    fsm.handle(alice.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();

    // Alice's amount entry is stuck in the slow rate lookup...
    let busy = {
        let fsm = Arc::clone(&fsm);
        let alice = alice.clone();
        tokio::spawn(async move { fsm.handle(alice, UserInput::Text("1000".to_string())).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // ...while Bob enters the funnel without queueing behind her
    let started = Instant::now();
    let effects = fsm.handle(bob.clone(), UserInput::Start).await.unwrap();
    let waited = started.elapsed();
    assert!(matches!(reply(&effects, 1), Prompt::CaptchaChallenge { .. }));
    assert!(waited < std::time::Duration::from_millis(500), "Bob waited {waited:?} behind Alice's rate lookup");

    let effects = busy.await.unwrap().unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::ChooseInstrument { .. }));
}

#[tokio::test]
async fn submission_survives_a_failed_history_read() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let fsm = ConversationStateMachine::new(NoHistoryDb(db.clone()), FixedRates::default(), Duration::minutes(5));
    let contact = Contact::new(UserId(114));
    pass_captcha(&fsm, &db, &contact).await;
    fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Text("1000".to_string())).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Instrument("Sberbank".to_string()))).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Text("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string())).await.unwrap();

    // The order commits even though the follow-up history read for the brief fails
    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::ConfirmPaid)).await.unwrap();
    let Prompt::PaymentRegistered { order_id } = reply(&effects, 0) else {
        panic!("Expected the registration notice, got {effects:?}");
    };
    assert_eq!(brief(&effects, 1).stats.total, 0, "The brief falls back to empty history counters");

    // The draft is gone, so pressing "paid" again cannot duplicate the order
    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::ConfirmPaid)).await.unwrap();
    assert!(matches!(reply(&effects, 1), Prompt::MainMenu));
    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::PendingOrderExists));
    assert_eq!(db.order_aggregates().await.unwrap().total_orders, 1);
    assert_eq!(db.fetch_order(*order_id).await.unwrap().unwrap().status, OrderStatusType::Pending);
}

#[tokio::test]
async fn profile_reflects_order_history() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let fsm = machine(db.clone());
    let contact = Contact::new(UserId(110));
    pass_captcha(&fsm, &db, &contact).await;

    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::Profile)).await.unwrap();
    assert!(matches!(reply(&effects, 0), Prompt::ProfileEmpty));

    fsm.handle(contact.clone(), UserInput::Select(Selection::BuyCrypto)).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Asset("BTC".to_string()))).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Text("1000".to_string())).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::Instrument("Sberbank".to_string()))).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Text("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string())).await.unwrap();
    fsm.handle(contact.clone(), UserInput::Select(Selection::ConfirmPaid)).await.unwrap();

    fsm.handle(contact.clone(), UserInput::Start).await.unwrap();
    let effects = fsm.handle(contact.clone(), UserInput::Select(Selection::Profile)).await.unwrap();
    let Prompt::Profile(profile) = reply(&effects, 0) else {
        panic!("Expected a profile summary, got {effects:?}");
    };
    assert_eq!(profile.total_orders, 1);
    assert_eq!(profile.last_wallet.as_deref(), Some("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
}
