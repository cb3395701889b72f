//! End-to-end routing tests: inbound updates go in, rendered messages come out.
use std::sync::{Arc, Mutex};

use kassa_bot::{
    config::BotConfig,
    messenger::{ChatMessenger, DeliveryError, OutboundMessage},
    router::{InboundUpdate, Router, UpdateKind},
    schedule::ServiceSchedule,
};
use kassa_engine::{
    db_types::{NewInstrument, UserId},
    funnel::Contact,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        stubs::FixedRates,
    },
    traits::{InstrumentManagement, SessionManagement},
    SqliteDatabase,
};

const OPERATOR: UserId = UserId(900);
const ADMIN: UserId = UserId(1);
const USER: UserId = UserId(100);

/// Captures every outbound message instead of delivering it.
#[derive(Clone, Default)]
struct RecordingMessenger {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl RecordingMessenger {
    fn take(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().drain(..).collect()
    }

    fn last_text_for(&self, chat: UserId) -> String {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.chat_id == chat)
            .map(|m| m.text.clone())
            .unwrap_or_default()
    }
}

impl ChatMessenger for RecordingMessenger {
    async fn send(&self, message: OutboundMessage) -> Result<i64, DeliveryError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message);
        Ok(sent.len() as i64)
    }

    async fn edit(&self, _chat_id: UserId, _message_id: i64, _text: &str) -> Result<(), DeliveryError> {
        Ok(())
    }

    async fn delete(&self, _chat_id: UserId, _message_id: i64) -> Result<(), DeliveryError> {
        Ok(())
    }
}

fn test_config() -> BotConfig {
    BotConfig { operator_id: OPERATOR, admin_ids: vec![ADMIN], ..BotConfig::default() }
}

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.unwrap()
}

fn new_router(
    db: SqliteDatabase,
    schedule: ServiceSchedule,
) -> (Router<SqliteDatabase, FixedRates, RecordingMessenger>, RecordingMessenger) {
    let messenger = RecordingMessenger::default();
    let router = Router::new(db, FixedRates::default(), messenger.clone(), schedule, &test_config());
    (router, messenger)
}

fn command(chat: UserId, text: &str) -> InboundUpdate {
    InboundUpdate { contact: Contact::new(chat), kind: UpdateKind::Command(text.to_string()) }
}

fn text(chat: UserId, text: &str) -> InboundUpdate {
    InboundUpdate { contact: Contact::new(chat), kind: UpdateKind::Text(text.to_string()) }
}

fn callback(chat: UserId, data: &str) -> InboundUpdate {
    InboundUpdate { contact: Contact::new(chat), kind: UpdateKind::Callback(data.to_string()) }
}

async fn seed_instrument(db: &SqliteDatabase) {
    db.add_instrument(NewInstrument {
        bank_name: "Sberbank".to_string(),
        account_number: "1234567890123456".to_string(),
        recipient_name: "Ivan I.".to_string(),
    })
    .await
    .unwrap();
}

/// Answers the pending captcha by reading the issued code back out of the session row.
async fn pass_captcha(
    router: &Router<SqliteDatabase, FixedRates, RecordingMessenger>,
    db: &SqliteDatabase,
    chat: UserId,
) {
    router.dispatch(command(chat, "/start")).await;
    let code = db.fetch_session(chat).await.unwrap().unwrap().captcha_code.unwrap();
    router.dispatch(text(chat, &code)).await;
}

/// Walks a user all the way to a submitted order and returns nothing; the order id will be 1 on a
/// fresh database.
async fn submit_order(
    router: &Router<SqliteDatabase, FixedRates, RecordingMessenger>,
    db: &SqliteDatabase,
    chat: UserId,
) {
    pass_captcha(router, db, chat).await;
    router.dispatch(callback(chat, "buy")).await;
    router.dispatch(callback(chat, "asset:BTC")).await;
    router.dispatch(text(chat, "0.00041 BTC")).await;
    router.dispatch(callback(chat, "bank:Sberbank")).await;
    router.dispatch(text(chat, "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2")).await;
    router.dispatch(callback(chat, "paid")).await;
}

#[tokio::test]
async fn a_purchase_flows_from_start_to_operator_brief() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let (router, messenger) = new_router(db.clone(), ServiceSchedule::always_on());

    submit_order(&router, &db, USER).await;

    let sent = messenger.take();
    let brief = sent.iter().find(|m| m.chat_id == OPERATOR).expect("the operator should get a brief");
    assert!(brief.text.contains("order #1"), "{}", brief.text);
    assert!(brief.text.contains("1260.75 ₽"), "{}", brief.text);
    let confirmation = sent.iter().rev().find(|m| m.chat_id == USER).unwrap();
    assert!(confirmation.text.contains("Order #1 registered"), "{}", confirmation.text);
}

#[tokio::test]
async fn operator_buttons_decide_orders_and_notify_the_buyer() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let (router, messenger) = new_router(db.clone(), ServiceSchedule::always_on());
    submit_order(&router, &db, USER).await;
    messenger.take();

    // A random user pressing the operator button gets nowhere
    router.dispatch(callback(USER, "order_1_approve")).await;
    assert!(!messenger.last_text_for(USER).contains("complete"));
    messenger.take();

    router.dispatch(callback(OPERATOR, "order_1_approve")).await;
    assert!(messenger.last_text_for(OPERATOR).contains("approved"));
    assert!(messenger.last_text_for(USER).contains("Order #1 is complete"));

    // Deciding twice fails cleanly
    router.dispatch(callback(OPERATOR, "order_1_reject")).await;
    assert!(messenger.last_text_for(OPERATOR).contains("Could not apply the decision"));
}

#[tokio::test]
async fn the_service_window_gates_ordinary_users_only() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let (router, messenger) = new_router(db.clone(), ServiceSchedule::closed());

    router.dispatch(command(USER, "/start")).await;
    assert!(messenger.last_text_for(USER).contains("closed"));

    // Admins pass the gate even while the window is shut
    router.dispatch(command(ADMIN, "/stats")).await;
    assert!(messenger.last_text_for(ADMIN).contains("Service statistics"));

    // The operator opens the window and the user can start
    router.dispatch(command(OPERATOR, "/extend 30")).await;
    assert!(messenger.last_text_for(OPERATOR).contains("Service window open until"));
    router.dispatch(command(USER, "/start")).await;
    assert!(messenger.last_text_for(USER).contains("code"));
}

#[tokio::test]
async fn admin_commands_bypass_the_funnel() {
    let db = new_db().await;
    let (router, messenger) = new_router(db.clone(), ServiceSchedule::always_on());

    router.dispatch(command(ADMIN, "/addcard Sberbank 1234567890123456 Ivan I.")).await;
    assert!(messenger.last_text_for(ADMIN).contains("Added instrument #1"));
    router.dispatch(command(ADMIN, "/cards")).await;
    assert!(messenger.last_text_for(ADMIN).contains("1234567890123456"));
    router.dispatch(command(ADMIN, "/commission three")).await;
    assert!(messenger.last_text_for(ADMIN).contains("Usage: /commission"));

    // The same slash-command from a non-admin is ordinary funnel input
    router.dispatch(command(USER, "/cards")).await;
    let reply = messenger.last_text_for(USER);
    assert!(!reply.contains("1234567890123456"), "{reply}");
}

#[tokio::test]
async fn unblocking_notifies_the_user() {
    let db = new_db().await;
    seed_instrument(&db).await;
    let (router, messenger) = new_router(db.clone(), ServiceSchedule::always_on());
    submit_order(&router, &db, USER).await;
    router.dispatch(callback(OPERATOR, "order_1_block")).await;
    messenger.take();

    router.dispatch(command(USER, "/start")).await;
    assert!(messenger.last_text_for(USER).contains("blocked"));

    router.dispatch(command(ADMIN, "/unblock 100")).await;
    assert!(messenger.last_text_for(ADMIN).contains("unblocked"));
    assert!(messenger.last_text_for(USER).contains("You have been unblocked"));
}
