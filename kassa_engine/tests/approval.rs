//! Operator decision workflow against a throwaway SQLite database.
use kassa_engine::{
    approval::{ApprovalError, Decision, SubmitterNotice},
    db_types::{CryptoAmount, CryptoAsset, InstrumentSnapshot, NewOrder, NewSession, Order, OrderStatusType, Rub, UserId},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{OrderManagement, SessionManagement},
    ApprovalApi,
    AuthPolicy,
    SqliteDatabase,
};

const OPERATOR: UserId = UserId(9);

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn api(db: SqliteDatabase) -> ApprovalApi<SqliteDatabase> {
    ApprovalApi::new(db, AuthPolicy::new(vec![UserId(1)], OPERATOR))
}

async fn submit_order(db: &SqliteDatabase, chat: i64) -> Order {
    let session = db.upsert_session(NewSession::new(UserId(chat))).await.expect("Error creating session");
    db.insert_order(NewOrder {
        session_id: session.id,
        asset: CryptoAsset::Btc,
        crypto_amount: CryptoAmount::from(0.001),
        fiat_amount: Rub::from(3075.0),
        rate: 3_000_000.0,
        wallet_address: "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
        instrument: InstrumentSnapshot {
            bank_name: "Sberbank".to_string(),
            account_number: "1234567890123456".to_string(),
            recipient_name: "Ivan I.".to_string(),
        },
    })
    .await
    .expect("Error inserting order")
}

#[tokio::test]
async fn approve_finalises_once_and_notifies_the_submitter() {
    let db = new_db().await;
    let order = submit_order(&db, 200).await;
    let api = api(db.clone());

    let outcome = api.decide(OPERATOR, order.id, Decision::Approve).await.unwrap();
    assert_eq!(outcome.order.status, OrderStatusType::Completed);
    assert_eq!(outcome.notice, Some((UserId(200), SubmitterNotice::OrderCompleted)));

    // A second decision of any kind is rejected and changes nothing
    for decision in [Decision::Approve, Decision::Reject] {
        let err = api.decide(OPERATOR, order.id, decision).await.unwrap_err();
        assert!(matches!(err, ApprovalError::AlreadyFinalised(_, OrderStatusType::Completed)), "got {err}");
    }
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Completed);
}

#[tokio::test]
async fn reject_finalises_and_notifies() {
    let db = new_db().await;
    let order = submit_order(&db, 201).await;
    let api = api(db.clone());

    let outcome = api.decide(OPERATOR, order.id, Decision::Reject).await.unwrap();
    assert_eq!(outcome.order.status, OrderStatusType::Rejected);
    assert_eq!(outcome.notice, Some((UserId(201), SubmitterNotice::OrderRejected)));
}

#[tokio::test]
async fn only_the_operator_may_decide() {
    let db = new_db().await;
    let order = submit_order(&db, 202).await;
    let api = api(db.clone());

    // Not even an admin gets through
    for actor in [UserId(1), UserId(202), UserId(9999)] {
        let err = api.decide(actor, order.id, Decision::Approve).await.unwrap_err();
        assert!(matches!(err, ApprovalError::Unauthorized(_)), "actor {actor} got {err}");
    }
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn block_originator_leaves_the_order_pending() {
    let db = new_db().await;
    let order = submit_order(&db, 203).await;
    let api = api(db.clone());

    let outcome = api.decide(OPERATOR, order.id, Decision::BlockOriginator).await.unwrap();
    assert_eq!(outcome.notice, None);
    assert_eq!(outcome.order.status, OrderStatusType::Pending);

    let session = db.fetch_session(UserId(203)).await.unwrap().unwrap();
    assert!(session.is_blocked);
    let stored = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn deciding_a_missing_order_fails() {
    let db = new_db().await;
    let api = api(db);
    let err = api.decide(OPERATOR, 424242, Decision::Approve).await.unwrap_err();
    assert!(matches!(err, ApprovalError::OrderNotFound(424242)));
    let err = api.decide(OPERATOR, 424242, Decision::BlockOriginator).await.unwrap_err();
    assert!(matches!(err, ApprovalError::OrderNotFound(424242)));
}
