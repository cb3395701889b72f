use log::debug;
use sqlx::{Row, SqliteConnection};

use crate::db_types::{
    NewOrder,
    Order,
    OrderAggregates,
    OrderStatusType,
    ProfileSummary,
    SessionOrderStats,
    StatusCount,
};

/// Inserts a new pending order. This is not atomic on its own. You can embed this call inside a
/// transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                session_id,
                asset,
                crypto_amount,
                fiat_amount,
                rate,
                wallet_address,
                bank_name,
                account_number,
                recipient_name
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order.session_id)
    .bind(order.asset)
    .bind(order.crypto_amount)
    .bind(order.fiat_amount)
    .bind(order.rate)
    .bind(order.wallet_address)
    .bind(order.instrument.bank_name)
    .bind(order.instrument.account_number)
    .bind(order.instrument.recipient_name)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order #{} inserted for session {}", order.id, order.session_id);
    Ok(order)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

/// The pending-guarded status update. Returns `None` when the order is missing or has already
/// left `Pending`; the caller decides which of the two it was.
pub async fn finalize_order(
    order_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(status)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn pending_order_for_session(
    session_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "SELECT * FROM orders WHERE session_id = $1 AND status = 'Pending' ORDER BY id DESC LIMIT 1",
    )
    .bind(session_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn order_stats_for_session(
    session_id: i64,
    conn: &mut SqliteConnection,
) -> Result<SessionOrderStats, sqlx::Error> {
    let row = sqlx::query(
        r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN status = 'Completed' THEN 1 ELSE 0 END), 0) AS completed
            FROM orders WHERE session_id = $1
        "#,
    )
    .bind(session_id)
    .fetch_one(conn)
    .await?;
    Ok(SessionOrderStats { total: row.get("total"), completed: row.get("completed") })
}

pub async fn profile_for_session(session_id: i64, conn: &mut SqliteConnection) -> Result<ProfileSummary, sqlx::Error> {
    let row = sqlx::query(
        r#"
            SELECT COUNT(*) AS total_orders,
                   COALESCE(SUM(CASE WHEN status = 'Completed' THEN fiat_amount ELSE 0.0 END), 0.0) AS lifetime_fiat
            FROM orders WHERE session_id = $1
        "#,
    )
    .bind(session_id)
    .fetch_one(&mut *conn)
    .await?;
    let last: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE session_id = $1 ORDER BY id DESC LIMIT 1")
        .bind(session_id)
        .fetch_optional(conn)
        .await?;
    Ok(ProfileSummary {
        total_orders: row.get("total_orders"),
        lifetime_fiat: row.get("lifetime_fiat"),
        last_wallet: last.as_ref().map(|o| o.wallet_address.clone()),
        last_asset: last.as_ref().map(|o| o.asset),
        last_rate: last.as_ref().map(|o| o.rate),
    })
}

pub async fn order_aggregates(conn: &mut SqliteConnection) -> Result<OrderAggregates, sqlx::Error> {
    let row = sqlx::query(
        r#"
            SELECT COUNT(*) AS total_orders,
                   COALESCE(SUM(CASE WHEN status = 'Completed' THEN fiat_amount ELSE 0.0 END), 0.0) AS turnover
            FROM orders
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;
    let by_status = sqlx::query("SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status")
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(|row| StatusCount { status: row.get("status"), count: row.get("count") })
        .collect();
    Ok(OrderAggregates { turnover: row.get("turnover"), total_orders: row.get("total_orders"), by_status })
}
