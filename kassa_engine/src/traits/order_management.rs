use thiserror::Error;

use crate::db_types::{NewOrder, Order, OrderAggregates, OrderStatusType, ProfileSummary, SessionOrderStats};

#[derive(Debug, Clone, Error)]
pub enum OrderApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Order {0} has already been finalised as {1}")]
    AlreadyFinalised(i64, OrderStatusType),
}

impl From<sqlx::Error> for OrderApiError {
    fn from(e: sqlx::Error) -> Self {
        OrderApiError::DatabaseError(e.to_string())
    }
}

/// Order records and the single status transition they undergo.
///
/// Orders are born `Pending` and move exactly once, to `Completed` or `Rejected`. The transition
/// is guarded in the query itself so that two racing decisions cannot both succeed.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Inserts a new pending order and returns the stored row.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderApiError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderApiError>;

    /// Moves a pending order into a terminal status. Fails with [`OrderApiError::AlreadyFinalised`]
    /// if the order has already left `Pending`, and [`OrderApiError::OrderNotFound`] if it never
    /// existed.
    async fn finalize_order(&self, order_id: i64, status: OrderStatusType) -> Result<Order, OrderApiError>;

    /// The at-most-one pending order for a session, if any.
    async fn pending_order_for_session(&self, session_id: i64) -> Result<Option<Order>, OrderApiError>;

    /// Lifetime total and completed counts for one session.
    async fn order_stats_for_session(&self, session_id: i64) -> Result<SessionOrderStats, OrderApiError>;

    /// The profile view: per-session counts plus completed turnover.
    async fn profile_for_session(&self, session_id: i64) -> Result<ProfileSummary, OrderApiError>;

    /// Service-wide aggregates for the admin statistics report.
    async fn order_aggregates(&self) -> Result<OrderAggregates, OrderApiError>;
}
