//! The operator approval workflow.
//!
//! A single fixed operator decides the fate of every submitted order. Approve and Reject drive
//! the one permitted status transition; BlockOriginator flips the submitter's blocked flag and
//! deliberately leaves the order status untouched, so the evidence stays visible in the queue.

use log::*;
use thiserror::Error;

use crate::{
    authz::{AuthPolicy, Unauthorized},
    db_types::{Order, OrderStatusType, UserId},
    traits::{ExchangeDatabase, OrderApiError, SessionApiError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
    BlockOriginator,
}

/// What the submitter should be told after a decision. Delivery is best-effort and happens
/// outside the engine; a lost notification never rolls back the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitterNotice {
    OrderCompleted,
    OrderRejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalOutcome {
    pub order: Order,
    pub notice: Option<(UserId, SubmitterNotice)>,
}

#[derive(Debug, Clone, Error)]
pub enum ApprovalError {
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Order {0} has already been finalised as {1}")]
    AlreadyFinalised(i64, OrderStatusType),
    #[error("No session exists for order {0}")]
    SessionNotFound(i64),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<OrderApiError> for ApprovalError {
    fn from(e: OrderApiError) -> Self {
        match e {
            OrderApiError::OrderNotFound(id) => ApprovalError::OrderNotFound(id),
            OrderApiError::AlreadyFinalised(id, status) => ApprovalError::AlreadyFinalised(id, status),
            OrderApiError::DatabaseError(msg) => ApprovalError::DatabaseError(msg),
        }
    }
}

impl From<SessionApiError> for ApprovalError {
    fn from(e: SessionApiError) -> Self {
        ApprovalError::DatabaseError(e.to_string())
    }
}

pub struct ApprovalApi<B> {
    db: B,
    auth: AuthPolicy,
}

impl<B> ApprovalApi<B>
where B: ExchangeDatabase
{
    pub fn new(db: B, auth: AuthPolicy) -> Self {
        Self { db, auth }
    }

    /// Applies the operator's decision to an order.
    ///
    /// Approve and Reject finalise the order exactly once; a second decision on the same order
    /// fails with [`ApprovalError::AlreadyFinalised`] and changes nothing. Anyone other than the
    /// configured operator is turned away before any lookup happens.
    pub async fn decide(&self, actor: UserId, order_id: i64, decision: Decision) -> Result<ApprovalOutcome, ApprovalError> {
        self.auth.require_operator(actor)?;
        match decision {
            Decision::Approve => self.finalise(order_id, OrderStatusType::Completed, SubmitterNotice::OrderCompleted).await,
            Decision::Reject => self.finalise(order_id, OrderStatusType::Rejected, SubmitterNotice::OrderRejected).await,
            Decision::BlockOriginator => self.block_originator(order_id).await,
        }
    }

    async fn finalise(
        &self,
        order_id: i64,
        status: OrderStatusType,
        notice: SubmitterNotice,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let order = self.db.finalize_order(order_id, status).await?;
        info!("🧾 Order #{order_id} finalised as {status} by the operator");
        let notice = match self.db.fetch_session_by_id(order.session_id).await? {
            Some(session) => Some((session.chat_id, notice)),
            None => {
                warn!("🧾 Order #{order_id} references session {} which no longer exists", order.session_id);
                None
            },
        };
        Ok(ApprovalOutcome { order, notice })
    }

    async fn block_originator(&self, order_id: i64) -> Result<ApprovalOutcome, ApprovalError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(ApprovalError::OrderNotFound(order_id))?;
        let session = self
            .db
            .fetch_session_by_id(order.session_id)
            .await?
            .ok_or(ApprovalError::SessionNotFound(order_id))?;
        self.db.set_blocked(session.chat_id, true).await?;
        info!("🧾 Chat {} blocked over order #{order_id}. The order stays {}", session.chat_id, order.status);
        Ok(ApprovalOutcome { order, notice: None })
    }
}
