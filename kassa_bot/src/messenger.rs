//! The seam between the service and whatever chat transport carries it.
//!
//! Delivery is best-effort everywhere: a committed order or decision is never rolled back because
//! a notification could not be sent. Use [`send_best_effort`] for every notification-style send.

use kassa_engine::db_types::UserId;
use log::*;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Message delivery failed: {0}")]
pub struct DeliveryError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: UserId,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(chat_id: UserId, text: impl Into<String>) -> Self {
        Self { chat_id, text: text.into() }
    }
}

#[allow(async_fn_in_trait)]
pub trait ChatMessenger {
    /// Sends a message, returning the transport's id for it.
    async fn send(&self, message: OutboundMessage) -> Result<i64, DeliveryError>;

    async fn edit(&self, chat_id: UserId, message_id: i64, text: &str) -> Result<(), DeliveryError>;

    async fn delete(&self, chat_id: UserId, message_id: i64) -> Result<(), DeliveryError>;
}

/// Sends a message and swallows any failure with a log line.
pub async fn send_best_effort<M: ChatMessenger>(messenger: &M, message: OutboundMessage) {
    let chat = message.chat_id;
    if let Err(e) = messenger.send(message).await {
        warn!("📨️ Dropping undeliverable message to chat {chat}: {e}");
    }
}

/// A messenger that delivers nowhere. Useful for wiring and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMessenger;

impl ChatMessenger for NullMessenger {
    async fn send(&self, message: OutboundMessage) -> Result<i64, DeliveryError> {
        debug!("📨️ [null] → chat {}: {}", message.chat_id, message.text);
        Ok(0)
    }

    async fn edit(&self, chat_id: UserId, message_id: i64, _text: &str) -> Result<(), DeliveryError> {
        debug!("📨️ [null] edit {message_id} in chat {chat_id}");
        Ok(())
    }

    async fn delete(&self, chat_id: UserId, message_id: i64) -> Result<(), DeliveryError> {
        debug!("📨️ [null] delete {message_id} in chat {chat_id}");
        Ok(())
    }
}
