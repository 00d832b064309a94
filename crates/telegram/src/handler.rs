use {
    async_trait::async_trait,
    teloxide::{Bot, types::Message},
    tracing::debug,
};

use crate::error::Result;

/// Receives messages delivered to the bot while it is connected.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle_message(&self, bot: &Bot, message: Message) -> Result<()>;
}

/// Logs each message and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUpdates;

#[async_trait]
impl UpdateHandler for LogUpdates {
    async fn handle_message(&self, _bot: &Bot, message: Message) -> Result<()> {
        debug!(
            chat_id = message.chat.id.0,
            message_id = message.id.0,
            text_len = message_text(&message).map_or(0, str::len),
            "received telegram message"
        );
        Ok(())
    }
}

/// Text of a message, or its caption for media messages.
#[must_use]
pub fn message_text(message: &Message) -> Option<&str> {
    message.text().or_else(|| message.caption())
}
