//! Telegram bot session for the sync runtime.
//!
//! [`TelegramBotConnector`] implements the runtime's session connector on top
//! of teloxide: it verifies the token with `getMe`, clears any webhook, and
//! long-polls `getUpdates`, handing messages to an [`UpdateHandler`].

mod bot;
pub mod config;
pub mod connector;
pub mod error;
pub mod handler;

#[cfg(test)]
mod test_api;

pub use {
    config::BotConnectorConfig,
    connector::TelegramBotConnector,
    error::{Error, Result},
    handler::{LogUpdates, UpdateHandler},
};
