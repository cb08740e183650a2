//! Telegram bot-chat channel for courier.
//!
//! Delivers notifications as HTML messages through the Bot API using
//! teloxide, and owns the link/unlink flow that stores the bot token in the
//! credential vault.

pub mod bot;
pub mod error;
pub mod format;
pub mod integration;
pub mod sender;

pub use {
    bot::{BotApi, BotConnector, TeloxideBot, TeloxideConnector},
    error::{Error, Result},
    integration::TelegramIntegration,
    sender::TelegramSender,
};
