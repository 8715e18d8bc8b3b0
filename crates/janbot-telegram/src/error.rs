//! Error types for the Telegram bot.

use janbot_core::CoreError;
use thiserror::Error;

/// Errors that can occur in the Telegram bot.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token not provided.
    #[error("Telegram bot token not set. Set TELEGRAM_BOT_TOKEN environment variable.")]
    NoToken,

    /// Failed to start the bot.
    #[error("Failed to start bot: {0}")]
    BotStartFailed(String),

    /// Core configuration or service error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Telegram API request error.
    #[error("Telegram API error: {0}")]
    Request(#[from] teloxide::RequestError),
}

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
