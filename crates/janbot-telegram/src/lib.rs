//! Telegram front end for JanBot.
//!
//! This crate connects the JanBot command router to Telegram: commands and
//! free text arrive through long polling, replies go back as messages, and
//! task list pages carry inline "previous"/"next" buttons that edit the list
//! in place.
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather (`BOT_API_TOKEN` also works)
//! - `TODO_API_URL`: Base URL of the todo backend
//!
//! Optional:
//! - `GEMINI_API_KEY`: Enables /summarize and /summarize_link
//! - `GEMINI_MODEL`: Model to use (default: gemini-2.0-flash)
//! - `TODO_PAGE_SIZE`: Tasks per list page (default: 5)
//!
//! # Example
//!
//! ```no_run
//! use janbot_core::BotConfig;
//! use janbot_telegram::TelegramBot;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BotConfig::from_env()?;
//!     let bot = TelegramBot::new(config)?;
//!     bot.start_polling().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Commands
//!
//! - `/help` - Show available commands
//! - `/summarize <text>` - Summarize a text
//! - `/todo_list [page] [size]` - List tasks
//! - `/todo_update <n>` / `/todo_delete <n>` - Change a listed task

pub mod bot;
pub mod error;
pub mod handlers;

pub use bot::TelegramBot;
pub use error::{Result, TelegramError};
pub use handlers::Command;
