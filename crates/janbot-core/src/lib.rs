//! Core of the JanBot chat bot.
//!
//! This crate holds everything that does not depend on the chat platform:
//! the per-user state store, the task dialogues, pagination of the user's
//! task list, and the HTTP clients for the todo backend and the summarizer.
//!
//! # Architecture
//!
//! - [`CommandRouter`]: entry point for commands, free text and control clicks
//! - [`ConversationEngine`]: create/update/delete dialogues
//! - [`ListRenderer`] / [`PaginationTracker`]: list pages and display numbers
//! - [`UserStateStore`]: per-user state behind per-user locks
//! - [`TaskBackend`], [`Summarizer`], [`PageFetcher`]: external services
//!
//! # Example
//!
//! ```no_run
//! use janbot_core::{BotConfig, CommandRouter};
//! use janbot_models::UserId;
//!
//! # async fn example() -> janbot_core::Result<()> {
//! let config = BotConfig::from_env()?;
//! let router = CommandRouter::from_config(&config)?;
//!
//! let replies = router.task_list(&UserId::from(42_u64), "").await;
//! println!("{}", replies[0].text);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod pagination;
pub mod render;
pub mod router;
pub mod store;
pub mod summarizer;

#[cfg(test)]
mod testing;

pub use backend::{HttpTaskBackend, TaskBackend};
pub use config::BotConfig;
pub use conversation::{ConversationEngine, ConversationState, ConversationStep, TaskAction};
pub use error::{CoreError, Result};
pub use pagination::{PaginationState, PaginationTracker};
pub use render::{DisplayPayload, ListRenderer, PageControl};
pub use router::{CommandRouter, ControlActivation, ControlOutcome, Reply, ReplySink};
pub use store::{SweepStats, UserState, UserStateStore};
pub use summarizer::{GeminiSummarizer, HttpPageFetcher, PageFetcher, Summarizer};
