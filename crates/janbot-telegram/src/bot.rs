//! Main Telegram bot implementation.

use std::sync::Arc;
use std::time::Duration;

use janbot_core::{BotConfig, CommandRouter, UserStateStore};
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::error::{Result, TelegramError};
use crate::handlers::{handle_callback, handle_command, handle_message, Command};

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Older name for [`TOKEN_ENV`].
pub const TOKEN_ALIAS_ENV: &str = "BOT_API_TOKEN";

/// Reads the bot token through `lookup`, trying [`TOKEN_ENV`] first.
pub fn token_from_lookup<F>(lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    [TOKEN_ENV, TOKEN_ALIAS_ENV]
        .iter()
        .filter_map(|key| lookup(key))
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
        .ok_or(TelegramError::NoToken)
}

/// The JanBot Telegram bot.
pub struct TelegramBot {
    /// The teloxide bot instance.
    bot: Bot,
    /// Command router shared by all handlers.
    router: Arc<CommandRouter>,
    /// Runtime configuration.
    config: BotConfig,
}

impl TelegramBot {
    /// Create a new TelegramBot instance.
    ///
    /// Requires `TELEGRAM_BOT_TOKEN` (or `BOT_API_TOKEN`) to be set.
    pub fn new(config: BotConfig) -> Result<Self> {
        let token = token_from_lookup(|key| std::env::var(key).ok())?;
        Self::with_token(token, config)
    }

    /// Create a TelegramBot with an explicit token.
    pub fn with_token(token: impl Into<String>, config: BotConfig) -> Result<Self> {
        let router = CommandRouter::from_config(&config)?;
        Ok(Self {
            bot: Bot::new(token.into()),
            router: Arc::new(router),
            config,
        })
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TelegramError::BotStartFailed(e.to_string()))?;
        Ok(me.username().to_string())
    }

    /// Returns true if summarization commands are available.
    pub fn has_summarization(&self) -> bool {
        self.router.has_summarization()
    }

    /// Start the bot in polling mode. Runs until Ctrl+C.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");

        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Failed to register command list");
        }

        // Expire abandoned dialogues and idle users in the background
        let store = self.router.store();
        let conversation_ttl = self.config.conversation_ttl;
        let idle_user_ttl = self.config.idle_user_ttl;
        let sweep_interval = self.config.sweep_interval;
        tokio::spawn(async move {
            sweep_loop(store, sweep_interval, conversation_ttl, idle_user_ttl).await;
        });

        let bot = self.bot.clone();
        let router_for_callbacks = Arc::clone(&self.router);
        let router_for_commands = Arc::clone(&self.router);
        let router_for_messages = Arc::clone(&self.router);

        let handler = dptree::entry()
            .branch(
                Update::filter_callback_query()
                    .endpoint(move |bot: Bot, q: CallbackQuery| {
                        let router = Arc::clone(&router_for_callbacks);
                        async move { handle_callback(bot, q, router).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let router = Arc::clone(&router_for_commands);
                        info!(chat_id = %msg.chat.id, "Command matched: {:?}", cmd);
                        async move { handle_command(bot, msg, cmd, router).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| {
                        // Handle unrecognized commands (start with / but didn't parse)
                        msg.text().map(|t| t.starts_with('/')).unwrap_or(false)
                    })
                    .endpoint(|bot: Bot, msg: Message| async move {
                        if let Some(text) = msg.text() {
                            info!(cmd = %text, "Unrecognized command");
                            bot.send_message(
                                msg.chat.id,
                                format!(
                                    "Unknown command: {}\n\nUse /help to see available commands.",
                                    text.split_whitespace().next().unwrap_or(text)
                                ),
                            )
                            .await?;
                        }
                        Ok(())
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| {
                        msg.text().map(|t| !t.starts_with('/')).unwrap_or(false)
                    })
                    .endpoint(move |bot: Bot, msg: Message| {
                        let router = Arc::clone(&router_for_messages);
                        async move { handle_message(bot, msg, router).await }
                    }),
            );

        info!("Bot is running! Send /start to begin.");

        Dispatcher::builder(bot, handler)
            .default_handler(|upd| async move {
                debug!("Unhandled update: {:?}", upd.kind);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Bot stopped");
        Ok(())
    }
}

/// Background task that evicts expired per-user state.
async fn sweep_loop(
    store: Arc<UserStateStore>,
    every: Duration,
    conversation_ttl: Duration,
    idle_user_ttl: Duration,
) {
    let mut sweep_interval = interval(every);

    loop {
        sweep_interval.tick().await;

        let stats = store.sweep(conversation_ttl, idle_user_ttl).await;
        if stats.expired_conversations > 0 || stats.evicted_users > 0 {
            info!(
                expired_conversations = stats.expired_conversations,
                evicted_users = stats.evicted_users,
                "Swept user state"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_token_prefers_primary_name() {
        let token = token_from_lookup(lookup(&[
            (TOKEN_ENV, "primary"),
            (TOKEN_ALIAS_ENV, "alias"),
        ]))
        .unwrap();
        assert_eq!(token, "primary");
    }

    #[test]
    fn test_token_falls_back_to_alias() {
        let token = token_from_lookup(lookup(&[(TOKEN_ENV, "  "), (TOKEN_ALIAS_ENV, "alias")])).unwrap();
        assert_eq!(token, "alias");
    }

    #[test]
    fn test_missing_token() {
        assert!(matches!(
            token_from_lookup(lookup(&[])),
            Err(TelegramError::NoToken)
        ));
    }

    #[tokio::test]
    async fn test_bot_builds_without_network() {
        let config = BotConfig::new().with_todo_api_url("http://127.0.0.1:1");
        let bot = TelegramBot::with_token("123:abc", config).unwrap();
        assert!(!bot.has_summarization());
    }
}
