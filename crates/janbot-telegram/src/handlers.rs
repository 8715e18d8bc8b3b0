//! Command, message and callback handlers for the Telegram bot.
//!
//! Handlers only translate between Telegram and the [`CommandRouter`]: they
//! work out who is acting, call the router, and deliver what it returns.

use std::sync::Arc;

use async_trait::async_trait;
use janbot_core::render::PageControl;
use janbot_core::{CommandRouter, ControlActivation, ControlOutcome, Reply, ReplySink};
use janbot_models::UserId;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, MaybeInaccessibleMessage,
};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Telegram's limit on the length of one message.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and get help")]
    Start,

    #[command(description = "Show help message")]
    Help,

    #[command(description = "Check that the bot is alive")]
    Ping,

    #[command(description = "Get a greeting")]
    Hello,

    #[command(description = "Summarize a text: /summarize <text>")]
    Summarize(String),

    #[command(description = "Summarize a web page: /summarize_link <url>")]
    SummarizeLink(String),

    #[command(description = "Create a task")]
    TodoCreate,

    #[command(description = "List your tasks: /todo_list [page] [size]")]
    TodoList(String),

    #[command(description = "Update a task from the list: /todo_update <n>")]
    TodoUpdate(String),

    #[command(description = "Delete a task from the list: /todo_delete <n>")]
    TodoDelete(String),

    #[command(description = "Abandon the current dialogue")]
    Cancel,
}

/// [`ReplySink`] that posts to one chat.
pub struct ChatSink {
    bot: Bot,
    chat_id: ChatId,
}

impl ChatSink {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ReplySink for ChatSink {
    async fn send(&self, reply: Reply) {
        if let Err(e) = send_reply(&self.bot, self.chat_id, &reply).await {
            warn!(chat_id = %self.chat_id, error = %e, "Failed to send reply");
        }
    }
}

/// Inline keyboard for pagination controls, if there are any.
pub fn keyboard(controls: &[PageControl]) -> Option<InlineKeyboardMarkup> {
    if controls.is_empty() {
        return None;
    }
    let row = controls
        .iter()
        .map(|control| InlineKeyboardButton::callback(control.label(), control.id()))
        .collect::<Vec<_>>();
    Some(InlineKeyboardMarkup::new(vec![row]))
}

/// Splits `text` into chunks of at most `max_chars` characters, preferring
/// line breaks as cut points.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        let cut = match rest[..limit].rfind('\n') {
            Some(i) if i > 0 => i,
            _ => limit,
        };
        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start_matches('\n');
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Cuts `text` down to a single message of at most `max_chars` characters.
///
/// Returns the kept text and how many characters were dropped.
pub fn fit_message(text: &str, max_chars: usize) -> (String, usize) {
    let kept = split_message(text, max_chars).into_iter().next().unwrap_or_default();
    let dropped = text.chars().count() - kept.chars().count();
    (kept, dropped)
}

/// Sends a reply, attaching its controls to the last chunk.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> ResponseResult<()> {
    let chunks = split_message(&reply.text, MAX_MESSAGE_CHARS);
    let last = chunks.len() - 1;

    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut req = bot.send_message(chat_id, chunk);
        if i == last {
            if let Some(kb) = keyboard(&reply.controls) {
                req = req.reply_markup(kb);
            }
        }
        req.await?;
    }
    Ok(())
}

/// Identity used for per-user state: the sender, else the chat.
pub fn identity(sender: Option<u64>, chat_id: ChatId) -> UserId {
    match sender {
        Some(id) => UserId::from(id),
        None => UserId::from(chat_id.0),
    }
}

fn sender_identity(msg: &Message) -> UserId {
    identity(msg.from.as_ref().map(|u| u.id.0), msg.chat.id)
}

fn display_name(msg: &Message) -> String {
    msg.from
        .as_ref()
        .map(|u| u.first_name.clone())
        .unwrap_or_else(|| "there".to_string())
}

/// Dispatch commands to the router.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    router: Arc<CommandRouter>,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let user = sender_identity(&msg);

    let replies = match cmd {
        Command::Start | Command::Help => {
            info!(chat_id = %chat_id, user = %user, "Help requested");
            vec![Reply::text(router.help(&display_name(&msg)))]
        }
        Command::Ping => vec![Reply::text(router.ping())],
        Command::Hello => vec![Reply::text(router.hello(&display_name(&msg)))],
        Command::Summarize(text) => {
            bot.send_chat_action(chat_id, ChatAction::Typing).await?;
            router
                .summarize(&text, &ChatSink::new(bot.clone(), chat_id))
                .await;
            Vec::new()
        }
        Command::SummarizeLink(url) => {
            bot.send_chat_action(chat_id, ChatAction::Typing).await?;
            router
                .summarize_link(&url, &ChatSink::new(bot.clone(), chat_id))
                .await;
            Vec::new()
        }
        Command::TodoCreate => router.task_create(&user).await,
        Command::TodoList(args) => router.task_list(&user, &args).await,
        Command::TodoUpdate(args) => router.task_update(&user, &args).await,
        Command::TodoDelete(args) => router.task_delete(&user, &args).await,
        Command::Cancel => router.cancel(&user).await,
    };

    for reply in &replies {
        send_reply(&bot, chat_id, reply).await?;
    }
    Ok(())
}

/// Handle regular text messages (answers inside a dialogue).
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    router: Arc<CommandRouter>,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user = sender_identity(&msg);

    let Some(replies) = router.handle_text(&user, text).await else {
        debug!(chat_id = %msg.chat.id, user = %user, "Ignoring text outside a dialogue");
        return Ok(());
    };

    for reply in &replies {
        send_reply(&bot, msg.chat.id, reply).await?;
    }
    Ok(())
}

/// Handle inline keyboard clicks (list pagination).
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    router: Arc<CommandRouter>,
) -> ResponseResult<()> {
    let Some(data) = q.data.clone() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let target = match &q.message {
        Some(MaybeInaccessibleMessage::Regular(m)) => Some((m.chat.id, m.id)),
        _ => None,
    };
    let activation = ControlActivation {
        control_id: data,
        primary_user: Some(UserId::from(q.from.id.0)),
        fallback_user: target.map(|(chat_id, _)| UserId::from(chat_id.0)),
    };

    match router.activate_control(&activation).await {
        None => {
            debug!(data = %activation.control_id, "Ignoring callback");
            bot.answer_callback_query(q.id).await?;
        }
        Some(ControlOutcome::Notice(text)) => {
            bot.answer_callback_query(q.id)
                .text(text)
                .show_alert(true)
                .await?;
        }
        Some(ControlOutcome::Edit(reply)) => {
            bot.answer_callback_query(q.id).await?;

            let Some((chat_id, message_id)) = target else {
                // The original message is gone; post the page instead.
                send_reply(&bot, ChatId::from(q.from.id), &reply).await?;
                return Ok(());
            };

            let (text, dropped) = fit_message(&reply.text, MAX_MESSAGE_CHARS);
            if dropped > 0 {
                warn!(
                    chat_id = %chat_id,
                    dropped_chars = dropped,
                    "Task list too long for one message, truncated"
                );
            }
            let mut req = bot.edit_message_text(chat_id, message_id, text);
            if let Some(kb) = keyboard(&reply.controls) {
                req = req.reply_markup(kb);
            }
            if let Err(e) = req.await {
                warn!(chat_id = %chat_id, error = %e, "Failed to edit task list");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_command_names() {
        assert_eq!(
            Command::parse("/todo_list 2 10", "janbot").unwrap(),
            Command::TodoList("2 10".to_string())
        );
        assert_eq!(
            Command::parse("/summarize_link https://example.com", "janbot").unwrap(),
            Command::SummarizeLink("https://example.com".to_string())
        );
        assert_eq!(Command::parse("/todo_create", "janbot").unwrap(), Command::TodoCreate);
        assert_eq!(Command::parse("/ping", "janbot").unwrap(), Command::Ping);
    }

    #[test]
    fn test_keyboard_from_controls() {
        assert!(keyboard(&[]).is_none());

        let markup = keyboard(&[PageControl::previous(1), PageControl::next(3)]).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 1);

        let row = &markup.inline_keyboard[0];
        assert_eq!(row.len(), 2);
        assert_eq!(
            row[0].kind,
            InlineKeyboardButtonKind::CallbackData("todo_prev_1".to_string())
        );
        assert_eq!(
            row[1].kind,
            InlineKeyboardButtonKind::CallbackData("todo_next_3".to_string())
        );
    }

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
        assert_eq!(split_message("", 10), vec![String::new()]);
    }

    #[test]
    fn test_split_prefers_line_breaks() {
        let chunks = split_message("aaaa\nbbbb\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn test_split_long_line_respects_char_boundaries() {
        let text = "é".repeat(25);
        let chunks = split_message(&text, 10);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_fit_message_reports_dropped_text() {
        assert_eq!(fit_message("hello", 10), ("hello".to_string(), 0));
        assert_eq!(
            fit_message("aaaa\nbbbb\ncccc", 10),
            ("aaaa\nbbbb".to_string(), 5)
        );
    }

    #[test]
    fn test_fit_message_full_page_of_long_titles() {
        let line = format!("1. ✅ {} [done]\n", "x".repeat(200));
        let text = line.repeat(50);
        let (kept, dropped) = fit_message(&text, MAX_MESSAGE_CHARS);

        assert!(kept.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(dropped > 0);
        assert_eq!(kept.chars().count() + dropped, text.chars().count());
    }

    #[test]
    fn test_identity_prefers_sender() {
        assert_eq!(identity(Some(42), ChatId(-100)), UserId::from("42"));
        assert_eq!(identity(None, ChatId(-100)), UserId::from("-100"));
    }
}
