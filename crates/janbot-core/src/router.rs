//! Command routing.
//!
//! The router is the only entry point the chat transport talks to. It locks
//! the acting user's state for the whole event, then dispatches into the
//! list renderer, the conversation engine or the summarizer. It never
//! touches the chat platform itself: replies are returned, or pushed through
//! a [`ReplySink`] when progress messages must go out before the work ends.

use std::sync::Arc;

use async_trait::async_trait;
use janbot_models::UserId;
use tracing::{debug, info, warn};

use crate::backend::{HttpTaskBackend, TaskBackend};
use crate::config::{BotConfig, DEFAULT_PAGE_SIZE, MAX_RESOLUTION_ATTEMPTS};
use crate::conversation::{ConversationEngine, StepOutcome};
use crate::error::{CoreError, Result};
use crate::pagination::PaginationTracker;
use crate::render::{DisplayPayload, ListRenderer, PageControl};
use crate::store::{UserState, UserStateStore};
use crate::summarizer::{GeminiSummarizer, HttpPageFetcher, PageFetcher, Summarizer};

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Message text.
    pub text: String,
    /// Pagination controls attached to the message.
    pub controls: Vec<PageControl>,
}

impl Reply {
    /// A plain text reply without controls.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: Vec::new(),
        }
    }
}

impl From<DisplayPayload> for Reply {
    fn from(payload: DisplayPayload) -> Self {
        Self {
            text: payload.text,
            controls: payload.controls,
        }
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Destination for replies that are sent while an operation is running.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Delivers one reply. Delivery failures are the sink's concern.
    async fn send(&self, reply: Reply);
}

/// A pagination control that was clicked.
#[derive(Debug, Clone)]
pub struct ControlActivation {
    /// Identifier carried by the control.
    pub control_id: String,
    /// The user who clicked, when the platform reports one.
    pub primary_user: Option<UserId>,
    /// Identity of the conversation the control lives in.
    pub fallback_user: Option<UserId>,
}

impl ControlActivation {
    /// The acting user: the clicking user, else the conversation's identity.
    pub fn resolve_identity(&self) -> Option<&UserId> {
        self.primary_user.as_ref().or(self.fallback_user.as_ref())
    }
}

/// What to do with the message that carried an activated control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Replace the message with a freshly rendered page.
    Edit(Reply),
    /// Leave the message alone and show a short notice.
    Notice(String),
}

/// Dispatches user commands.
pub struct CommandRouter {
    store: Arc<UserStateStore>,
    backend: Arc<dyn TaskBackend>,
    renderer: ListRenderer,
    engine: ConversationEngine,
    fetcher: Arc<dyn PageFetcher>,
    summarizer: Option<Arc<dyn Summarizer>>,
    page_size: u32,
}

impl CommandRouter {
    /// Creates a router without summarization.
    pub fn new(backend: Arc<dyn TaskBackend>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            store: Arc::new(UserStateStore::new()),
            renderer: ListRenderer::new(PaginationTracker::new(backend.clone())),
            engine: ConversationEngine::new(backend.clone(), MAX_RESOLUTION_ATTEMPTS),
            backend,
            fetcher,
            summarizer: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Builds a router talking to the services named in `config`.
    pub fn from_config(config: &BotConfig) -> Result<Self> {
        let backend = HttpTaskBackend::new(&config.todo_api_url, config.http_timeout)?;
        let fetcher = HttpPageFetcher::new(config.http_timeout)?;

        let mut router = Self::new(Arc::new(backend), Arc::new(fetcher))
            .with_page_size(config.page_size)
            .with_max_attempts(config.max_resolution_attempts);

        match &config.gemini_api_key {
            Some(key) => {
                let summarizer = GeminiSummarizer::new(
                    &config.gemini_api_url,
                    key,
                    &config.gemini_model,
                    config.http_timeout,
                )?;
                router = router.with_summarizer(Arc::new(summarizer));
            }
            None => warn!("No Gemini API key configured, summarization disabled"),
        }

        Ok(router)
    }

    /// Enables summarization.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Sets the default list page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets how many unresolvable task numbers a dialogue tolerates.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.engine = ConversationEngine::new(self.backend.clone(), max_attempts);
        self
    }

    /// Shares an existing state store.
    pub fn with_store(mut self, store: Arc<UserStateStore>) -> Self {
        self.store = store;
        self
    }

    /// The per-user state store, for sweeping.
    pub fn store(&self) -> Arc<UserStateStore> {
        Arc::clone(&self.store)
    }

    /// Returns true if summarization is available.
    pub fn has_summarization(&self) -> bool {
        self.summarizer.is_some()
    }

    // ------------------------------------------------------------------
    // Todo commands
    // ------------------------------------------------------------------

    /// `/todo_create`
    pub async fn task_create(&self, user: &UserId) -> Vec<Reply> {
        let mut state = self.store.lock(user).await;
        replies(self.engine.begin_create(&mut state))
    }

    /// `/todo_list [page] [size]`
    pub async fn task_list(&self, user: &UserId, args: &str) -> Vec<Reply> {
        let (page, page_size) = match parse_list_args(args, self.page_size) {
            Ok(parsed) => parsed,
            Err(e) => return vec![Reply::text(format!("❌ {}\n\n{}", e, LIST_USAGE))],
        };

        let mut state = self.store.lock(user).await;
        vec![self.render_reply(user, &mut state, page, page_size).await]
    }

    /// `/todo_update [n]`
    pub async fn task_update(&self, user: &UserId, args: &str) -> Vec<Reply> {
        let number = match parse_task_number(args) {
            Ok(number) => number,
            Err(e) => return vec![Reply::text(format!("❌ {}\n\n{}", e, UPDATE_USAGE))],
        };

        let mut state = self.store.lock(user).await;
        match number {
            Some(n) => replies(self.engine.begin_update(&mut state, n)),
            None => self.list_with_hint(user, &mut state, UPDATE_USAGE).await,
        }
    }

    /// `/todo_delete [n]`
    pub async fn task_delete(&self, user: &UserId, args: &str) -> Vec<Reply> {
        let number = match parse_task_number(args) {
            Ok(number) => number,
            Err(e) => return vec![Reply::text(format!("❌ {}\n\n{}", e, DELETE_USAGE))],
        };

        let mut state = self.store.lock(user).await;
        match number {
            Some(n) => replies(self.engine.begin_delete(&mut state, n)),
            None => self.list_with_hint(user, &mut state, DELETE_USAGE).await,
        }
    }

    /// `/cancel`
    pub async fn cancel(&self, user: &UserId) -> Vec<Reply> {
        let mut state = self.store.lock(user).await;
        if self.engine.cancel(&mut state) {
            debug!(user = %user, "Conversation cancelled");
            vec![Reply::text("Cancelled.")]
        } else {
            vec![Reply::text("Nothing to cancel.")]
        }
    }

    /// Feeds non-command text into the user's conversation.
    ///
    /// Returns `None` when the user is not in a conversation.
    pub async fn handle_text(&self, user: &UserId, text: &str) -> Option<Vec<Reply>> {
        let mut state = self.store.lock(user).await;
        if !state.in_conversation() {
            return None;
        }
        Some(replies(self.engine.step(user, &mut state, text).await))
    }

    /// Handles a click on a pagination control.
    ///
    /// Returns `None` for foreign controls and when no acting user can be
    /// determined.
    pub async fn activate_control(&self, activation: &ControlActivation) -> Option<ControlOutcome> {
        let control = PageControl::parse(&activation.control_id)?;
        let Some(user) = activation.resolve_identity() else {
            debug!(control = %activation.control_id, "Ignoring control without identity");
            return None;
        };

        let mut state = self.store.lock(user).await;
        let page_size = state
            .pagination
            .as_ref()
            .map_or(self.page_size, |p| p.page_size);

        let outcome = match self.renderer.render(user, &mut state, control.page, page_size).await {
            Ok(payload) => ControlOutcome::Edit(payload.into()),
            Err(e) => ControlOutcome::Notice(format!("❌ {}", e)),
        };
        Some(outcome)
    }

    async fn render_reply(&self, user: &UserId, state: &mut UserState, page: u32, page_size: u32) -> Reply {
        match self.renderer.render(user, state, page, page_size).await {
            Ok(payload) => payload.into(),
            Err(e) => Reply::text(format!("❌ Failed to load your tasks: {}", e)),
        }
    }

    /// Shows the current page followed by `usage`, ending any dialogue.
    async fn list_with_hint(&self, user: &UserId, state: &mut UserState, usage: &str) -> Vec<Reply> {
        state.conversation = None;
        let (page, page_size) = state
            .pagination
            .as_ref()
            .map_or((1, self.page_size), |p| (p.current_page.max(1), p.page_size));

        vec![
            self.render_reply(user, state, page, page_size).await,
            Reply::text(usage),
        ]
    }

    // ------------------------------------------------------------------
    // Summarization
    // ------------------------------------------------------------------

    /// `/summarize <text>`
    pub async fn summarize(&self, text: &str, sink: &dyn ReplySink) {
        let text = text.trim();
        if text.is_empty() {
            sink.send(Reply::text("Please provide some text to summarize after the command."))
                .await;
            return;
        }
        let Some(summarizer) = &self.summarizer else {
            sink.send(Reply::text(SUMMARY_DISABLED_TEXT)).await;
            return;
        };

        sink.send(Reply::text("⏳ Okay, summarizing that for you. Please wait..."))
            .await;

        match summarizer.summarize(text).await {
            Ok(summary) => sink.send(Reply::text(summary)).await,
            Err(e) => {
                warn!(error = %e, "Summarization failed");
                sink.send(Reply::text("❌ Sorry, something went wrong while summarizing."))
                    .await;
            }
        }
    }

    /// `/summarize_link <url>`
    pub async fn summarize_link(&self, raw_url: &str, sink: &dyn ReplySink) {
        let url = match parse_web_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                sink.send(Reply::text(format!("❌ {}. Please provide a valid http(s) URL.", e)))
                    .await;
                return;
            }
        };
        let Some(summarizer) = &self.summarizer else {
            sink.send(Reply::text(SUMMARY_DISABLED_TEXT)).await;
            return;
        };

        sink.send(Reply::text("🌐 Fetching the page... Please wait.")).await;

        let content = match self.fetcher.fetch_page(url.as_str()).await {
            Ok(content) => content,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to fetch page");
                sink.send(Reply::text("❌ Sorry, I could not access that URL.")).await;
                return;
            }
        };
        if content.trim().is_empty() {
            sink.send(Reply::text("That page has no readable content.")).await;
            return;
        }

        sink.send(Reply::text("Page loaded. Summarizing its content now..."))
            .await;

        match summarizer.summarize(&content).await {
            Ok(summary) => {
                info!(url = %url, "Summarized page");
                sink.send(Reply::text(format!("📄 Summary of the page:\n{}", summary)))
                    .await;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Summarization of page failed");
                sink.send(Reply::text(
                    "❌ Sorry, something went wrong while summarizing the page.",
                ))
                .await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Canned replies
    // ------------------------------------------------------------------

    /// `/help` and `/start`
    pub fn help(&self, name: &str) -> String {
        let mut text = format!("Hello {}, I am JanBot.\n\nAvailable commands:\n", name);
        text.push_str("/ping - ping the bot\n");
        text.push_str("/hello - get a greeting\n");
        text.push_str("/help - show this message\n");
        if self.has_summarization() {
            text.push_str("/summarize <text> - summarize a long text\n");
            text.push_str("/summarize_link <url> - summarize a web page\n");
        }
        text.push_str("\nTodo commands:\n");
        text.push_str("/todo_create - create a task\n");
        text.push_str("/todo_list [page] [size] - list your tasks\n");
        text.push_str("/todo_update <n> - update task number n from the list\n");
        text.push_str("/todo_delete <n> - delete task number n from the list\n");
        text.push_str("/cancel - abandon the current dialogue");
        text
    }

    /// `/ping`
    pub fn ping(&self) -> &'static str {
        "Pong!"
    }

    /// `/hello`
    pub fn hello(&self, name: &str) -> String {
        format!("Hello, {}!", name)
    }
}

const LIST_USAGE: &str = "Usage: /todo_list [page] [size]";
const UPDATE_USAGE: &str = "Usage: /todo_update <n>, where n is a task number from the list.";
const DELETE_USAGE: &str = "Usage: /todo_delete <n>, where n is a task number from the list.";
const SUMMARY_DISABLED_TEXT: &str = "Summarization is not configured on this bot.";

fn replies(outcome: StepOutcome) -> Vec<Reply> {
    outcome.messages.into_iter().map(Reply::text).collect()
}

/// Parses an optional task number. Empty input yields `None`.
fn parse_task_number(args: &str) -> Result<Option<u32>> {
    let Some(arg) = args.split_whitespace().next() else {
        return Ok(None);
    };
    match arg.parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(CoreError::InputInvalid(format!(
            "'{}' is not a task number",
            arg
        ))),
    }
}

/// Parses `[page] [size]`.
fn parse_list_args(args: &str, default_size: u32) -> Result<(u32, u32)> {
    let mut parts = args.split_whitespace();
    let page = match parts.next() {
        Some(raw) => raw
            .parse()
            .map_err(|_| CoreError::InputInvalid(format!("'{}' is not a page number", raw)))?,
        None => 1,
    };
    let page_size = match parts.next() {
        Some(raw) => raw
            .parse()
            .map_err(|_| CoreError::InputInvalid(format!("'{}' is not a page size", raw)))?,
        None => default_size,
    };
    Ok((page, page_size))
}

/// Parses a URL, accepting only http and https.
fn parse_web_url(raw: &str) -> Result<url::Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CoreError::InputInvalid("no URL given".to_string()));
    }
    let url = url::Url::parse(raw)
        .map_err(|e| CoreError::InputInvalid(format!("'{}' is not a URL ({})", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(CoreError::InputInvalid(format!(
            "unsupported URL scheme '{}'",
            scheme
        ))),
    }
}
