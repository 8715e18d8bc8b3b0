//! Bot configuration.
//!
//! Configuration is read from environment variables (usually populated from
//! a `.env` file by the binary).
//!
//! # Environment Variables
//!
//! Required:
//! - `TODO_API_URL`: Base URL of the todo backend
//!
//! Optional:
//! - `GEMINI_API_KEY` (or legacy `GEMINI_CREDS`): Enables summarization
//! - `GEMINI_MODEL`: Model name (default: gemini-2.0-flash)
//! - `GEMINI_API_URL`: API base URL (default: Google's v1beta endpoint)
//! - `BOT_HTTP_TIMEOUT_SECS`: Timeout for every outbound HTTP call (default: 15)
//! - `TODO_PAGE_SIZE`: Default list page size (default: 5)
//! - `BOT_CONVERSATION_TTL_SECS`: Abandoned conversation expiry (default: 900)
//! - `BOT_IDLE_USER_TTL_SECS`: Idle user state eviction (default: 86400)
//! - `BOT_SWEEP_INTERVAL_SECS`: How often expiry runs (default: 60)

use std::time::Duration;

use crate::error::{CoreError, Result};

/// Environment variable for the todo backend base URL.
pub const TODO_API_URL_ENV: &str = "TODO_API_URL";

/// Environment variable for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Legacy name of the Gemini API key variable.
pub const GEMINI_CREDS_ENV: &str = "GEMINI_CREDS";

/// Environment variable for the Gemini model.
pub const GEMINI_MODEL_ENV: &str = "GEMINI_MODEL";

/// Environment variable for the Gemini API base URL.
pub const GEMINI_API_URL_ENV: &str = "GEMINI_API_URL";

/// Environment variable for the outbound HTTP timeout.
pub const HTTP_TIMEOUT_ENV: &str = "BOT_HTTP_TIMEOUT_SECS";

/// Environment variable for the default list page size.
pub const PAGE_SIZE_ENV: &str = "TODO_PAGE_SIZE";

/// Environment variable for the conversation expiry.
pub const CONVERSATION_TTL_ENV: &str = "BOT_CONVERSATION_TTL_SECS";

/// Environment variable for idle user eviction.
pub const IDLE_USER_TTL_ENV: &str = "BOT_IDLE_USER_TTL_SECS";

/// Environment variable for the sweep interval.
pub const SWEEP_INTERVAL_ENV: &str = "BOT_SWEEP_INTERVAL_SECS";

/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default page size for task lists.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Largest page size a user may request.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Highest page number accepted; keeps every display number within `u32`.
pub const MAX_PAGE: u32 = u32::MAX / MAX_PAGE_SIZE;

/// Failed identifier resolutions allowed before a conversation is dropped.
pub const MAX_RESOLUTION_ATTEMPTS: u32 = 3;

/// Configuration for the bot core.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Base URL of the todo backend, without trailing slash.
    pub todo_api_url: String,
    /// Gemini API key; summarization is disabled when absent.
    pub gemini_api_key: Option<String>,
    /// Gemini model name.
    pub gemini_model: String,
    /// Gemini API base URL.
    pub gemini_api_url: String,
    /// Timeout applied to every outbound HTTP call.
    pub http_timeout: Duration,
    /// Default page size for task lists.
    pub page_size: u32,
    /// Failed resolutions allowed per conversation.
    pub max_resolution_attempts: u32,
    /// Conversations idle longer than this are dropped.
    pub conversation_ttl: Duration,
    /// User entries idle longer than this are evicted entirely.
    pub idle_user_ttl: Duration,
    /// How often the expiry sweep runs.
    pub sweep_interval: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            todo_api_url: "http://localhost:8080".to_string(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            http_timeout: Duration::from_secs(15),
            page_size: DEFAULT_PAGE_SIZE,
            max_resolution_attempts: MAX_RESOLUTION_ATTEMPTS,
            conversation_ttl: Duration::from_secs(15 * 60),
            idle_user_ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl BotConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let todo_api_url = get(TODO_API_URL_ENV).ok_or_else(|| {
            CoreError::Configuration(format!("Missing {} environment variable", TODO_API_URL_ENV))
        })?;

        let page_size = parse_or(get(PAGE_SIZE_ENV), PAGE_SIZE_ENV, defaults.page_size)?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(CoreError::Configuration(format!(
                "{} must be between 1 and {}",
                PAGE_SIZE_ENV, MAX_PAGE_SIZE
            )));
        }

        Ok(Self {
            todo_api_url: todo_api_url.trim_end_matches('/').to_string(),
            gemini_api_key: get(GEMINI_API_KEY_ENV).or_else(|| get(GEMINI_CREDS_ENV)),
            gemini_model: get(GEMINI_MODEL_ENV).unwrap_or(defaults.gemini_model),
            gemini_api_url: get(GEMINI_API_URL_ENV)
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_api_url),
            http_timeout: secs_or(get(HTTP_TIMEOUT_ENV), HTTP_TIMEOUT_ENV, defaults.http_timeout)?,
            page_size,
            max_resolution_attempts: defaults.max_resolution_attempts,
            conversation_ttl: secs_or(
                get(CONVERSATION_TTL_ENV),
                CONVERSATION_TTL_ENV,
                defaults.conversation_ttl,
            )?,
            idle_user_ttl: secs_or(get(IDLE_USER_TTL_ENV), IDLE_USER_TTL_ENV, defaults.idle_user_ttl)?,
            sweep_interval: secs_or(
                get(SWEEP_INTERVAL_ENV),
                SWEEP_INTERVAL_ENV,
                defaults.sweep_interval,
            )?,
        })
    }

    /// Returns true if a summarization API key is configured.
    pub fn has_summarization(&self) -> bool {
        self.gemini_api_key.is_some()
    }

    /// Sets the todo backend URL.
    pub fn with_todo_api_url(mut self, url: impl Into<String>) -> Self {
        self.todo_api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the Gemini API key.
    pub fn with_gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.gemini_api_key = Some(key.into());
        self
    }

    /// Sets the HTTP timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Sets the default page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the conversation expiry.
    pub fn with_conversation_ttl(mut self, ttl: Duration) -> Self {
        self.conversation_ttl = ttl;
        self
    }
}

fn parse_or(value: Option<String>, key: &str, default: u32) -> Result<u32> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| CoreError::Configuration(format!("{} must be a positive integer, got '{}'", key, v))),
        None => Ok(default),
    }
}

fn secs_or(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match value {
        Some(v) => match v.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(CoreError::Configuration(format!(
                "{} must be a positive number of seconds, got '{}'",
                key, v
            ))),
        },
        None => Ok(default),
    }
}
