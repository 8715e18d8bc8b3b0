//! Task types as served by the todo backend.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::TaskId;

/// Workflow status of a task.
///
/// The backend knows `backlog`, `in-progress` and `done`. Any other value is
/// kept verbatim in [`TaskStatus::Other`] so it can still be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    /// Not started yet.
    Backlog,
    /// Currently being worked on.
    InProgress,
    /// Finished.
    Done,
    /// A status this bot does not know about.
    Other(String),
}

impl TaskStatus {
    /// Parses user or backend supplied status text.
    ///
    /// Matching is case-insensitive and treats spaces and underscores like
    /// dashes, so "In Progress" and "in_progress" both map to `InProgress`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let normalized = trimmed.to_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "backlog" | "todo" | "to-do" => Self::Backlog,
            "in-progress" | "inprogress" | "progress" | "doing" => Self::InProgress,
            "done" | "complete" | "completed" => Self::Done,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Returns the wire form of the status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Backlog => "backlog",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A task owned by a chat user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Backend identifier.
    pub id: TaskId,

    /// Task title.
    #[serde(default)]
    pub title: String,

    /// Current status.
    pub status: TaskStatus,

    /// Chat user that owns the task.
    #[serde(rename = "discord_id", default)]
    pub owner_id: String,

    /// When the task was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the task was last modified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of a user's tasks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskPage {
    /// Tasks on this page, in display order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tasks: Vec<Task>,

    /// Total number of tasks across all pages.
    #[serde(default)]
    pub total: u64,

    /// Page number (1-based) as reported by the backend.
    #[serde(default)]
    pub page: u32,

    /// Page size as reported by the backend.
    #[serde(default)]
    pub limit: u32,

    /// Total number of pages.
    #[serde(default)]
    pub total_pages: u32,
}

impl TaskPage {
    /// Returns true if the page holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// The backend encodes an empty task list as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Task>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Task>>::deserialize(deserializer)?.unwrap_or_default())
}
