//! In-memory doubles for the external services, used by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use janbot_models::{Task, TaskId, TaskPage, TaskStatus, UserId};

use crate::backend::TaskBackend;
use crate::error::{CoreError, Result};
use crate::router::{Reply, ReplySink};
use crate::summarizer::{PageFetcher, Summarizer};

/// A call received by [`FakeBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Create { title: String, status: String, owner: UserId },
    List { owner: UserId, page: u32, limit: u32 },
    Update { id: TaskId, title: String, status: String, owner: UserId },
    Delete { id: TaskId, owner: UserId },
}

/// `n` tasks with ids `task-1..=task-n` and rotating statuses.
pub fn sample_tasks(n: usize) -> Vec<Task> {
    let statuses = [TaskStatus::Backlog, TaskStatus::InProgress, TaskStatus::Done];
    (1..=n)
        .map(|i| Task {
            id: TaskId::new(format!("task-{}", i)),
            title: format!("Task {}", i),
            status: statuses[(i - 1) % statuses.len()].clone(),
            owner_id: "1".to_string(),
            created_at: None,
            updated_at: None,
        })
        .collect()
}

/// Backend that serves a fixed task list and records every call.
#[derive(Default)]
pub struct FakeBackend {
    tasks: Vec<Task>,
    calls: Mutex<Vec<BackendCall>>,
    fail_list: AtomicBool,
    fail_mutations: AtomicBool,
    ignore_limit: bool,
    ignore_page: bool,
}

impl FakeBackend {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    /// Returns every remaining task regardless of the requested limit.
    pub fn ignoring_limit(mut self) -> Self {
        self.ignore_limit = true;
        self
    }

    /// Serves rows from the start of the list whatever page is asked for.
    pub fn ignoring_page(mut self) -> Self {
        self.ignore_page = true;
        self
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than listing.
    pub fn mutations(&self) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, BackendCall::List { .. }))
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutation_result(&self) -> Result<serde_json::Value> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(CoreError::BackendError("internal server error".to_string()))
        } else {
            Ok(serde_json::json!({"message": "ok"}))
        }
    }
}

#[async_trait]
impl TaskBackend for FakeBackend {
    async fn create(&self, title: &str, status: &str, owner: &UserId) -> Result<serde_json::Value> {
        self.record(BackendCall::Create {
            title: title.to_string(),
            status: status.to_string(),
            owner: owner.clone(),
        });
        self.mutation_result()
    }

    async fn list_page(&self, owner: &UserId, page: u32, limit: u32) -> Result<TaskPage> {
        self.record(BackendCall::List {
            owner: owner.clone(),
            page,
            limit,
        });
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(CoreError::BackendUnavailable("connection refused".to_string()));
        }

        let start = if self.ignore_page {
            0
        } else {
            (page as usize - 1) * limit as usize
        };
        let end = if self.ignore_limit {
            self.tasks.len()
        } else {
            (start + limit as usize).min(self.tasks.len())
        };
        let tasks = self.tasks.get(start..end).map(<[Task]>::to_vec).unwrap_or_default();
        let total = self.tasks.len() as u64;

        Ok(TaskPage {
            tasks,
            total,
            page,
            limit,
            total_pages: total.div_ceil(u64::from(limit)) as u32,
        })
    }

    async fn update(
        &self,
        id: &TaskId,
        title: &str,
        status: &str,
        owner: &UserId,
    ) -> Result<serde_json::Value> {
        self.record(BackendCall::Update {
            id: id.clone(),
            title: title.to_string(),
            status: status.to_string(),
            owner: owner.clone(),
        });
        self.mutation_result()
    }

    async fn delete(&self, id: &TaskId, owner: &UserId) -> Result<serde_json::Value> {
        self.record(BackendCall::Delete {
            id: id.clone(),
            owner: owner.clone(),
        });
        self.mutation_result()
    }
}

/// Summarizer returning a canned summary or error.
pub struct FakeSummarizer {
    pub result: std::result::Result<String, String>,
    pub inputs: Mutex<Vec<String>>,
}

impl FakeSummarizer {
    pub fn ok(summary: &str) -> Self {
        Self {
            result: Ok(summary.to_string()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            inputs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        self.inputs.lock().unwrap().push(text.to_string());
        self.result.clone().map_err(CoreError::Summarization)
    }
}

/// Fetcher returning a canned page body or error.
pub struct FakeFetcher {
    pub result: std::result::Result<String, String>,
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_page(&self, _url: &str) -> Result<String> {
        self.result.clone().map_err(CoreError::PageFetch)
    }
}

/// Sink collecting replies in order.
#[derive(Default)]
pub struct RecordingSink {
    replies: Mutex<Vec<Reply>>,
}

impl RecordingSink {
    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.replies().into_iter().map(|r| r.text).collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send(&self, reply: Reply) {
        self.replies.lock().unwrap().push(reply);
    }
}
