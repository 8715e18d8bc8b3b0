//! Multi-step task dialogues.
//!
//! Creating, updating and deleting a task each take a short, fixed sequence
//! of questions. The engine keeps one [`ConversationState`] per user, feeds
//! each free-text answer through the matching step, and calls the todo
//! backend only once all parameters are collected.
//!
//! # Flows
//!
//! - **Create**: title → status → `create`.
//! - **Update**: title (or `skip`) → status (or `skip`) → resolve the display
//!   number → `update`.
//! - **Delete**: `yes` confirmation → resolve the display number → `delete`.
//!
//! Resolving a display number that is not on the user's current page is
//! retried up to [`crate::config::MAX_RESOLUTION_ATTEMPTS`] times; every other
//! failure ends the conversation.

use std::sync::Arc;

use janbot_models::{TaskStatus, UserId};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::TaskBackend;
use crate::error::CoreError;
use crate::pagination::{PaginationTracker, RenderedTask};
use crate::store::UserState;

/// Answer that keeps the current value during an update.
pub const SKIP_KEYWORD: &str = "skip";

/// Answer that confirms a deletion.
pub const CONFIRM_KEYWORD: &str = "yes";

/// Shown when a task number is used before any list was rendered.
pub const LIST_FIRST_TEXT: &str = "❌ No task list loaded yet. Run /todo_list first, then pick a task number from it.";

const STATUS_HINT: &str = "backlog, in-progress, done";

/// The task operation a conversation collects parameters for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Create,
    Update,
    Delete,
}

/// What the conversation is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStep {
    AwaitTitle,
    AwaitStatus,
    AwaitConfirmation,
}

/// A dialogue in progress.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Operation being prepared.
    pub action: TaskAction,
    /// Current position in the action's sequence.
    pub step: ConversationStep,
    /// New title; `None` keeps the existing one (update only).
    pub pending_title: Option<String>,
    /// New status; `None` keeps the existing one (update only).
    pub pending_status: Option<String>,
    /// Display number the user referred to (update and delete).
    pub target: Option<u32>,
    /// Failed attempts to resolve `target`.
    pub invalid_attempts: u32,
    /// When the user last answered.
    pub last_activity: Instant,
}

impl ConversationState {
    /// Starts a conversation at the first step of `action`.
    pub fn new(action: TaskAction, target: Option<u32>) -> Self {
        let step = match action {
            TaskAction::Create | TaskAction::Update => ConversationStep::AwaitTitle,
            TaskAction::Delete => ConversationStep::AwaitConfirmation,
        };
        Self {
            action,
            step,
            pending_title: None,
            pending_status: None,
            target,
            invalid_attempts: 0,
            last_activity: Instant::now(),
        }
    }
}

/// Messages produced by one step, and whether the conversation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Messages for the user, in order.
    pub messages: Vec<String>,
    /// True if the conversation is over.
    pub finished: bool,
}

impl StepOutcome {
    fn proceed(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            finished: false,
        }
    }

    fn finish(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            finished: true,
        }
    }
}

/// Result of resolving a conversation's target.
enum Resolution {
    Found(RenderedTask),
    Retry(String),
    Abort(String),
}

/// Drives task dialogues.
#[derive(Clone)]
pub struct ConversationEngine {
    backend: Arc<dyn TaskBackend>,
    max_attempts: u32,
}

impl ConversationEngine {
    /// Creates an engine that allows `max_attempts` failed resolutions.
    pub fn new(backend: Arc<dyn TaskBackend>, max_attempts: u32) -> Self {
        Self {
            backend,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Starts a create dialogue, replacing any other.
    pub fn begin_create(&self, state: &mut UserState) -> StepOutcome {
        state.conversation = Some(ConversationState::new(TaskAction::Create, None));
        StepOutcome::proceed("📝 Creating a new task. What is the title?")
    }

    /// Starts an update dialogue for display number `target`.
    ///
    /// Without a prior list render no dialogue is started.
    pub fn begin_update(&self, state: &mut UserState, target: u32) -> StepOutcome {
        let Some(pagination) = state.pagination.as_ref() else {
            state.conversation = None;
            return StepOutcome::finish(LIST_FIRST_TEXT);
        };

        let label = match pagination.get(target) {
            Some(task) => format!("task #{} ({})", target, task.title),
            None => format!("task #{}", target),
        };
        state.conversation = Some(ConversationState::new(TaskAction::Update, Some(target)));
        StepOutcome::proceed(format!(
            "✏️ Updating {}. Enter the new title, or '{}' to keep the current one:",
            label, SKIP_KEYWORD
        ))
    }

    /// Starts a delete dialogue for display number `target`.
    ///
    /// Without a prior list render no dialogue is started.
    pub fn begin_delete(&self, state: &mut UserState, target: u32) -> StepOutcome {
        let Some(pagination) = state.pagination.as_ref() else {
            state.conversation = None;
            return StepOutcome::finish(LIST_FIRST_TEXT);
        };

        let label = match pagination.get(target) {
            Some(task) => format!("task #{} ({})", target, task.title),
            None => format!("task #{}", target),
        };
        state.conversation = Some(ConversationState::new(TaskAction::Delete, Some(target)));
        StepOutcome::proceed(format!(
            "🗑️ Delete {}? Type '{}' to confirm; anything else cancels.",
            label, CONFIRM_KEYWORD
        ))
    }

    /// Drops the user's conversation. Returns true if there was one.
    pub fn cancel(&self, state: &mut UserState) -> bool {
        state.conversation.take().is_some()
    }

    /// Feeds one answer into the user's conversation.
    pub async fn step(&self, user: &UserId, state: &mut UserState, text: &str) -> StepOutcome {
        let Some(mut conversation) = state.conversation.take() else {
            return StepOutcome {
                messages: Vec::new(),
                finished: true,
            };
        };

        let text = text.trim();
        debug!(
            user = %user,
            action = ?conversation.action,
            step = ?conversation.step,
            "Conversation step"
        );

        let outcome = match (conversation.action, conversation.step) {
            (TaskAction::Create, ConversationStep::AwaitTitle) => {
                self.create_title(&mut conversation, text)
            }
            (TaskAction::Create, _) => self.create_status(user, &conversation, text).await,
            (TaskAction::Update, ConversationStep::AwaitTitle) => {
                self.update_title(&mut conversation, text)
            }
            (TaskAction::Update, _) => {
                self.update_status(user, state, &mut conversation, text).await
            }
            (TaskAction::Delete, _) => self.delete_confirm(user, state, &mut conversation, text).await,
        };

        if !outcome.finished {
            conversation.last_activity = Instant::now();
            state.conversation = Some(conversation);
        }
        outcome
    }

    fn create_title(&self, conversation: &mut ConversationState, text: &str) -> StepOutcome {
        if text.is_empty() {
            return StepOutcome::proceed("The title cannot be empty. What is the title?");
        }
        conversation.pending_title = Some(text.to_string());
        conversation.step = ConversationStep::AwaitStatus;
        StepOutcome::proceed(format!("What is the status? ({})", STATUS_HINT))
    }

    async fn create_status(
        &self,
        user: &UserId,
        conversation: &ConversationState,
        text: &str,
    ) -> StepOutcome {
        if text.is_empty() {
            return StepOutcome::proceed(format!(
                "The status cannot be empty. What is the status? ({})",
                STATUS_HINT
            ));
        }
        let title = conversation.pending_title.clone().unwrap_or_default();
        let status = TaskStatus::parse(text);

        match self.backend.create(&title, status.as_str(), user).await {
            Ok(_) => {
                info!(user = %user, title = %title, "Task created");
                StepOutcome::finish(format!("✅ Task created: {} [{}]", title, status))
            }
            Err(e) => {
                warn!(user = %user, error = %e, "Task creation failed");
                StepOutcome::finish(format!("❌ Failed to create task: {}", e))
            }
        }
    }

    fn update_title(&self, conversation: &mut ConversationState, text: &str) -> StepOutcome {
        if text.is_empty() {
            return StepOutcome::proceed(format!(
                "Enter the new title, or '{}' to keep the current one:",
                SKIP_KEYWORD
            ));
        }
        conversation.pending_title = if is_skip(text) {
            None
        } else {
            Some(text.to_string())
        };
        conversation.step = ConversationStep::AwaitStatus;
        StepOutcome::proceed(format!(
            "Enter the new status ({}), or '{}' to keep the current one:",
            STATUS_HINT, SKIP_KEYWORD
        ))
    }

    async fn update_status(
        &self,
        user: &UserId,
        state: &UserState,
        conversation: &mut ConversationState,
        text: &str,
    ) -> StepOutcome {
        if text.is_empty() {
            return StepOutcome::proceed(format!(
                "Enter the new status ({}), or '{}' to keep the current one:",
                STATUS_HINT, SKIP_KEYWORD
            ));
        }
        conversation.pending_status = if is_skip(text) {
            None
        } else {
            Some(TaskStatus::parse(text).as_str().to_string())
        };

        let task = match self.resolve_target(state, conversation) {
            Resolution::Found(task) => task,
            Resolution::Abort(message) => return StepOutcome::finish(message),
            Resolution::Retry(message) => {
                conversation.step = ConversationStep::AwaitTitle;
                conversation.pending_title = None;
                conversation.pending_status = None;
                return StepOutcome::proceed(format!(
                    "{} Enter the new title again, or '{}' to keep the current one:",
                    message, SKIP_KEYWORD
                ));
            }
        };

        let number = conversation.target.unwrap_or_default();
        // Skipped fields keep the values the user saw in the list.
        let title = conversation
            .pending_title
            .clone()
            .unwrap_or_else(|| task.title.clone());
        let status = conversation
            .pending_status
            .clone()
            .unwrap_or_else(|| task.status.as_str().to_string());

        match self.backend.update(&task.id, &title, &status, user).await {
            Ok(_) => {
                info!(user = %user, task = %task.id, "Task updated");
                StepOutcome::finish(format!("✅ Task #{} updated: {} [{}]", number, title, status))
            }
            Err(e) => {
                warn!(user = %user, task = %task.id, error = %e, "Task update failed");
                StepOutcome::finish(format!("❌ Failed to update task #{}: {}", number, e))
            }
        }
    }

    async fn delete_confirm(
        &self,
        user: &UserId,
        state: &UserState,
        conversation: &mut ConversationState,
        text: &str,
    ) -> StepOutcome {
        if !text.eq_ignore_ascii_case(CONFIRM_KEYWORD) {
            debug!(user = %user, "Deletion cancelled");
            return StepOutcome::finish("Deletion cancelled.");
        }

        let task = match self.resolve_target(state, conversation) {
            Resolution::Found(task) => task,
            Resolution::Abort(message) => return StepOutcome::finish(message),
            Resolution::Retry(message) => {
                return StepOutcome::proceed(format!(
                    "{} Type '{}' to try again; anything else cancels.",
                    message, CONFIRM_KEYWORD
                ));
            }
        };

        let number = conversation.target.unwrap_or_default();
        match self.backend.delete(&task.id, user).await {
            Ok(_) => {
                info!(user = %user, task = %task.id, "Task deleted");
                StepOutcome::finish(format!("🗑️ Task #{} deleted: {}", number, task.title))
            }
            Err(e) => {
                warn!(user = %user, task = %task.id, error = %e, "Task deletion failed");
                StepOutcome::finish(format!("❌ Failed to delete task #{}: {}", number, e))
            }
        }
    }

    /// Applies the bounded retry policy to the conversation's target.
    fn resolve_target(&self, state: &UserState, conversation: &mut ConversationState) -> Resolution {
        let Some(target) = conversation.target else {
            return Resolution::Abort("❌ No task number was given.".to_string());
        };

        match PaginationTracker::resolve(state, target) {
            Ok(task) => Resolution::Found(task.clone()),
            Err(CoreError::ResolutionNotFound(n)) => {
                conversation.invalid_attempts += 1;
                if conversation.invalid_attempts >= self.max_attempts {
                    warn!(
                        task_number = n,
                        attempts = conversation.invalid_attempts,
                        "Too many invalid task numbers"
                    );
                    Resolution::Abort("❌ Too many invalid attempts. Cancelled.".to_string())
                } else {
                    Resolution::Retry(format!(
                        "⚠️ Task #{} is not on the page you are viewing ({}/{}). Open the page that shows it.",
                        n, conversation.invalid_attempts, self.max_attempts
                    ))
                }
            }
            Err(_) => Resolution::Abort(LIST_FIRST_TEXT.to_string()),
        }
    }
}

fn is_skip(text: &str) -> bool {
    text.eq_ignore_ascii_case(SKIP_KEYWORD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UserStateStore;
    use crate::testing::{sample_tasks, BackendCall, FakeBackend};
    use janbot_models::TaskId;

    struct Fixture {
        backend: Arc<FakeBackend>,
        tracker: PaginationTracker,
        engine: ConversationEngine,
        store: UserStateStore,
        user: UserId,
    }

    fn fixture(tasks: usize) -> Fixture {
        let backend = Arc::new(FakeBackend::with_tasks(sample_tasks(tasks)));
        Fixture {
            tracker: PaginationTracker::new(backend.clone()),
            engine: ConversationEngine::new(backend.clone(), 3),
            backend,
            store: UserStateStore::new(),
            user: UserId::from("1"),
        }
    }

    #[tokio::test]
    async fn test_create_flow() {
        let f = fixture(0);
        let mut state = f.store.lock(&f.user).await;

        let start = f.engine.begin_create(&mut state);
        assert!(!start.finished);

        let outcome = f.engine.step(&f.user, &mut state, "Buy milk").await;
        assert!(!outcome.finished);
        assert_eq!(
            state.conversation.as_ref().unwrap().step,
            ConversationStep::AwaitStatus
        );
        assert!(f.backend.calls().is_empty());

        let outcome = f.engine.step(&f.user, &mut state, "In Progress").await;
        assert!(outcome.finished);
        assert!(outcome.messages[0].contains("Task created"));
        assert!(state.conversation.is_none());
        assert_eq!(
            f.backend.calls(),
            vec![BackendCall::Create {
                title: "Buy milk".to_string(),
                status: "in-progress".to_string(),
                owner: f.user.clone(),
            }]
        );
    }

    #[tokio::test]
    async fn test_create_empty_title_reprompts() {
        let f = fixture(0);
        let mut state = f.store.lock(&f.user).await;
        f.engine.begin_create(&mut state);

        let outcome = f.engine.step(&f.user, &mut state, "   ").await;
        assert!(!outcome.finished);
        assert_eq!(
            state.conversation.as_ref().unwrap().step,
            ConversationStep::AwaitTitle
        );
    }

    #[tokio::test]
    async fn test_create_failure_terminates() {
        let f = fixture(0);
        f.backend.fail_mutations(true);
        let mut state = f.store.lock(&f.user).await;
        f.engine.begin_create(&mut state);

        f.engine.step(&f.user, &mut state, "Buy milk").await;
        let outcome = f.engine.step(&f.user, &mut state, "backlog").await;

        assert!(outcome.finished);
        assert!(outcome.messages[0].starts_with("❌"));
        assert!(state.conversation.is_none());
        assert_eq!(f.backend.mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_update_skip_leaves_fields_unset() {
        let f = fixture(7);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();
        f.engine.begin_update(&mut state, 2);

        let outcome = f.engine.step(&f.user, &mut state, "SKIP").await;
        assert!(!outcome.finished);
        let conversation = state.conversation.as_ref().unwrap();
        assert_eq!(conversation.step, ConversationStep::AwaitStatus);
        assert_eq!(conversation.pending_title, None);

        let outcome = f.engine.step(&f.user, &mut state, "done").await;
        assert!(outcome.finished);
        // The skipped title keeps the value shown in the list.
        assert_eq!(
            f.backend.mutations(),
            vec![BackendCall::Update {
                id: TaskId::from("task-2"),
                title: "Task 2".to_string(),
                status: "done".to_string(),
                owner: f.user.clone(),
            }]
        );
    }

    #[tokio::test]
    async fn test_update_skip_status() {
        let f = fixture(7);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();
        f.engine.begin_update(&mut state, 3);

        f.engine.step(&f.user, &mut state, "Renamed").await;
        f.engine.step(&f.user, &mut state, "skip").await;

        assert_eq!(
            f.backend.mutations(),
            vec![BackendCall::Update {
                id: TaskId::from("task-3"),
                title: "Renamed".to_string(),
                status: "done".to_string(),
                owner: f.user.clone(),
            }]
        );
    }

    #[tokio::test]
    async fn test_update_retries_then_gives_up_after_three() {
        let f = fixture(7);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();
        // Task 7 lives on page 2, so it cannot be resolved from page 1.
        f.engine.begin_update(&mut state, 7);

        for attempt in 1..=2 {
            f.engine.step(&f.user, &mut state, "New title").await;
            let outcome = f.engine.step(&f.user, &mut state, "done").await;
            assert!(!outcome.finished);
            let conversation = state.conversation.as_ref().unwrap();
            assert_eq!(conversation.invalid_attempts, attempt);
            assert_eq!(conversation.step, ConversationStep::AwaitTitle);
            assert_eq!(conversation.pending_title, None);
        }

        f.engine.step(&f.user, &mut state, "New title").await;
        let outcome = f.engine.step(&f.user, &mut state, "done").await;
        assert!(outcome.finished);
        assert!(outcome.messages[0].contains("Too many invalid attempts"));
        assert!(state.conversation.is_none());
        assert!(f.backend.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_update_retry_succeeds_after_page_change() {
        let f = fixture(7);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();
        f.engine.begin_update(&mut state, 7);

        f.engine.step(&f.user, &mut state, "New title").await;
        f.engine.step(&f.user, &mut state, "done").await;

        f.tracker.render(&f.user, &mut state, 2, 5).await.unwrap();
        f.engine.step(&f.user, &mut state, "New title").await;
        let outcome = f.engine.step(&f.user, &mut state, "done").await;

        assert!(outcome.finished);
        assert_eq!(
            f.backend.mutations(),
            vec![BackendCall::Update {
                id: TaskId::from("task-7"),
                title: "New title".to_string(),
                status: "done".to_string(),
                owner: f.user.clone(),
            }]
        );
    }

    #[tokio::test]
    async fn test_update_backend_failure_terminates_without_retry() {
        let f = fixture(3);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();
        f.backend.fail_mutations(true);
        f.engine.begin_update(&mut state, 1);

        f.engine.step(&f.user, &mut state, "New title").await;
        let outcome = f.engine.step(&f.user, &mut state, "done").await;

        assert!(outcome.finished);
        assert!(outcome.messages[0].contains("Failed to update task #1"));
        assert!(state.conversation.is_none());
        assert_eq!(f.backend.mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_update_without_render_is_state_not_found() {
        let f = fixture(3);
        let mut state = f.store.lock(&f.user).await;

        let outcome = f.engine.begin_update(&mut state, 1);

        assert!(outcome.finished);
        assert_eq!(outcome.messages, vec![LIST_FIRST_TEXT.to_string()]);
        assert!(state.conversation.is_none());
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_state_lost_mid_conversation_aborts_without_counting() {
        let f = fixture(3);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();
        f.engine.begin_update(&mut state, 1);
        f.engine.step(&f.user, &mut state, "New title").await;

        state.pagination = None;
        let outcome = f.engine.step(&f.user, &mut state, "done").await;

        assert!(outcome.finished);
        assert_eq!(outcome.messages, vec![LIST_FIRST_TEXT.to_string()]);
        assert!(f.backend.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_confirmed() {
        let f = fixture(3);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();
        f.engine.begin_delete(&mut state, 2);

        let outcome = f.engine.step(&f.user, &mut state, "YES").await;

        assert!(outcome.finished);
        assert_eq!(
            f.backend.mutations(),
            vec![BackendCall::Delete {
                id: TaskId::from("task-2"),
                owner: f.user.clone(),
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_answer_no_cancels() {
        let f = fixture(3);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();
        f.engine.begin_delete(&mut state, 2);

        let outcome = f.engine.step(&f.user, &mut state, "no").await;

        assert!(outcome.finished);
        assert_eq!(outcome.messages, vec!["Deletion cancelled.".to_string()]);
        assert!(state.conversation.is_none());
        assert!(f.backend.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_retry_stays_at_confirmation() {
        let f = fixture(3);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();
        f.engine.begin_delete(&mut state, 9);

        for attempt in 1..=2 {
            let outcome = f.engine.step(&f.user, &mut state, "yes").await;
            assert!(!outcome.finished);
            let conversation = state.conversation.as_ref().unwrap();
            assert_eq!(conversation.step, ConversationStep::AwaitConfirmation);
            assert_eq!(conversation.invalid_attempts, attempt);
        }

        let outcome = f.engine.step(&f.user, &mut state, "yes").await;
        assert!(outcome.finished);
        assert!(state.conversation.is_none());
        assert!(f.backend.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_new_action_overwrites_stale_conversation() {
        let f = fixture(3);
        let mut state = f.store.lock(&f.user).await;
        f.tracker.render(&f.user, &mut state, 1, 5).await.unwrap();

        f.engine.begin_create(&mut state);
        f.engine.step(&f.user, &mut state, "Half-finished").await;
        f.engine.begin_delete(&mut state, 1);

        let conversation = state.conversation.as_ref().unwrap();
        assert_eq!(conversation.action, TaskAction::Delete);
        assert_eq!(conversation.pending_title, None);
    }

    #[tokio::test]
    async fn test_cancel() {
        let f = fixture(0);
        let mut state = f.store.lock(&f.user).await;
        f.engine.begin_create(&mut state);

        assert!(f.engine.cancel(&mut state));
        assert!(!f.engine.cancel(&mut state));
    }
}
