//! Per-user pagination tracking.
//!
//! Users refer to tasks by the friendly number shown next to them in the
//! list, never by backend id. Each render replaces the user's mapping from
//! those display numbers to tasks, so a number is only meaningful relative to
//! the page the user is currently looking at.

use std::collections::BTreeMap;
use std::sync::Arc;

use janbot_models::{TaskId, TaskPage, TaskStatus, UserId};
use tracing::{debug, warn};

use crate::backend::TaskBackend;
use crate::config::{MAX_PAGE, MAX_PAGE_SIZE};
use crate::error::{CoreError, Result};
use crate::store::UserState;

/// A task as it appeared in the most recent render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTask {
    /// Backend identifier.
    pub id: TaskId,
    /// Title shown to the user.
    pub title: String,
    /// Status shown to the user.
    pub status: TaskStatus,
}

/// The last list render for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState {
    /// Page number of the last render (1-based).
    pub current_page: u32,
    /// Page size of the last render.
    pub page_size: u32,
    display_index: BTreeMap<u32, RenderedTask>,
}

impl PaginationState {
    /// Looks up a display number from the last render.
    pub fn get(&self, display_number: u32) -> Option<&RenderedTask> {
        self.display_index.get(&display_number)
    }

    /// Display numbers of the last render, ascending.
    pub fn display_numbers(&self) -> Vec<u32> {
        self.display_index.keys().copied().collect()
    }

    /// Number of tasks in the last render.
    pub fn len(&self) -> usize {
        self.display_index.len()
    }

    /// Returns true if the last render was empty.
    pub fn is_empty(&self) -> bool {
        self.display_index.is_empty()
    }
}

/// Display number of the task in `row` (0-based) of `page` (1-based).
///
/// Numbers continue across pages, so page 2 of size 5 starts at 6. Callers
/// pass a page accepted by [`validate_page`] and `row < page_size`.
pub fn display_number(row: usize, page: u32, page_size: u32) -> u32 {
    row as u32 + 1 + (page - 1) * page_size
}

/// Validates a requested page and page size.
pub fn validate_page(page: u32, page_size: u32) -> Result<()> {
    if page == 0 {
        return Err(CoreError::InputInvalid("page numbers start at 1".to_string()));
    }
    if page > MAX_PAGE {
        return Err(CoreError::InputInvalid(format!(
            "page numbers go up to {}",
            MAX_PAGE
        )));
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(CoreError::InputInvalid(format!(
            "page size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(())
}

/// Fetches task pages and keeps each user's display mapping current.
#[derive(Clone)]
pub struct PaginationTracker {
    backend: Arc<dyn TaskBackend>,
}

impl PaginationTracker {
    /// Creates a tracker that fetches pages from `backend`.
    pub fn new(backend: Arc<dyn TaskBackend>) -> Self {
        Self { backend }
    }

    /// Fetches `page` for `user` and rebuilds the user's display mapping.
    ///
    /// On success the mapping is replaced wholesale, even when the page is
    /// empty. On failure `state` is left untouched. Rows beyond `page_size`
    /// are dropped so numbering never spills into the next page's range.
    pub async fn render(
        &self,
        user: &UserId,
        state: &mut UserState,
        page: u32,
        page_size: u32,
    ) -> Result<TaskPage> {
        validate_page(page, page_size)?;

        let mut task_page = match self.backend.list_page(user, page, page_size).await {
            Ok(task_page) => task_page,
            Err(e) => {
                warn!(user = %user, page, error = %e, "Failed to fetch task page");
                return Err(e);
            }
        };
        task_page.tasks.truncate(page_size as usize);

        let display_index = task_page
            .tasks
            .iter()
            .enumerate()
            .map(|(row, task)| {
                (
                    display_number(row, page, page_size),
                    RenderedTask {
                        id: task.id.clone(),
                        title: task.title.clone(),
                        status: task.status.clone(),
                    },
                )
            })
            .collect();

        state.pagination = Some(PaginationState {
            current_page: page,
            page_size,
            display_index,
        });

        debug!(user = %user, page, rows = task_page.tasks.len(), "Rendered task page");
        Ok(task_page)
    }

    /// Resolves a display number against the user's last render.
    pub fn resolve(state: &UserState, display_number: u32) -> Result<&RenderedTask> {
        let pagination = state.pagination.as_ref().ok_or(CoreError::StateNotFound)?;
        pagination
            .get(display_number)
            .ok_or(CoreError::ResolutionNotFound(display_number))
    }
}
