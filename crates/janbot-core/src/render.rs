//! Task list rendering.
//!
//! Turns a page of tasks into the text shown in chat plus the previous/next
//! controls, refreshing the user's display mapping on the way.

use janbot_models::{TaskPage, TaskStatus, UserId};

use crate::config::MAX_PAGE;
use crate::error::Result;
use crate::pagination::{display_number, PaginationTracker};
use crate::store::UserState;

/// Control id prefix for the "previous page" button.
pub const PREV_CONTROL_PREFIX: &str = "todo_prev_";

/// Control id prefix for the "next page" button.
pub const NEXT_CONTROL_PREFIX: &str = "todo_next_";

/// Text shown instead of a list when the user has no tasks on the page.
pub const EMPTY_LIST_TEXT: &str = "📭 Your todo list is empty.\n\nUse /todo_create to add a task.";

/// Direction of a pagination control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Previous,
    Next,
}

/// A clickable control that renders another page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageControl {
    /// Which way the control moves.
    pub direction: PageDirection,
    /// Page rendered when the control is activated.
    pub page: u32,
}

impl PageControl {
    /// Control leading to `page` from the page after it.
    pub fn previous(page: u32) -> Self {
        Self {
            direction: PageDirection::Previous,
            page,
        }
    }

    /// Control leading to `page` from the page before it.
    pub fn next(page: u32) -> Self {
        Self {
            direction: PageDirection::Next,
            page,
        }
    }

    /// Identifier carried by the control (`todo_prev_{page}` / `todo_next_{page}`).
    pub fn id(&self) -> String {
        match self.direction {
            PageDirection::Previous => format!("{}{}", PREV_CONTROL_PREFIX, self.page),
            PageDirection::Next => format!("{}{}", NEXT_CONTROL_PREFIX, self.page),
        }
    }

    /// Button label.
    pub fn label(&self) -> &'static str {
        match self.direction {
            PageDirection::Previous => "⬅️ Previous",
            PageDirection::Next => "Next ➡️",
        }
    }

    /// Parses a control identifier. Returns `None` for foreign or malformed ids
    /// and for pages outside `1..=MAX_PAGE`.
    pub fn parse(id: &str) -> Option<Self> {
        let (direction, rest) = if let Some(rest) = id.strip_prefix(PREV_CONTROL_PREFIX) {
            (PageDirection::Previous, rest)
        } else if let Some(rest) = id.strip_prefix(NEXT_CONTROL_PREFIX) {
            (PageDirection::Next, rest)
        } else {
            return None;
        };

        let page: u32 = rest.parse().ok()?;
        (1..=MAX_PAGE).contains(&page).then_some(Self { direction, page })
    }
}

/// What gets shown for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPayload {
    /// Message text.
    pub text: String,
    /// Navigation controls, in display order.
    pub controls: Vec<PageControl>,
}

impl DisplayPayload {
    /// The "empty list" payload.
    pub fn empty() -> Self {
        Self {
            text: EMPTY_LIST_TEXT.to_string(),
            controls: Vec::new(),
        }
    }
}

/// Glyph shown in front of a task with the given status.
pub fn status_glyph(status: &TaskStatus) -> &'static str {
    match status {
        TaskStatus::Done => "✅",
        TaskStatus::InProgress => "🔄",
        TaskStatus::Backlog => "📋",
        TaskStatus::Other(_) => "❔",
    }
}

/// Formats a fetched page.
///
/// `page` and `page_size` are the values the page was requested with; they
/// determine the display numbers.
pub fn format_page(task_page: &TaskPage, page: u32, page_size: u32) -> DisplayPayload {
    if task_page.is_empty() {
        return DisplayPayload::empty();
    }

    let total_pages = if task_page.total_pages > 0 {
        task_page.total_pages
    } else {
        // Some backend versions omit total_pages.
        task_page.total.div_ceil(u64::from(page_size)).max(1) as u32
    };

    let mut text = String::from("📝 Your tasks\n\n");
    for (row, task) in task_page.tasks.iter().enumerate() {
        text.push_str(&format!(
            "{}. {} {} [{}]\n",
            display_number(row, page, page_size),
            status_glyph(&task.status),
            task.title,
            task.status
        ));
    }
    text.push_str(&format!(
        "\nPage {}/{} · {} task{} total",
        page,
        total_pages,
        task_page.total,
        if task_page.total == 1 { "" } else { "s" }
    ));

    let mut controls = Vec::new();
    if page > 1 {
        controls.push(PageControl::previous(page - 1));
    }
    if page < total_pages && page < MAX_PAGE {
        controls.push(PageControl::next(page + 1));
    }

    DisplayPayload { text, controls }
}

/// Renders task pages for users.
#[derive(Clone)]
pub struct ListRenderer {
    tracker: PaginationTracker,
}

impl ListRenderer {
    /// Creates a renderer on top of `tracker`.
    pub fn new(tracker: PaginationTracker) -> Self {
        Self { tracker }
    }

    /// Fetches and formats `page`, refreshing the user's display mapping.
    pub async fn render(
        &self,
        user: &UserId,
        state: &mut UserState,
        page: u32,
        page_size: u32,
    ) -> Result<DisplayPayload> {
        let task_page = self.tracker.render(user, state, page, page_size).await?;
        Ok(format_page(&task_page, page, page_size))
    }
}
