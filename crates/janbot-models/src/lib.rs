//! Data models for JanBot.
//!
//! This crate provides the types exchanged with the todo backend and the
//! identifiers used to key per-user state.

pub mod ids;
pub mod requests;
pub mod task;

// Re-export main types
pub use ids::{TaskId, UserId};
pub use requests::{CreateTaskRequest, DeleteTaskQuery, ListTasksQuery, UpdateTaskRequest};
pub use task::{Task, TaskPage, TaskStatus};
