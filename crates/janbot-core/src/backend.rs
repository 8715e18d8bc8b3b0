//! Client for the todo backend.
//!
//! The backend speaks JSON over HTTP. Successful responses carry the payload
//! directly while failures may arrive as `{"error": ...}` even with a 2xx
//! status, so every body is decoded through [`Envelope`] before use.

use std::time::Duration;

use async_trait::async_trait;
use janbot_models::{
    CreateTaskRequest, DeleteTaskQuery, ListTasksQuery, TaskId, TaskPage, UpdateTaskRequest,
    UserId,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

/// Task operations offered by the todo backend.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Creates a task owned by `owner`. Returns the backend's response body.
    async fn create(&self, title: &str, status: &str, owner: &UserId) -> Result<serde_json::Value>;

    /// Fetches one page of `owner`'s tasks.
    async fn list_page(&self, owner: &UserId, page: u32, limit: u32) -> Result<TaskPage>;

    /// Replaces the title and status of a task.
    async fn update(
        &self,
        id: &TaskId,
        title: &str,
        status: &str,
        owner: &UserId,
    ) -> Result<serde_json::Value>;

    /// Deletes a task.
    async fn delete(&self, id: &TaskId, owner: &UserId) -> Result<serde_json::Value>;
}

/// Response body of the backend: either an error object or the payload.
///
/// An `error` field that is `null` or blank does not mark a failure.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Failure {
        #[serde(deserialize_with = "present_error")]
        error: serde_json::Value,
    },
    Success(T),
}

fn present_error<'de, D>(deserializer: D) -> std::result::Result<serde_json::Value, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let error = serde_json::Value::deserialize(deserializer)?;
    match &error {
        serde_json::Value::Null => Err(serde::de::Error::custom("error is null")),
        serde_json::Value::String(s) if s.trim().is_empty() => {
            Err(serde::de::Error::custom("error is empty"))
        }
        _ => Ok(error),
    }
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T> {
        match self {
            Envelope::Success(payload) => Ok(payload),
            Envelope::Failure { error } => Err(CoreError::BackendError(error_text(&error))),
        }
    }
}

fn error_text(error: &serde_json::Value) -> String {
    match error.as_str() {
        Some(s) => s.to_string(),
        None => error.to_string(),
    }
}

/// HTTP implementation of [`TaskBackend`].
#[derive(Clone)]
pub struct HttpTaskBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTaskBackend {
    /// Creates a client for the backend at `base_url`; every request is
    /// bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and decodes the body.
    ///
    /// `allow_empty` turns an empty 2xx body into `None` instead of a
    /// decoding error.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        allow_empty: bool,
    ) -> Result<Option<T>> {
        let response = request
            .send()
            .await
            .map_err(CoreError::from_backend_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(CoreError::from_backend_transport)?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<Envelope<serde_json::Value>>(&body) {
                Ok(Envelope::Failure { error }) => error_text(&error),
                _ => body.trim().to_string(),
            };
            warn!(status = %status, detail = %detail, "Todo backend returned an error status");
            return Err(CoreError::BackendError(format!("{}: {}", status, detail)));
        }

        if body.trim().is_empty() {
            return if allow_empty {
                Ok(None)
            } else {
                Err(CoreError::BackendError("empty response body".to_string()))
            };
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| CoreError::BackendError(format!("unexpected response: {}", e)))?;
        envelope.into_result().map(Some)
    }

    async fn execute_mutation(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value> {
        Ok(self
            .execute::<serde_json::Value>(request, true)
            .await?
            .unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl TaskBackend for HttpTaskBackend {
    async fn create(&self, title: &str, status: &str, owner: &UserId) -> Result<serde_json::Value> {
        let body = CreateTaskRequest {
            title: title.to_string(),
            status: status.to_string(),
            owner_id: owner.to_string(),
        };
        debug!(user = %owner, title = %title, "Creating task");

        let request = self.client.post(self.url("/task/create")).json(&body);
        self.execute_mutation(request).await
    }

    async fn list_page(&self, owner: &UserId, page: u32, limit: u32) -> Result<TaskPage> {
        let query = ListTasksQuery {
            discord_id: owner.to_string(),
            page,
            limit,
        };
        debug!(user = %owner, page, limit, "Listing tasks");

        let request = self.client.get(self.url("/task/user")).query(&query);
        self.execute::<TaskPage>(request, false)
            .await?
            .ok_or_else(|| CoreError::BackendError("empty task page".to_string()))
    }

    async fn update(
        &self,
        id: &TaskId,
        title: &str,
        status: &str,
        owner: &UserId,
    ) -> Result<serde_json::Value> {
        let body = UpdateTaskRequest {
            title: title.to_string(),
            status: status.to_string(),
            owner_id: owner.to_string(),
        };
        debug!(user = %owner, task = %id, "Updating task");

        let request = self
            .client
            .put(self.url(&format!("/task/edit/{}", id)))
            .json(&body);
        self.execute_mutation(request).await
    }

    async fn delete(&self, id: &TaskId, owner: &UserId) -> Result<serde_json::Value> {
        let query = DeleteTaskQuery {
            discord_id: owner.to_string(),
        };
        debug!(user = %owner, task = %id, "Deleting task");

        let request = self
            .client
            .delete(self.url(&format!("/task/delete/{}", id)))
            .query(&query);
        self.execute_mutation(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_failure() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"error": "task not found"}"#).unwrap();
        let err = envelope.into_result().unwrap_err();
        assert!(matches!(err, CoreError::BackendError(ref m) if m == "task not found"));
    }

    #[test]
    fn test_envelope_success() {
        let envelope: Envelope<TaskPage> = serde_json::from_str(
            r#"{"tasks": [], "total": 0, "page": 1, "limit": 5, "total_pages": 0}"#,
        )
        .unwrap();
        assert!(envelope.into_result().unwrap().is_empty());
    }

    #[test]
    fn test_envelope_structured_error() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"error": {"code": 3}}"#).unwrap();
        let err = envelope.into_result().unwrap_err();
        assert!(matches!(err, CoreError::BackendError(ref m) if m.contains("code")));
    }

    #[test]
    fn test_envelope_null_or_empty_error_is_success() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"error": null, "message": "ok"}"#).unwrap();
        let payload = envelope.into_result().unwrap();
        assert_eq!(payload["message"], "ok");

        let envelope: Envelope<TaskPage> = serde_json::from_str(
            r#"{"error": "", "tasks": [], "total": 0, "page": 1, "limit": 5, "total_pages": 0}"#,
        )
        .unwrap();
        assert!(envelope.into_result().unwrap().is_empty());

        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"error": "  "}"#).unwrap();
        assert!(envelope.into_result().is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpTaskBackend::new("http://todo.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("/task/create"), "http://todo.local/task/create");
    }
}
