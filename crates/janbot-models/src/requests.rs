//! Request bodies and query strings for the todo backend.
//!
//! Field names follow the backend's wire format exactly, which mixes
//! capitalized body keys with snake_case query parameters.

use serde::Serialize;

/// Body of `POST /task/create`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTaskRequest {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Discordid")]
    pub owner_id: String,
}

/// Body of `PUT /task/edit/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateTaskRequest {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "DiscordID")]
    pub owner_id: String,
}

/// Query of `GET /task/user`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListTasksQuery {
    pub discord_id: String,
    pub page: u32,
    pub limit: u32,
}

/// Query of `DELETE /task/delete/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteTaskQuery {
    pub discord_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_body_keys() {
        let body = CreateTaskRequest {
            title: "Buy milk".to_string(),
            status: "backlog".to_string(),
            owner_id: "42".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Title": "Buy milk", "Status": "backlog", "Discordid": "42"})
        );
    }

    #[test]
    fn test_update_body_keys() {
        let body = UpdateTaskRequest {
            title: "Buy oat milk".to_string(),
            status: "done".to_string(),
            owner_id: "42".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["DiscordID"], "42");
        assert_eq!(json["Title"], "Buy oat milk");
    }
}
