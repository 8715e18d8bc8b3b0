//! Identifier newtypes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a task as assigned by the todo backend.
///
/// The backend may encode ids as JSON numbers or strings; both deserialize
/// into the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a task id from its textual form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for TaskId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Self(n.to_string()),
            RawId::Text(s) => Self(s),
        })
    }
}

/// Identifier of a chat user, used as the key for all per-user state and
/// as the owner id sent to the todo backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id from its textual form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for UserId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_from_number_or_string() {
        let numeric: TaskId = serde_json::from_str("42").unwrap();
        let textual: TaskId = serde_json::from_str("\"6650f1c2\"").unwrap();

        assert_eq!(numeric.as_str(), "42");
        assert_eq!(textual.as_str(), "6650f1c2");
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId::from(12345_u64).to_string(), "12345");
        assert_eq!(UserId::from(-100_i64).as_str(), "-100");
    }
}
