use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BoardError;

/// Calendar date format used for `due` on disk and in exports.
pub const DUE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// `YYYY-MM-DD`. Kept as text so imported data with a malformed date survives a load.
    pub due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl Task {
    pub fn new(title: impl Into<String>, due: Option<String>) -> Self {
        Self {
            id: new_task_id(),
            title: title.into(),
            due,
            assignee: None,
        }
    }

    /// The parsed due date, or `None` when absent or unparsable.
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), DUE_FORMAT).ok())
    }
}

pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// Field changes for `BoardStore::update_task`. `None` leaves a field alone;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due: Option<Option<String>>,
    pub assignee: Option<Option<String>>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn due(due: Option<String>) -> Self {
        Self {
            due: Some(due),
            ..Self::default()
        }
    }
}

/// Validates a user-entered title. Whitespace-only titles are rejected.
pub fn validate_title(title: &str) -> Result<String, BoardError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BoardError::InvalidTitle);
    }
    Ok(title.to_string())
}

/// Validates a user-entered due date. Blank input means "no deadline".
pub fn parse_due(input: &str) -> Result<Option<String>, BoardError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input, DUE_FORMAT)
        .map(|d| Some(d.format(DUE_FORMAT).to_string()))
        .map_err(|_| BoardError::InvalidDueDate(input.to_string()))
}
