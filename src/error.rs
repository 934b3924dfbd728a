use thiserror::Error;

use crate::storage::StorageError;

/// Coarse classification used by the front end to decide how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    CapacityExceeded,
    Storage,
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Task title must not be empty")]
    InvalidTitle,

    #[error("Invalid due date {0:?}, expected YYYY-MM-DD")]
    InvalidDueDate(String),

    #[error("Column name must not be empty")]
    InvalidColumnName,

    #[error("Column {0:?} already exists")]
    DuplicateColumn(String),

    #[error("Unknown column {0:?}")]
    UnknownColumn(String),

    #[error("Task {task_id} not found in column {column:?}")]
    TaskNotFound { column: String, task_id: String },

    #[error("No task at position {index} in column {column:?}; the column changed since the move started")]
    StaleMoveReference { column: String, index: usize },

    #[error("Board already holds the maximum of {max} columns")]
    CapacityExceeded { max: usize },

    #[error("Invalid import format: {0}")]
    InvalidImportFormat(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoardError::InvalidTitle
            | BoardError::InvalidDueDate(_)
            | BoardError::InvalidColumnName
            | BoardError::DuplicateColumn(_)
            | BoardError::InvalidImportFormat(_) => ErrorKind::InvalidInput,
            BoardError::UnknownColumn(_)
            | BoardError::TaskNotFound { .. }
            | BoardError::StaleMoveReference { .. } => ErrorKind::NotFound,
            BoardError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            BoardError::Storage(_) => ErrorKind::Storage,
        }
    }
}
