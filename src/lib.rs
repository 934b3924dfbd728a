//! Kanban board model: columns of tasks mirrored to key-value storage on
//! every change, with imports, exports and a completion report.

pub mod config;
pub mod error;
pub mod export;
pub mod kanban_board;
pub mod normalize;
pub mod report;
pub mod storage;
pub mod task;

pub use error::{BoardError, ErrorKind};
pub use kanban_board::{Board, BoardStore, Column, DONE_COLUMN, MAX_COLUMNS};
pub use report::{report, report_today, Report};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use task::{Task, TaskPatch};
