//! Upgrades persisted or imported board data into the current shape.
//!
//! Two historical layouts exist:
//! - `Legacy`: only the column → entries mapping was stored; column order is
//!   the mapping's key order, entries are bare titles or `{name, due, assignee}`.
//! - `Current`: an explicit `columns` array next to the `tasks` mapping;
//!   entries are bare titles or `{id?, title?, due?, assignee?}` records.
//!
//! Both migrate through the same entry rules. Existing ids are kept unless
//! missing or already used, titles are backfilled as-is (creation-time
//! validation does not apply here), and task lists whose key is missing from
//! the column order are adopted at the end of it.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::error::BoardError;
use crate::kanban_board::{Board, Column, MAX_COLUMNS};
use crate::task::{new_task_id, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaShape {
    Legacy,
    Current,
}

#[derive(Debug)]
enum StoredBoard {
    Legacy {
        tasks: Map<String, Value>,
    },
    Current {
        columns: Vec<Value>,
        tasks: Map<String, Value>,
    },
}

impl StoredBoard {
    fn shape(&self) -> SchemaShape {
        match self {
            StoredBoard::Legacy { .. } => SchemaShape::Legacy,
            StoredBoard::Current { .. } => SchemaShape::Current,
        }
    }

    fn migrate(self) -> Result<Board, BoardError> {
        let shape = self.shape();
        let board = match self {
            StoredBoard::Legacy { tasks } => {
                let order = tasks.keys().cloned().collect();
                build_board(order, tasks)?
            }
            StoredBoard::Current { columns, tasks } => {
                let order = column_order(columns)?;
                build_board(order, tasks)?
            }
        };
        log::debug!(
            "[taskurai.normalize] migrated {:?} board: {} columns, {} tasks",
            shape,
            board.columns().len(),
            board.task_count()
        );
        Ok(board)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaskEntry {
    Title(String),
    Record(TaskRecord),
}

#[derive(Debug, Default, Deserialize)]
struct TaskRecord {
    #[serde(default)]
    id: Option<RecordId>,
    #[serde(default)]
    title: Option<String>,
    /// Legacy spelling of `title`.
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    assignee: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordId {
    Text(String),
    Number(Number),
}

impl RecordId {
    fn into_string(self) -> String {
        match self {
            RecordId::Text(s) => s,
            RecordId::Number(n) => n.to_string(),
        }
    }
}

fn invalid(reason: impl Into<String>) -> BoardError {
    BoardError::InvalidImportFormat(reason.into())
}

/// Parses an import file. Only the current `{columns, tasks}` layout is accepted.
pub fn import_json(text: &str) -> Result<Board, BoardError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| invalid(format!("not valid JSON: {e}")))?;
    let Value::Object(mut root) = value else {
        return Err(invalid("top level must be an object"));
    };
    let columns = match root.remove("columns") {
        Some(Value::Array(columns)) => columns,
        _ => return Err(invalid("`columns` must be an array")),
    };
    let tasks = match root.remove("tasks") {
        Some(Value::Object(tasks)) => tasks,
        _ => return Err(invalid("`tasks` must be an object")),
    };
    StoredBoard::Current { columns, tasks }.migrate()
}

/// Rebuilds the board from the two stored values. A missing `columns` value
/// marks the legacy layout.
pub fn load_persisted(columns: Option<&str>, tasks: Option<&str>) -> Result<Board, BoardError> {
    let tasks = match tasks {
        Some(text) => match serde_json::from_str(text) {
            Ok(Value::Object(tasks)) => tasks,
            Ok(_) => return Err(invalid("stored tasks must be an object")),
            Err(e) => return Err(invalid(format!("stored tasks are not valid JSON: {e}"))),
        },
        None => Map::new(),
    };
    let stored = match columns {
        Some(text) => match serde_json::from_str(text) {
            Ok(Value::Array(columns)) => StoredBoard::Current { columns, tasks },
            Ok(_) => return Err(invalid("stored columns must be an array")),
            Err(e) => return Err(invalid(format!("stored columns are not valid JSON: {e}"))),
        },
        None => StoredBoard::Legacy { tasks },
    };
    stored.migrate()
}

fn column_order(columns: Vec<Value>) -> Result<Vec<String>, BoardError> {
    let mut order: Vec<String> = Vec::with_capacity(columns.len());
    for value in columns {
        let Value::String(name) = value else {
            return Err(invalid("column names must be strings"));
        };
        if order.contains(&name) {
            log::warn!("[taskurai.normalize] dropping repeated column name {:?}", name);
            continue;
        }
        order.push(name);
    }
    Ok(order)
}

fn build_board(mut order: Vec<String>, mut tasks: Map<String, Value>) -> Result<Board, BoardError> {
    for key in tasks.keys() {
        if !order.contains(key) {
            log::warn!("[taskurai.normalize] adopting column {:?} missing from column order", key);
            order.push(key.clone());
        }
    }
    if order.is_empty() {
        return Err(invalid("board has no columns"));
    }
    if order.len() > MAX_COLUMNS {
        return Err(invalid(format!(
            "board has {} columns, at most {} are allowed",
            order.len(),
            MAX_COLUMNS
        )));
    }
    if order.iter().any(|name| name.trim().is_empty()) {
        return Err(invalid("column names must not be empty"));
    }

    let mut seen_ids = HashSet::new();
    let mut columns = Vec::with_capacity(order.len());
    for name in order {
        let entries = match tasks.remove(&name) {
            None => Vec::new(),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(invalid(format!("tasks of column {name:?} must be an array"))),
        };
        let mut column = Column::new(name);
        for entry in entries {
            let entry: TaskEntry = serde_json::from_value(entry).map_err(|_| {
                invalid(format!(
                    "tasks of column {:?} must be titles or task records",
                    column.name
                ))
            })?;
            column.tasks.push(normalize_entry(entry, &mut seen_ids));
        }
        columns.push(column);
    }
    Ok(Board::from_columns(columns))
}

fn normalize_entry(entry: TaskEntry, seen_ids: &mut HashSet<String>) -> Task {
    let record = match entry {
        TaskEntry::Title(title) => TaskRecord {
            title: Some(title),
            ..TaskRecord::default()
        },
        TaskEntry::Record(record) => record,
    };

    let id = match record
        .id
        .map(RecordId::into_string)
        .filter(|id| !id.trim().is_empty())
    {
        Some(id) if !seen_ids.contains(&id) => id,
        Some(id) => {
            log::warn!("[taskurai.normalize] task id {} is not unique, assigning a new one", id);
            fresh_id(seen_ids)
        }
        None => fresh_id(seen_ids),
    };
    seen_ids.insert(id.clone());

    Task {
        id,
        title: record.title.or(record.name).unwrap_or_default(),
        due: non_blank(record.due),
        assignee: non_blank(record.assignee),
    }
}

fn fresh_id(seen_ids: &HashSet<String>) -> String {
    loop {
        let id = new_task_id();
        if !seen_ids.contains(&id) {
            return id;
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(board: &Board, column: &str) -> Vec<String> {
        board
            .column(column)
            .unwrap()
            .tasks
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }

    #[test]
    fn test_bare_string_tasks() {
        let board = load_persisted(
            Some(r#"["To Do","Done"]"#),
            Some(r#"{"To Do":["Write docs","Ship v1"],"Done":[]}"#),
        )
        .unwrap();

        let tasks = &board.column("To Do").unwrap().tasks;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Write docs");
        assert_eq!(tasks[1].title, "Ship v1");
        assert!(tasks.iter().all(|t| t.due.is_none() && !t.id.is_empty()));
        assert_ne!(tasks[0].id, tasks[1].id);
    }

    #[test]
    fn test_legacy_layout_without_column_order() {
        let board = load_persisted(
            None,
            Some(
                r#"{"Backlog":[{"name":"Plan","due":"2024-06-01","assignee":"kim"}],
                    "In Progress":[],
                    "Done":[{"name":"Setup","due":"","assignee":""}]}"#,
            ),
        )
        .unwrap();

        assert_eq!(board.column_names(), vec!["Backlog", "In Progress", "Done"]);
        let plan = &board.column("Backlog").unwrap().tasks[0];
        assert_eq!(plan.title, "Plan");
        assert_eq!(plan.due.as_deref(), Some("2024-06-01"));
        assert_eq!(plan.assignee.as_deref(), Some("kim"));

        let setup = &board.column("Done").unwrap().tasks[0];
        assert_eq!(setup.due, None);
        assert_eq!(setup.assignee, None);
    }

    #[test]
    fn test_records_keep_ids_and_backfill() {
        let board = import_json(
            r#"{"columns":["A"],"tasks":{"A":[
                {"id":"keep-me","title":"One","due":"2025-02-02"},
                {"title":"Two"},
                {"id":7},
                {"due":"someday"}
            ]}}"#,
        )
        .unwrap();

        let tasks = &board.column("A").unwrap().tasks;
        assert_eq!(tasks[0].id, "keep-me");
        assert_eq!(tasks[0].due.as_deref(), Some("2025-02-02"));
        assert!(!tasks[1].id.is_empty());
        assert_eq!(tasks[2].id, "7");
        assert_eq!(tasks[2].title, "");
        assert_eq!(tasks[3].due.as_deref(), Some("someday"));
        assert_eq!(tasks[3].due_date(), None);
    }

    #[test]
    fn test_duplicate_ids_are_reassigned() {
        let board = import_json(
            r#"{"columns":["A","B"],"tasks":{"A":[{"id":"x","title":"first"}],"B":[{"id":"x","title":"second"}]}}"#,
        )
        .unwrap();
        assert_eq!(board.column("A").unwrap().tasks[0].id, "x");
        assert_ne!(board.column("B").unwrap().tasks[0].id, "x");
    }

    #[test]
    fn test_orphan_columns_are_adopted() {
        let board = import_json(r#"{"columns":["A"],"tasks":{"A":[],"Extra":["kept"]}}"#).unwrap();
        assert_eq!(board.column_names(), vec!["A", "Extra"]);
        assert_eq!(titles(&board, "Extra"), vec!["kept"]);
    }

    #[test]
    fn test_declared_columns_without_tasks_are_empty() {
        let board = import_json(r#"{"columns":["A","B","A"],"tasks":{}}"#).unwrap();
        assert_eq!(board.column_names(), vec!["A", "B"]);
        assert!(board.column("B").unwrap().tasks.is_empty());
    }

    #[test]
    fn test_malformed_imports_are_rejected() {
        let cases = [
            "not json",
            "[]",
            r#"{"tasks":{}}"#,
            r#"{"columns":"A","tasks":{}}"#,
            r#"{"columns":["A"],"tasks":[]}"#,
            r#"{"columns":["A"],"tasks":{"A":"not-an-array"}}"#,
            r#"{"columns":["A"],"tasks":{"A":[42]}}"#,
            r#"{"columns":[1],"tasks":{}}"#,
            r#"{"columns":[],"tasks":{}}"#,
            r#"{"columns":[""],"tasks":{}}"#,
            r#"{"columns":["1","2","3","4","5","6"],"tasks":{}}"#,
        ];
        for case in cases {
            assert!(
                matches!(import_json(case), Err(BoardError::InvalidImportFormat(_))),
                "accepted {case}"
            );
        }
    }

    #[test]
    fn test_orphans_count_towards_cap() {
        let result = import_json(
            r#"{"columns":["1","2","3","4","5"],"tasks":{"6":[]}}"#,
        );
        assert!(matches!(result, Err(BoardError::InvalidImportFormat(_))));
    }

    #[test]
    fn test_corrupt_persisted_values() {
        assert!(load_persisted(Some("{}"), Some("{}")).is_err());
        assert!(load_persisted(Some(r#"["A"]"#), Some("[]")).is_err());
        assert!(load_persisted(Some(r#"["A"]"#), Some("{")).is_err());
        assert!(load_persisted(None, Some("{}")).is_err());
    }

    #[test]
    fn test_columns_only_persisted() {
        let board = load_persisted(Some(r#"["A","B"]"#), None).unwrap();
        assert_eq!(board.column_names(), vec!["A", "B"]);
        assert_eq!(board.task_count(), 0);
    }
}
