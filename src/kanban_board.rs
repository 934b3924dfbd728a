use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::error::BoardError;
use crate::normalize;
use crate::storage::{KeyValueStore, StorageError, COLUMNS_KEY, TASKS_KEY};
use crate::task::{new_task_id, parse_due, validate_title, Task, TaskPatch};

/// Upper bound on the number of columns a board may hold.
pub const MAX_COLUMNS: usize = 5;
/// Column counted as the completion bucket by the report.
pub const DONE_COLUMN: &str = "Done";
/// Columns of a fresh board, and of the fallback when stored data is unreadable.
pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "Doing", "Done"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Front of the list is the top of the column.
    pub tasks: Vec<Task>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }
}

/// Columns and their tasks. Holding both in one ordered vector keeps column
/// order and the name → tasks mapping from drifting apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    columns: Vec<Column>,
}

impl Board {
    pub fn default_board() -> Self {
        Self {
            columns: DEFAULT_COLUMNS.iter().map(|name| Column::new(*name)).collect(),
        }
    }

    /// Callers uphold the board invariants (unique names, unique ids, column cap).
    pub(crate) fn from_columns(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut Column, BoardError> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| BoardError::UnknownColumn(name.to_string()))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    pub fn contains_task_id(&self, id: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.tasks.iter().any(|t| t.id == id))
    }

    fn fresh_task_id(&self) -> String {
        loop {
            let id = new_task_id();
            if !self.contains_task_id(&id) {
                return id;
            }
        }
    }

    /// The column → tasks mapping in column order, as persisted under `tasks`.
    pub fn task_map(&self) -> TaskMap<'_> {
        TaskMap(&self.columns)
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Board", 2)?;
        state.serialize_field("columns", &self.column_names())?;
        state.serialize_field("tasks", &self.task_map())?;
        state.end()
    }
}

pub struct TaskMap<'a>(&'a [Column]);

impl Serialize for TaskMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for column in self.0 {
            map.serialize_entry(&column.name, &column.tasks)?;
        }
        map.end()
    }
}

/// Owns the board and its storage. Every mutation goes through here, is
/// applied to a staged copy, written through to storage, and only then
/// becomes visible to `snapshot`.
///
/// Methods take `&mut self`; a concurrent host must keep the store behind a
/// single exclusive lock.
pub struct BoardStore<S: KeyValueStore> {
    board: Board,
    store: S,
}

impl<S: KeyValueStore> BoardStore<S> {
    /// Loads the board once from `store`. Unreadable data falls back to the
    /// default board; only I/O failures are errors.
    pub fn open(store: S) -> Result<Self, BoardError> {
        let columns = store.get(COLUMNS_KEY)?;
        let tasks = store.get(TASKS_KEY)?;

        let board = if columns.is_none() && tasks.is_none() {
            log::info!("[taskurai.store] no saved board, starting with defaults");
            Board::default_board()
        } else {
            match normalize::load_persisted(columns.as_deref(), tasks.as_deref()) {
                Ok(board) => {
                    log::info!(
                        "[taskurai.store] loaded board with {} columns and {} tasks",
                        board.columns().len(),
                        board.task_count()
                    );
                    board
                }
                Err(err) => {
                    log::warn!("[taskurai.store] saved board unreadable, using defaults: {}", err);
                    Board::default_board()
                }
            }
        };

        Ok(Self { board, store })
    }

    pub fn snapshot(&self) -> &Board {
        &self.board
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn add_column(&mut self, name: &str) -> Result<Column, BoardError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::InvalidColumnName);
        }
        self.commit("add_column", |board| {
            if board.columns.len() >= MAX_COLUMNS {
                return Err(BoardError::CapacityExceeded { max: MAX_COLUMNS });
            }
            if board.column(name).is_some() {
                return Err(BoardError::DuplicateColumn(name.to_string()));
            }
            let column = Column::new(name);
            board.columns.push(column.clone());
            Ok(column)
        })
    }

    /// Appends a new task to the end of `column`. `due` is user text; blank means none.
    pub fn add_task(
        &mut self,
        column: &str,
        title: &str,
        due: Option<&str>,
    ) -> Result<Task, BoardError> {
        let title = validate_title(title)?;
        let due = match due {
            Some(text) => parse_due(text)?,
            None => None,
        };
        self.commit("add_task", |board| {
            let id = board.fresh_task_id();
            let target = board.column_mut(column)?;
            let task = Task {
                id,
                title,
                due,
                assignee: None,
            };
            target.tasks.push(task.clone());
            Ok(task)
        })
    }

    pub fn delete_task(&mut self, column: &str, task_id: &str) -> Result<Task, BoardError> {
        self.commit("delete_task", |board| {
            let target = board.column_mut(column)?;
            let index = position_of(target, task_id)?;
            Ok(target.tasks.remove(index))
        })
    }

    pub fn update_task(
        &mut self,
        column: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Task, BoardError> {
        let title = patch.title.as_deref().map(validate_title).transpose()?;
        let due = match patch.due {
            Some(Some(text)) => Some(parse_due(&text)?),
            Some(None) => Some(None),
            None => None,
        };
        let assignee = patch
            .assignee
            .map(|a| a.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()));

        self.commit("update_task", |board| {
            let target = board.column_mut(column)?;
            let index = position_of(target, task_id)?;
            let task = &mut target.tasks[index];
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(due) = due {
                task.due = due;
            }
            if let Some(assignee) = assignee {
                task.assignee = assignee;
            }
            Ok(task.clone())
        })
    }

    /// Takes the task at `from_index` out of `from_column` and appends it to
    /// `to_column`. A drop onto the source column moves the task to its end.
    pub fn move_task(
        &mut self,
        from_column: &str,
        from_index: usize,
        to_column: &str,
    ) -> Result<Task, BoardError> {
        self.commit("move_task", |board| {
            if board.column(to_column).is_none() {
                return Err(BoardError::UnknownColumn(to_column.to_string()));
            }
            let source = board.column_mut(from_column)?;
            if from_index >= source.tasks.len() {
                return Err(BoardError::StaleMoveReference {
                    column: from_column.to_string(),
                    index: from_index,
                });
            }
            let task = source.tasks.remove(from_index);
            board.column_mut(to_column)?.tasks.push(task.clone());
            Ok(task)
        })
    }

    /// Replaces the whole board with the contents of an import file.
    /// On any error the current board stays authoritative.
    pub fn import_json(&mut self, text: &str) -> Result<(), BoardError> {
        let imported = normalize::import_json(text)?;
        persist(&mut self.store, &self.board, &imported)?;
        log::info!(
            "[taskurai.store] imported board with {} columns and {} tasks",
            imported.columns().len(),
            imported.task_count()
        );
        self.board = imported;
        Ok(())
    }

    fn commit<T>(
        &mut self,
        op: &str,
        mutate: impl FnOnce(&mut Board) -> Result<T, BoardError>,
    ) -> Result<T, BoardError> {
        let mut staged = self.board.clone();
        let out = mutate(&mut staged)?;
        persist(&mut self.store, &self.board, &staged)?;
        self.board = staged;
        log::debug!("[taskurai.store] {} committed", op);
        Ok(out)
    }
}

fn position_of(column: &Column, task_id: &str) -> Result<usize, BoardError> {
    column
        .tasks
        .iter()
        .position(|t| t.id == task_id)
        .ok_or_else(|| BoardError::TaskNotFound {
            column: column.name.clone(),
            task_id: task_id.to_string(),
        })
}

/// Writes `tasks` before `columns`. When the `columns` write fails, the
/// `tasks` value of `previous` is written back so the stored pair keeps
/// describing the board that is still in memory.
fn persist<S: KeyValueStore>(store: &mut S, previous: &Board, next: &Board) -> Result<(), BoardError> {
    let tasks = serde_json::to_string(&next.task_map()).map_err(StorageError::from)?;
    let columns = serde_json::to_string(&next.column_names()).map_err(StorageError::from)?;
    store.set(TASKS_KEY, &tasks)?;
    if let Err(err) = store.set(COLUMNS_KEY, &columns) {
        match serde_json::to_string(&previous.task_map()) {
            Ok(restore) => {
                if let Err(restore_err) = store.set(TASKS_KEY, &restore) {
                    log::error!(
                        "[taskurai.store] could not restore tasks after failed write: {}",
                        restore_err
                    );
                }
            }
            Err(encode_err) => {
                log::error!("[taskurai.store] could not encode previous tasks: {}", encode_err)
            }
        }
        return Err(err.into());
    }
    Ok(())
}
