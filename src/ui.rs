use std::fs;
use std::io;
use std::path::PathBuf;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use taskurai::export::{self, ExportFormat};
use taskurai::{report_today, BoardError, BoardStore, ErrorKind, KeyValueStore, TaskPatch};

/// Source of line input for actions that need text (titles, dates, paths).
pub trait Prompt {
    fn ask(&mut self, message: &str) -> Option<String>;
}

/// Reads a line from stdin with raw mode temporarily lifted.
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, message: &str) -> Option<String> {
        disable_raw_mode().ok();
        println!("{}", message);
        let mut input = String::new();
        let read = io::stdin().read_line(&mut input);
        enable_raw_mode().ok();
        read.ok().map(|_| input.trim().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// A task picked up for a move: the gesture remembers where it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldTask {
    pub column: String,
    pub index: usize,
    pub task_id: String,
    pub title: String,
}

pub struct App<S: KeyValueStore> {
    pub store: BoardStore<S>,
    export_dir: PathBuf,
    pub selected_column: usize,
    pub selected_task: usize,
    pub held: Option<HeldTask>,
    pub show_report: bool,
    pub notice: Option<Notice>,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(store: BoardStore<S>, export_dir: PathBuf) -> Self {
        Self {
            store,
            export_dir,
            selected_column: 0,
            selected_task: 0,
            held: None,
            show_report: false,
            notice: None,
        }
    }

    fn column_name(&self) -> Option<String> {
        self.store
            .snapshot()
            .columns()
            .get(self.selected_column)
            .map(|c| c.name.clone())
    }

    fn column_len(&self) -> usize {
        self.store
            .snapshot()
            .columns()
            .get(self.selected_column)
            .map_or(0, |c| c.tasks.len())
    }

    fn selected_task_id(&self) -> Option<(String, String)> {
        let column = self.store.snapshot().columns().get(self.selected_column)?;
        let task = column.tasks.get(self.selected_task)?;
        Some((column.name.clone(), task.id.clone()))
    }

    fn clamp_selection(&mut self) {
        let columns = self.store.snapshot().columns().len();
        self.selected_column = self.selected_column.min(columns.saturating_sub(1));
        self.selected_task = self.selected_task.min(self.column_len().saturating_sub(1));
    }

    fn info(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice::Info(message.into()));
    }

    fn fail(&mut self, action: &str, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[taskurai.ui] {} failed: {}", action, message);
        self.notice = Some(Notice::Error(format!("{action} failed: {message}")));
    }

    fn report_result<T>(
        &mut self,
        action: &str,
        result: Result<T, BoardError>,
        done: impl FnOnce(T) -> String,
    ) {
        match result {
            Ok(value) => {
                let message = done(value);
                self.info(message);
            }
            Err(err) => {
                if err.kind() == ErrorKind::Storage {
                    log::error!("[taskurai.ui] {} could not be saved: {}", action, err);
                }
                self.fail(action, err.to_string());
            }
        }
        self.clamp_selection();
    }

    /// Applies one key press. Returns `true` when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode, prompt: &mut impl Prompt) -> bool {
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Left => {
                self.selected_column = self.selected_column.saturating_sub(1);
                self.clamp_selection();
            }
            KeyCode::Right => {
                self.selected_column += 1;
                self.clamp_selection();
            }
            KeyCode::Up => self.selected_task = self.selected_task.saturating_sub(1),
            KeyCode::Down => {
                self.selected_task += 1;
                self.clamp_selection();
            }
            KeyCode::Char('a') => self.add_task(prompt),
            KeyCode::Char('c') => self.add_column(prompt),
            KeyCode::Char('e') => self.edit_task(prompt, "Enter new title", TaskPatch::title),
            KeyCode::Char('u') => {
                self.edit_task(prompt, "Enter due date (YYYY-MM-DD, blank to clear)", |d| {
                    TaskPatch::due(Some(d))
                })
            }
            KeyCode::Char('n') => self.edit_task(prompt, "Enter assignee (blank to clear)", |a| {
                TaskPatch {
                    assignee: Some(Some(a)),
                    ..TaskPatch::default()
                }
            }),
            KeyCode::Char('d') => self.delete_task(),
            KeyCode::Char(' ') => self.pick_or_drop(),
            KeyCode::Esc => {
                if self.held.take().is_some() {
                    self.info("Move cancelled");
                }
            }
            KeyCode::Char('r') => self.show_report = !self.show_report,
            KeyCode::Char('x') => self.export_board(ExportFormat::Json),
            KeyCode::Char('v') => self.export_board(ExportFormat::Csv),
            KeyCode::Char('p') => self.export_board(ExportFormat::Pdf),
            KeyCode::Char('R') => self.export_report(ExportFormat::Csv),
            KeyCode::Char('P') => self.export_report(ExportFormat::Pdf),
            KeyCode::Char('J') => self.export_report(ExportFormat::Json),
            KeyCode::Char('i') => self.import(prompt),
            _ => {}
        }
        false
    }

    fn add_task(&mut self, prompt: &mut impl Prompt) {
        let Some(column) = self.column_name() else {
            return self.fail("Add task", "no column selected");
        };
        let Some(title) = prompt.ask("Enter task title") else {
            return;
        };
        let due = prompt.ask("Enter due date (YYYY-MM-DD, blank for none)");
        let result = self.store.add_task(&column, &title, due.as_deref());
        self.report_result("Add task", result, |t| format!("Added \"{}\" to {}", t.title, column));
    }

    fn add_column(&mut self, prompt: &mut impl Prompt) {
        let Some(name) = prompt.ask("Enter column name") else {
            return;
        };
        let result = self.store.add_column(&name);
        self.report_result("Add column", result, |c| format!("Added column {}", c.name));
    }

    fn edit_task(
        &mut self,
        prompt: &mut impl Prompt,
        message: &str,
        patch: impl FnOnce(String) -> TaskPatch,
    ) {
        let Some((column, id)) = self.selected_task_id() else {
            return self.fail("Edit task", "no task selected");
        };
        let Some(input) = prompt.ask(message) else {
            return;
        };
        let result = self.store.update_task(&column, &id, patch(input));
        self.report_result("Edit task", result, |t| format!("Updated \"{}\"", t.title));
    }

    fn delete_task(&mut self) {
        let Some((column, id)) = self.selected_task_id() else {
            return self.fail("Delete task", "no task selected");
        };
        let result = self.store.delete_task(&column, &id);
        self.report_result("Delete task", result, |t| format!("Deleted \"{}\"", t.title));
    }

    /// First press picks up the selected task, second press drops it on the
    /// selected column.
    fn pick_or_drop(&mut self) {
        match self.held.take() {
            None => {
                let index = self.selected_task;
                let picked = self
                    .store
                    .snapshot()
                    .columns()
                    .get(self.selected_column)
                    .and_then(|c| {
                        c.tasks.get(index).map(|t| HeldTask {
                            column: c.name.clone(),
                            index,
                            task_id: t.id.clone(),
                            title: t.title.clone(),
                        })
                    });
                let Some(held) = picked else {
                    return self.fail("Move task", "no task selected");
                };
                self.info(format!("Moving \"{}\", press space on the target column", held.title));
                self.held = Some(held);
            }
            Some(held) => {
                let Some(target) = self.column_name() else {
                    return self.fail("Move task", "no column selected");
                };
                let still_there = self
                    .store
                    .snapshot()
                    .column(&held.column)
                    .and_then(|c| c.tasks.get(held.index))
                    .is_some_and(|t| t.id == held.task_id);
                let result = if still_there {
                    self.store.move_task(&held.column, held.index, &target)
                } else {
                    Err(BoardError::StaleMoveReference {
                        column: held.column.clone(),
                        index: held.index,
                    })
                };
                self.report_result("Move task", result, |t| format!("Moved \"{}\" to {}", t.title, target));
            }
        }
    }

    fn export_board(&mut self, format: ExportFormat) {
        let board = self.store.snapshot();
        let bytes = match format {
            ExportFormat::Json => export::board_json(board).map(String::into_bytes),
            ExportFormat::Csv => export::board_csv(board).map(String::into_bytes),
            ExportFormat::Pdf => export::board_pdf(board),
        };
        self.write_export(format.board_file_name(), bytes);
    }

    fn export_report(&mut self, format: ExportFormat) {
        let report = report_today(self.store.snapshot());
        let bytes = match format {
            ExportFormat::Json => export::report_json(&report).map(String::into_bytes),
            ExportFormat::Csv => export::report_csv(&report).map(String::into_bytes),
            ExportFormat::Pdf => export::report_pdf(&report),
        };
        self.write_export(format.report_file_name(), bytes);
    }

    fn write_export(&mut self, file_name: &str, bytes: Result<Vec<u8>, export::ExportError>) {
        match bytes.and_then(|b| export::write_export(&self.export_dir, file_name, &b)) {
            Ok(path) => self.info(format!("Exported {}", path.display())),
            Err(err) => self.fail("Export", err.to_string()),
        }
    }

    fn import(&mut self, prompt: &mut impl Prompt) {
        let Some(path) = prompt.ask("Enter path of JSON file to import") else {
            return;
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => return self.fail("Import", format!("{path}: {err}")),
        };
        self.held = None;
        let result = self.store.import_json(&text);
        self.report_result("Import", result, |_| format!("Imported {path}"));
    }
}

pub fn run_app<B: Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if app.handle_key(key.code, &mut StdinPrompt) {
                return Ok(());
            }
        }
    }
}

fn draw<S: KeyValueStore>(f: &mut Frame, app: &App<S>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(f.area());

    let board_area = if app.show_report {
        let parts = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(rows[0]);
        draw_report(f, app, parts[1]);
        parts[0]
    } else {
        rows[0]
    };

    draw_columns(f, app, board_area);
    draw_status(f, app, rows[1]);
}

fn draw_columns<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let columns = app.store.snapshot().columns();
    if columns.is_empty() {
        return;
    }
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, columns.len() as u32); columns.len()])
        .split(area);

    for (i, column) in columns.iter().enumerate() {
        let items: Vec<ListItem> = column
            .tasks
            .iter()
            .map(|t| {
                let mut spans = vec![Span::styled(&t.title, Style::default().fg(Color::White))];
                if let Some(due) = &t.due {
                    spans.push(Span::raw(format!(" (Due: {})", due)));
                }
                if let Some(assignee) = &t.assignee {
                    spans.push(Span::styled(format!(" @{}", assignee), Style::default().fg(Color::Gray)));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let selected = app.selected_column == i;
        let title = format!("{} ({})", column.name, column.tasks.len());
        let list = List::new(items)
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(if selected {
                        Style::default().fg(Color::Cyan)
                    } else {
                        Style::default()
                    }),
            )
            .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));

        let mut state = ListState::default();
        if selected && !column.tasks.is_empty() {
            state.select(Some(app.selected_task));
        }
        f.render_stateful_widget(list, chunks[i], &mut state);
    }
}

fn draw_report<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let report = report_today(app.store.snapshot());
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let gauge = Gauge::default()
        .block(Block::default().title("Completion").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(report.percent.min(100) as u16);
    f.render_widget(gauge, parts[0]);

    let lines: Vec<Line> = export::report_lines(&report)
        .into_iter()
        .map(Line::from)
        .collect();
    let panel = Paragraph::new(lines).block(Block::default().title("Report").borders(Borders::ALL));
    f.render_widget(panel, parts[1]);
}

fn draw_status<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let line = match &app.notice {
        Some(Notice::Error(message)) => Line::from(Span::styled(message.as_str(), Style::default().fg(Color::Red))),
        Some(Notice::Info(message)) => Line::from(Span::styled(message.as_str(), Style::default().fg(Color::Green))),
        None => Line::from(
            "a add  c column  e edit  u due  n assignee  d delete  space move  r report  x/v/p export  R/P/J report  i import  q quit",
        ),
    };
    let status = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use taskurai::MemoryStore;
    use tempfile::TempDir;

    struct Scripted(VecDeque<String>);

    impl Prompt for Scripted {
        fn ask(&mut self, _message: &str) -> Option<String> {
            self.0.pop_front()
        }
    }

    fn app(dir: &TempDir) -> App<MemoryStore> {
        let store = BoardStore::open(MemoryStore::new()).unwrap();
        App::new(store, dir.path().to_path_buf())
    }

    fn press(app: &mut App<MemoryStore>, keys: &[KeyCode], answers: &[&str]) {
        let mut prompt = Scripted(answers.iter().map(|a| a.to_string()).collect());
        for key in keys {
            app.handle_key(*key, &mut prompt);
        }
    }

    #[test]
    fn test_add_and_move_with_keys() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, &[KeyCode::Char('a')], &["Write docs", ""]);
        press(
            &mut app,
            &[KeyCode::Char(' '), KeyCode::Right, KeyCode::Right, KeyCode::Char(' ')],
            &[],
        );

        let board = app.store.snapshot();
        assert!(board.column("To Do").unwrap().tasks.is_empty());
        assert_eq!(board.column("Done").unwrap().tasks[0].title, "Write docs");
        assert!(matches!(app.notice, Some(Notice::Info(_))));
    }

    #[test]
    fn test_failures_are_shown() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, &[KeyCode::Char('a')], &["Task", "not a date"]);
        assert!(matches!(&app.notice, Some(Notice::Error(m)) if m.contains("due date")));

        press(&mut app, &[KeyCode::Char('d')], &[]);
        assert!(matches!(&app.notice, Some(Notice::Error(m)) if m.contains("no task selected")));
    }

    #[test]
    fn test_stale_drop_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, &[KeyCode::Char('a')], &["a", ""]);
        press(&mut app, &[KeyCode::Char(' ')], &[]);

        let (column, id) = app.selected_task_id().unwrap();
        app.store.delete_task(&column, &id).unwrap();
        press(&mut app, &[KeyCode::Right, KeyCode::Char(' ')], &[]);

        assert!(matches!(&app.notice, Some(Notice::Error(m)) if m.contains("position 0")));
        assert_eq!(app.held, None);
    }

    #[test]
    fn test_drop_after_shift_does_not_move_neighbour() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        for title in ["a", "b", "c"] {
            press(&mut app, &[KeyCode::Char('a')], &[title, ""]);
        }
        press(&mut app, &[KeyCode::Down, KeyCode::Char(' ')], &[]);
        assert_eq!(app.held.as_ref().map(|h| h.title.as_str()), Some("b"));

        press(&mut app, &[KeyCode::Up, KeyCode::Char('d')], &[]);
        press(
            &mut app,
            &[KeyCode::Right, KeyCode::Right, KeyCode::Char(' ')],
            &[],
        );

        let board = app.store.snapshot();
        let todo: Vec<&str> = board
            .column("To Do")
            .unwrap()
            .tasks
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(todo, vec!["b", "c"]);
        assert!(board.column("Done").unwrap().tasks.is_empty());
        assert!(matches!(&app.notice, Some(Notice::Error(m)) if m.contains("position 1")));
        assert_eq!(app.held, None);
    }

    #[test]
    fn test_report_panel_renders_gauge() {
        use ratatui::backend::TestBackend;

        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, &[KeyCode::Char('a')], &["a", ""]);
        press(&mut app, &[KeyCode::Char(' '), KeyCode::Right, KeyCode::Right, KeyCode::Char(' ')], &[]);
        press(&mut app, &[KeyCode::Char('r')], &[]);

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        let rendered: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(rendered.contains("Completion"));
        assert!(rendered.contains("100%"));
    }

    #[test]
    fn test_exports_land_in_export_dir() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, &[KeyCode::Char('a')], &["a", "2030-01-01"]);
        press(
            &mut app,
            &[KeyCode::Char('x'), KeyCode::Char('v'), KeyCode::Char('R')],
            &[],
        );
        assert!(dir.path().join("board.json").exists());
        assert!(dir.path().join("board.csv").exists());
        let report = fs::read_to_string(dir.path().join("status-report.csv")).unwrap();
        assert!(report.contains("Total Tasks,1"));
    }

    #[test]
    fn test_import_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.json");
        fs::write(&path, r#"{"columns":["Backlog"],"tasks":{"Backlog":["Plan"]}}"#).unwrap();
        let path = path.display().to_string();

        let mut app = app(&dir);
        press(&mut app, &[KeyCode::Char('i')], &[path.as_str()]);
        assert_eq!(app.store.snapshot().column_names(), vec!["Backlog"]);

        press(&mut app, &[KeyCode::Char('i')], &["/nonexistent/file.json"]);
        assert!(matches!(app.notice, Some(Notice::Error(_))));
        assert_eq!(app.store.snapshot().column_names(), vec!["Backlog"]);
    }
}
