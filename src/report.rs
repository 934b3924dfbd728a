use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::kanban_board::{Board, DONE_COLUMN};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCount {
    pub column: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueTask {
    pub column: String,
    pub title: String,
    pub due: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub total: usize,
    pub per_column: Vec<ColumnCount>,
    pub done: usize,
    /// Whole-number completion percentage, rounded half up.
    pub percent: u32,
    pub overdue: Vec<OverdueTask>,
}

impl Report {
    pub fn remaining(&self) -> usize {
        self.total - self.done
    }
}

/// Summarises `board` as of the calendar day `today`.
pub fn report(board: &Board, today: NaiveDate) -> Report {
    let per_column: Vec<ColumnCount> = board
        .columns()
        .iter()
        .map(|c| ColumnCount {
            column: c.name.clone(),
            count: c.tasks.len(),
        })
        .collect();
    let total = per_column.iter().map(|c| c.count).sum();
    let done = board.column(DONE_COLUMN).map_or(0, |c| c.tasks.len());

    let overdue = board
        .columns()
        .iter()
        .flat_map(|c| c.tasks.iter().map(move |t| (c, t)))
        .filter_map(|(c, t)| {
            let due = t.due_date()?;
            (due < today).then(|| OverdueTask {
                column: c.name.clone(),
                title: t.title.clone(),
                due,
            })
        })
        .collect();

    Report {
        total,
        per_column,
        done,
        percent: completion_percent(done, total),
        overdue,
    }
}

pub fn report_today(board: &Board) -> Report {
    report(board, Local::now().date_naive())
}

fn completion_percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((done * 200 + total) / (total * 2)) as u32
}
