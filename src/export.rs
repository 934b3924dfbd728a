//! Board and report exports: JSON, CSV and PDF.
//!
//! All exports carry the same information; the PDF renderings are plain text
//! laid out line by line.

use std::fs;
use std::path::{Path, PathBuf};

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use thiserror::Error;

use crate::kanban_board::Board;
use crate::report::Report;

pub const REPORT_TITLE: &str = "Taskurai Status Report";
pub const BOARD_TITLE: &str = "Taskurai Board";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn board_file_name(self) -> &'static str {
        match self {
            ExportFormat::Json => "board.json",
            ExportFormat::Csv => "board.csv",
            ExportFormat::Pdf => "board.pdf",
        }
    }

    pub fn report_file_name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "status-report.csv",
            ExportFormat::Pdf => "status-report.pdf",
            ExportFormat::Json => "status-report.json",
        }
    }
}

pub fn board_json(board: &Board) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(board)?)
}

pub fn report_json(report: &Report) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One row per task: `Column,Title,Due`.
pub fn board_csv(board: &Board) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Column", "Title", "Due"])?;
    for column in board.columns() {
        for task in &column.tasks {
            writer.write_record([
                column.name.as_str(),
                task.title.as_str(),
                task.due.as_deref().unwrap_or(""),
            ])?;
        }
    }
    finish_csv(writer)
}

pub fn report_csv(report: &Report) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Metric", "Value"])?;
    for (metric, value) in report_rows(report) {
        writer.write_record([metric, value.to_string().as_str()])?;
    }
    finish_csv(writer)
}

fn report_rows(report: &Report) -> [(&'static str, usize); 4] {
    [
        ("Total Tasks", report.total),
        ("Done", report.done),
        ("Remaining", report.remaining()),
        ("Completion %", report.percent as usize),
    ]
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Text lines of the board rendering, shared by the PDF output.
pub fn board_lines(board: &Board) -> Vec<String> {
    let mut lines = Vec::new();
    for column in board.columns() {
        lines.push(format!("{} ({})", column.name, column.tasks.len()));
        for task in &column.tasks {
            match task.due.as_deref() {
                Some(due) => lines.push(format!("  - {} (Due: {})", task.title, due)),
                None => lines.push(format!("  - {}", task.title)),
            }
        }
        lines.push(String::new());
    }
    lines
}

pub fn report_lines(report: &Report) -> Vec<String> {
    let mut lines = vec![
        format!("Total Tasks: {}", report.total),
        format!("Done: {}", report.done),
        format!("Remaining: {}", report.remaining()),
        format!("Completion: {}%", report.percent),
    ];
    if !report.overdue.is_empty() {
        lines.push(String::new());
        lines.push("Overdue:".to_string());
        for item in &report.overdue {
            lines.push(format!("  - [{}] {} (Due: {})", item.column, item.title, item.due));
        }
    }
    lines
}

pub fn board_pdf(board: &Board) -> Result<Vec<u8>, ExportError> {
    render_pdf(BOARD_TITLE, &board_lines(board))
}

pub fn report_pdf(report: &Report) -> Result<Vec<u8>, ExportError> {
    render_pdf(REPORT_TITLE, &report_lines(report))
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.0;
const LINE_HEIGHT: f32 = 10.0;
const FONT_SIZE: f32 = 12.0;

struct PdfCursor {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    y: f32,
}

impl PdfCursor {
    fn line(&mut self, text: &str) {
        if self.y < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
        if !text.is_empty() {
            self.layer
                .use_text(text, FONT_SIZE, Mm(MARGIN), Mm(self.y), &self.font);
        }
        self.y -= LINE_HEIGHT;
    }
}

fn render_pdf(title: &str, lines: &[String]) -> Result<Vec<u8>, ExportError> {
    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    let layer = doc.get_page(page).get_layer(layer);

    let mut cursor = PdfCursor {
        doc,
        layer,
        font,
        y: PAGE_HEIGHT - MARGIN,
    };
    cursor.line(title);
    for line in lines {
        cursor.line(line);
    }
    cursor
        .doc
        .save_to_bytes()
        .map_err(|e| ExportError::Pdf(e.to_string()))
}

/// Writes an export into `dir`, creating it if needed, and returns the file path.
pub fn write_export(dir: &Path, file_name: &str, contents: &[u8]) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, contents)?;
    log::info!("[taskurai.export] wrote {}", path.display());
    Ok(path)
}
