//! Output workbook assembly.
//!
//! The summary sheet is created first so it sits in the first tab, data sheets
//! follow in name order, and the summary rows are filled in last.

use crate::enrich::SUMMARY_COLUMN;
use crate::error::{ReconcileError, ReconcileResult};
use crate::model::{CellValue, MetaRows, SummaryEntry, Table};
use crate::report::{OutputSheet, ReconciliationReport};
use crate::styles;
use crate::utils::sheet_link_formula;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use umya_spreadsheet::{Cell, Spreadsheet, Worksheet};

pub const STATUS_COLUMN: &str = "Status";
pub const LINK_COLUMN: &str = "Error_Link";
/// Header row of every data sheet, below the two metadata rows.
pub const DATA_HEADER_ROW: u32 = 3;
const BACK_LINK_CELL: (u32, u32) = (1, 2);
const META_ROWS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryLayout {
    /// A single "Summary" column.
    Plain,
    /// Status, assignee, link, summary and description columns.
    Enriched {
        assignee_label: String,
        description_label: String,
    },
}

pub struct ReportWriter<'a> {
    path: &'a Path,
    layout: SummaryLayout,
}

impl<'a> ReportWriter<'a> {
    pub fn new(path: &'a Path, layout: SummaryLayout) -> Self {
        Self { path, layout }
    }

    /// Builds the workbook and atomically replaces whatever is at the
    /// destination path.
    pub fn write(&self, report: &ReconciliationReport) -> ReconcileResult<()> {
        let book = self.build(report)?;
        self.persist(&book)?;
        tracing::info!(
            path = %self.path.display(),
            sheets = report.sheets.len() + 1,
            "change log written"
        );
        Ok(())
    }

    pub fn build(&self, report: &ReconciliationReport) -> ReconcileResult<Spreadsheet> {
        let mut book = umya_spreadsheet::new_file_empty_worksheet();

        let placeholder = self.new_sheet(&mut book, &report.summary_sheet)?;
        placeholder
            .get_cell_mut((1, 1))
            .set_value_string(SUMMARY_COLUMN);

        for output in &report.sheets {
            let sheet = self.new_sheet(&mut book, &output.name)?;
            write_data_sheet(sheet, output);
            let link = sheet.get_cell_mut(BACK_LINK_CELL);
            link.set_formula(sheet_link_formula(&report.summary_sheet, &report.summary_sheet));
            styles::apply_link_style(link);
        }

        let published: HashSet<&str> = report.sheets.iter().map(|s| s.name.as_str()).collect();
        let summary = book
            .get_sheet_by_name_mut(&report.summary_sheet)
            .ok_or_else(|| self.error(format!("sheet '{}' disappeared", report.summary_sheet)))?;
        match &self.layout {
            SummaryLayout::Plain => write_plain_summary(summary, &report.entries),
            SummaryLayout::Enriched {
                assignee_label,
                description_label,
            } => write_enriched_summary(
                summary,
                &report.entries,
                &published,
                [assignee_label.as_str(), description_label.as_str()],
            ),
        }

        Ok(book)
    }

    fn persist(&self, book: &Spreadsheet) -> ReconcileResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staged = tempfile::Builder::new()
            .prefix(".sheet-reconcile-")
            .suffix(".xlsx")
            .tempfile_in(&dir)
            .map_err(|err| self.error(format!("cannot stage output in {}: {err}", dir.display())))?;

        umya_spreadsheet::writer::xlsx::write(book, staged.path())
            .map_err(|err| self.error(err.to_string()))?;
        staged
            .persist(self.path)
            .map_err(|err| self.error(err.to_string()))?;
        Ok(())
    }

    fn new_sheet<'b>(
        &self,
        book: &'b mut Spreadsheet,
        name: &str,
    ) -> ReconcileResult<&'b mut Worksheet> {
        book.new_sheet(name)
            .map_err(|err| self.error(format!("cannot add sheet '{name}': {err}")))
    }

    fn error(&self, message: impl Into<String>) -> ReconcileError {
        ReconcileError::WorkbookWrite {
            path: self.path.to_path_buf(),
            message: message.into(),
        }
    }
}

fn write_data_sheet(sheet: &mut Worksheet, output: &OutputSheet) {
    write_meta(sheet, &output.meta);
    write_table(sheet, &output.table, DATA_HEADER_ROW);
}

fn write_meta(sheet: &mut Worksheet, meta: &MetaRows) {
    for (row_idx, cells) in meta.rows.iter().take(META_ROWS).enumerate() {
        for (col_idx, value) in cells.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let cell = sheet.get_cell_mut((col_idx as u32 + 1, row_idx as u32 + 1));
            set_cell_value(cell, value);
        }
    }
}

fn write_table(sheet: &mut Worksheet, table: &Table, header_row: u32) {
    for (col_idx, label) in table.columns.iter().enumerate() {
        let cell = sheet.get_cell_mut((col_idx as u32 + 1, header_row));
        cell.set_value_string(label.as_str());
        styles::apply_header_style(cell);
    }
    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = header_row + 1 + row_idx as u32;
        for (col_idx, value) in row.cells.iter().enumerate() {
            if matches!(value, CellValue::Empty) {
                continue;
            }
            set_cell_value(sheet.get_cell_mut((col_idx as u32 + 1, row_num)), value);
        }
    }
}

fn set_cell_value(cell: &mut Cell, value: &CellValue) {
    match value {
        CellValue::Empty => {}
        CellValue::Text(text) | CellValue::Error(text) => {
            cell.set_value_string(text.as_str());
        }
        CellValue::Number(number) => {
            cell.set_value_number(*number);
        }
        CellValue::Bool(flag) => {
            cell.set_value_bool(*flag);
        }
    }
}

fn write_plain_summary(sheet: &mut Worksheet, entries: &[SummaryEntry]) {
    sheet.get_cell_mut((1, 1)).set_value_string(SUMMARY_COLUMN);
    styles::apply_header_style(sheet.get_cell_mut((1, 1)));
    for (idx, entry) in entries.iter().enumerate() {
        sheet
            .get_cell_mut((1, idx as u32 + 2))
            .set_value_string(entry.text());
    }
}

fn write_enriched_summary(
    sheet: &mut Worksheet,
    entries: &[SummaryEntry],
    published: &HashSet<&str>,
    [assignee_label, description_label]: [&str; 2],
) {
    let headers = [
        STATUS_COLUMN,
        assignee_label,
        LINK_COLUMN,
        SUMMARY_COLUMN,
        description_label,
    ];
    for (idx, label) in headers.iter().enumerate() {
        let cell = sheet.get_cell_mut((idx as u32 + 1, 1));
        cell.set_value_string(*label);
        styles::apply_header_style(cell);
    }

    for (idx, entry) in entries.iter().enumerate() {
        let row = idx as u32 + 2;
        if let Some(status) = entry.status {
            sheet.get_cell_mut((1, row)).set_value_string(status.to_string());
        }
        if let Some(assignee) = entry.assigned_to.as_deref() {
            sheet.get_cell_mut((2, row)).set_value_string(assignee);
        }

        let link = sheet.get_cell_mut((3, row));
        if published.contains(entry.sheet.as_str()) {
            link.set_formula(sheet_link_formula(&entry.sheet, &entry.sheet));
        } else {
            link.set_value_string(entry.sheet.as_str());
        }
        styles::apply_link_style(link);

        sheet.get_cell_mut((4, row)).set_value_string(entry.text());
        if let Some(description) = entry.description.as_deref() {
            sheet.get_cell_mut((5, row)).set_value_string(description);
        }
    }
}
