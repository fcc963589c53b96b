//! Cross-references summary lines against a previous change log and an
//! error-code lookup workbook.

use crate::config::EnrichConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::model::{SheetStatus, SummaryEntry, Table};
use crate::workbook;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

pub const SUMMARY_COLUMN: &str = "Summary";

static ERROR_CODE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"'(.+?)'(?::|\s)").ok());

/// The sheet name quoted in a summary line. The closing quote is the first
/// one followed by `:` or whitespace, so names may contain apostrophes.
pub fn error_code(text: &str) -> Option<&str> {
    let captures = ERROR_CODE.as_ref()?.captures(text)?;
    captures.get(1).map(|m| m.as_str())
}

pub fn classify_status(text: &str) -> SheetStatus {
    let lowered = text.to_lowercase();
    if lowered.contains("longer") {
        SheetStatus::Complete
    } else if lowered.contains("added") {
        SheetStatus::NewError
    } else {
        SheetStatus::Recurring
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrossReferenceEnricher {
    assignees: HashMap<String, String>,
    descriptions: HashMap<String, String>,
}

impl CrossReferenceEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads whatever sources are available. A missing or unreadable source
    /// only leaves the matching column blank.
    pub fn from_config(config: &EnrichConfig, prior_summary: &Path, summary_sheet: &str) -> Self {
        let mut enricher = Self::new();

        match load_prior_assignees(prior_summary, summary_sheet, &config.assignee_column) {
            Ok(assignees) => enricher.assignees = assignees,
            Err(err) => tracing::warn!(
                path = %prior_summary.display(),
                error = %err,
                "no prior summary to carry assignments from"
            ),
        }

        match config.lookup_path.as_deref() {
            Some(path) => match load_descriptions(path, &config.code_column, &config.description_column) {
                Ok(descriptions) => enricher.descriptions = descriptions,
                Err(err) => tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "error-code lookup could not be read"
                ),
            },
            None => tracing::warn!("no error-code lookup configured, descriptions left blank"),
        }

        enricher
    }

    pub fn with_assignee(mut self, code: impl Into<String>, assignee: impl Into<String>) -> Self {
        self.assignees.insert(code.into(), assignee.into());
        self
    }

    pub fn with_description(mut self, code: impl Into<String>, description: impl Into<String>) -> Self {
        self.descriptions.insert(code.into(), description.into());
        self
    }

    pub fn enrich(&self, entries: &mut [SummaryEntry]) {
        for entry in entries.iter_mut() {
            entry.status = Some(classify_status(&entry.text()));
            entry.assigned_to = self.assignees.get(&entry.sheet).cloned();
            entry.description = self.descriptions.get(&entry.sheet).cloned();
        }
    }
}

fn load_prior_assignees(
    path: &Path,
    summary_sheet: &str,
    assignee_column: &str,
) -> ReconcileResult<HashMap<String, String>> {
    let book = workbook::open_spreadsheet(path)?;
    let sheet = book
        .get_sheet_by_name(summary_sheet)
        .ok_or_else(|| ReconcileError::sheet_shape(summary_sheet, "not found in prior file"))?;
    let table = workbook::read_table(sheet, 0)?;

    let Some(assignee_idx) = table.column_index(assignee_column) else {
        return Err(ReconcileError::sheet_shape(
            summary_sheet,
            format!("no '{assignee_column}' column"),
        ));
    };
    let summary_idx = table.column_index(SUMMARY_COLUMN).unwrap_or(0);

    let mut assignees = HashMap::new();
    for row in &table.rows {
        let assignee = row.get(assignee_idx);
        if assignee.is_empty() {
            continue;
        }
        let text = row.get(summary_idx).to_string();
        if let Some(code) = error_code(&text) {
            assignees
                .entry(code.to_string())
                .or_insert_with(|| assignee.to_string());
        }
    }
    Ok(assignees)
}

fn load_descriptions(
    path: &Path,
    code_column: &str,
    description_column: &str,
) -> ReconcileResult<HashMap<String, String>> {
    let book = workbook::open_spreadsheet(path)?;
    let sheet = book.get_sheet_collection().first().ok_or_else(|| {
        ReconcileError::sheet_shape(path.display().to_string(), "lookup workbook has no sheets")
    })?;
    let table = workbook::read_table(sheet, 0)?;
    lookup_pairs(&table, sheet.get_name(), code_column, description_column)
}

fn lookup_pairs(
    table: &Table,
    sheet_name: &str,
    key_column: &str,
    value_column: &str,
) -> ReconcileResult<HashMap<String, String>> {
    let (Some(key_idx), Some(value_idx)) = (
        table.column_index(key_column),
        table.column_index(value_column),
    ) else {
        return Err(ReconcileError::sheet_shape(
            sheet_name,
            format!("expected '{key_column}' and '{value_column}' columns"),
        ));
    };

    let mut pairs = HashMap::new();
    for row in &table.rows {
        let key = row.get(key_idx);
        if key.is_empty() {
            continue;
        }
        pairs
            .entry(key.to_string().trim().to_string())
            .or_insert_with(|| row.get(value_idx).to_string());
    }
    Ok(pairs)
}
