//! Free-text annotation columns are lifted out before comparison and joined
//! back afterwards by identity, so edits to them never register as changes.

use crate::config::{NotesConfig, NotesMerge};
use crate::error::{ReconcileError, ReconcileResult};
use crate::model::{CellValue, Table};
use indexmap::{IndexMap, IndexSet};

pub const FALLBACK_LABEL: &str = "Notes";
pub const MERGE_FAILURE_NOTE: &str = "Error merging notes columns. Check manually.";
const PREVIOUS_SUFFIX: &str = " (previous)";
const NOTE_SEPARATOR: &str = "; ";

/// Notes detached from a sheet, keyed by identity value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotesBundle {
    pub key: String,
    pub columns: Vec<String>,
    entries: IndexMap<CellValue, Vec<CellValue>>,
    conflicts: IndexSet<CellValue>,
}

impl NotesBundle {
    pub fn new(key: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            key: key.into(),
            columns,
            entries: IndexMap::new(),
            conflicts: IndexSet::new(),
        }
    }

    /// Adds one identity's notes. A repeated identity fills its blanks from
    /// the later row; a differing non-blank value is appended after `; ` and
    /// the identity is recorded as conflicting.
    pub fn insert(&mut self, key: CellValue, values: Vec<CellValue>) {
        let Some(existing) = self.entries.get_mut(&key) else {
            self.entries.insert(key, values);
            return;
        };

        let mut conflicted = false;
        for (slot, value) in existing.iter_mut().zip(values) {
            if slot.is_empty() {
                *slot = value;
                continue;
            }
            if value.is_empty() {
                continue;
            }
            let joined = slot.to_string();
            let incoming = value.to_string();
            if !joined.split(NOTE_SEPARATOR).any(|note| note == incoming) {
                *slot = CellValue::Text(format!("{joined}{NOTE_SEPARATOR}{incoming}"));
                conflicted = true;
            }
        }
        if conflicted {
            self.conflicts.insert(key);
        }
    }

    pub fn get(&self, key: &CellValue) -> Option<&[CellValue]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    fn value(&self, key: &CellValue, column: &str) -> Option<&CellValue> {
        let idx = self.columns.iter().position(|label| label == column)?;
        self.get(key)
            .and_then(|values| values.get(idx))
            .filter(|value| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identities whose rows disagreed on a notes value.
    pub fn conflicts(&self) -> impl Iterator<Item = &CellValue> {
        self.conflicts.iter()
    }

    /// Distinct non-blank values per notes column.
    pub fn distinct_values(&self) -> Vec<(String, Vec<String>)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                let mut values: Vec<String> = self
                    .entries
                    .values()
                    .filter_map(|row| row.get(idx))
                    .filter(|value| !value.is_empty())
                    .map(|value| value.to_string())
                    .collect();
                values.sort();
                values.dedup();
                (label.clone(), values)
            })
            .collect()
    }
}

pub fn notes_columns(table: &Table, config: &NotesConfig) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|label| config.is_notes_column(label))
        .cloned()
        .collect()
}

/// Splits notes columns off `table`.
///
/// Without an identity column the notes are still removed from the
/// comparison, but no bundle is returned.
pub fn extract(
    sheet_name: &str,
    table: &Table,
    config: &NotesConfig,
) -> (Table, Option<NotesBundle>) {
    let columns = notes_columns(table, config);
    if columns.is_empty() {
        return (table.clone(), None);
    }

    let stripped = table.drop_columns(|label| config.is_notes_column(label));

    let Some(key_idx) = table.column_index(&config.key) else {
        tracing::warn!(
            sheet = %sheet_name,
            identity = %config.key,
            notes_columns = ?columns,
            columns = ?table.columns,
            "notes columns found but identity column is missing"
        );
        return (stripped, None);
    };

    let indices: Vec<usize> = columns
        .iter()
        .filter_map(|label| table.column_index(label))
        .collect();
    let mut bundle = NotesBundle::new(config.key.clone(), columns);
    for row in &table.rows {
        let key = row.get(key_idx);
        if key.is_empty() {
            continue;
        }
        let values = indices.iter().map(|idx| row.get(*idx).clone()).collect();
        bundle.insert(key.clone(), values);
    }

    if bundle.is_empty() {
        return (stripped, None);
    }
    (stripped, Some(bundle))
}

/// Left-joins old and new notes onto `table` by identity, appending the notes
/// columns at the end. Returns whether any column was attached.
///
/// Fails only when `table` has no identity column to join on.
pub fn reattach(
    sheet_name: &str,
    table: &mut Table,
    old: Option<&NotesBundle>,
    new: Option<&NotesBundle>,
    config: &NotesConfig,
) -> ReconcileResult<bool> {
    if old.is_none() && new.is_none() {
        return Ok(false);
    }

    let key_idx = table.column_index(&config.key).ok_or_else(|| {
        ReconcileError::notes_merge(
            sheet_name,
            format!("identity column '{}' is missing from the rows", config.key),
        )
    })?;

    for identity in [old, new].into_iter().flatten().flat_map(|bundle| bundle.conflicts()) {
        tracing::warn!(
            sheet = %sheet_name,
            identity = %identity,
            "rows sharing an identity carry different notes, keeping all of them"
        );
    }

    let old_labels: Vec<String> = old.map(|b| b.columns.clone()).unwrap_or_default();
    let new_labels: Vec<String> = new.map(|b| b.columns.clone()).unwrap_or_default();
    let keys: Vec<CellValue> = table
        .rows
        .iter()
        .map(|row| row.get(key_idx).clone())
        .collect();

    let pick = |bundle: Option<&NotesBundle>, key: &CellValue, label: &str| {
        bundle
            .and_then(|b| b.value(key, label))
            .cloned()
            .unwrap_or_default()
    };

    match config.merge {
        NotesMerge::PreferLatest => {
            let mut labels = old_labels.clone();
            labels.extend(
                new_labels
                    .iter()
                    .filter(|label| !old_labels.contains(label))
                    .cloned(),
            );
            for label in labels {
                let values = keys
                    .iter()
                    .map(|key| {
                        let latest = pick(new, key, &label);
                        if latest.is_empty() {
                            pick(old, key, &label)
                        } else {
                            latest
                        }
                    })
                    .collect();
                table.push_column(label, values);
            }
        }
        NotesMerge::KeepBoth => {
            for label in &old_labels {
                let values = keys.iter().map(|key| pick(old, key, label)).collect();
                let output_label = if new_labels.contains(label) {
                    format!("{label}{PREVIOUS_SUFFIX}")
                } else {
                    label.clone()
                };
                table.push_column(output_label, values);
            }
            for label in &new_labels {
                let values = keys.iter().map(|key| pick(new, key, label)).collect();
                table.push_column(label.clone(), values);
            }
        }
    }

    Ok(true)
}

/// Replaces a failed join with a single diagnostic column.
pub fn mark_merge_failure(table: &mut Table) {
    let values = vec![CellValue::Text(MERGE_FAILURE_NOTE.to_string()); table.row_count()];
    table.push_column(FALLBACK_LABEL, values);
}
