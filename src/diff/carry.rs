use crate::config::NotesConfig;
use crate::model::{IdentityIssue, Table};
use crate::notes;
use indexmap::IndexSet;
use std::collections::HashSet;

/// Why `table` cannot be diffed row by row on `key`, if it cannot.
pub fn identity_issue(table: &Table, key: &str) -> Option<IdentityIssue> {
    let Some(idx) = table.column_index(key) else {
        return Some(IdentityIssue::Missing {
            column: key.to_string(),
        });
    };

    let mut seen = HashSet::new();
    let count = table
        .rows
        .iter()
        .filter(|row| !seen.insert(row.get(idx)))
        .count();
    if count > 0 {
        return Some(IdentityIssue::Duplicated {
            column: key.to_string(),
            count,
        });
    }
    None
}

/// Emits the latest rows unchanged apart from deduplication, with the old
/// version's notes joined on by identity.
///
/// Both tables should already have gone through `normalize::prepare`.
pub fn carry_forward(
    sheet_name: &str,
    old: &Table,
    new: &Table,
    config: &NotesConfig,
) -> Table {
    let old = dedup(old);
    let new = dedup(new);

    if !new.has_column(&config.key) {
        tracing::info!(
            sheet = %sheet_name,
            identity = %config.key,
            "latest rows have no identity column, notes cannot be carried"
        );
        return new;
    }

    let (_, old_notes) = notes::extract(sheet_name, &old, config);
    if let Some(bundle) = old_notes.as_ref() {
        for (column, values) in bundle.distinct_values() {
            tracing::debug!(sheet = %sheet_name, column = %column, values = ?values, "carried notes values");
        }
    }

    let (mut table, new_notes) = notes::extract(sheet_name, &new, config);
    if let Err(err) = notes::reattach(
        sheet_name,
        &mut table,
        old_notes.as_ref(),
        new_notes.as_ref(),
        config,
    ) {
        tracing::warn!(sheet = %sheet_name, error = %err, "notes could not be carried forward");
        notes::mark_merge_failure(&mut table);
    }
    table
}

fn dedup(table: &Table) -> Table {
    let rows: IndexSet<_> = table.rows.iter().cloned().collect();
    Table::new(table.columns.clone(), rows.into_iter().collect())
}
