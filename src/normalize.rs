//! Column normalization so that two independently exported versions of a
//! sheet line up column for column.

use crate::config::NormalizeConfig;
use crate::model::Table;
use std::collections::HashMap;

/// Drops volatile columns, names blank labels, sorts columns and rows.
pub fn normalize(sheet_name: &str, table: &Table, config: &NormalizeConfig) -> Table {
    let table = sort_columns(&prepare(table, config));
    sort_rows(sheet_name, table, config)
}

/// Label cleanup only; column and row order are left as exported.
pub fn prepare(table: &Table, config: &NormalizeConfig) -> Table {
    canonical_labels(&drop_volatile(table, config), config)
}

pub fn drop_volatile(table: &Table, config: &NormalizeConfig) -> Table {
    if !table
        .columns
        .iter()
        .any(|label| config.volatile_columns.contains(label))
    {
        return table.clone();
    }
    table.drop_columns(|label| config.volatile_columns.iter().any(|v| v == label))
}

/// Blank labels become the placeholder; repeated labels are numbered
/// `Label`, `Label 2`, `Label 3`, ...
pub fn canonical_labels(table: &Table, config: &NormalizeConfig) -> Table {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::with_capacity(table.columns.len());
    for label in &table.columns {
        let base = if label.trim().is_empty() {
            config.missing_label.clone()
        } else {
            label.clone()
        };
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            columns.push(base);
        } else {
            columns.push(format!("{base} {count}"));
        }
    }

    let mut renamed = table.clone();
    renamed.columns = columns;
    renamed
}

pub fn sort_columns(table: &Table) -> Table {
    let mut labels = table.columns.clone();
    labels.sort();
    if labels == table.columns {
        return table.clone();
    }
    table.project(&labels)
}

/// Stable sort by the first configured key column present on the table.
pub fn sort_rows(sheet_name: &str, mut table: Table, config: &NormalizeConfig) -> Table {
    let key = config
        .sort_keys
        .iter()
        .find_map(|key| table.column_index(key).map(|idx| (key, idx)));

    match key {
        Some((label, idx)) => {
            tracing::trace!(sheet = %sheet_name, key = %label, "sorting rows");
            table.rows.sort_by(|a, b| a.get(idx).cmp(b.get(idx)));
        }
        None => {
            tracing::info!(
                sheet = %sheet_name,
                keys = ?config.sort_keys,
                "no sort column present, keeping export order"
            );
        }
    }
    table
}
