use crate::model::{CellValue, ClassifiedRow, Classification, DiffCounts, DiffOutcome, Row, Table};
use indexmap::IndexSet;

pub const NEW_ERROR_COLUMN: &str = "New Error?";

/// Classifies every distinct row of two normalized tables.
///
/// Each side is collapsed to its distinct rows first, so a row repeated
/// inside one file is still "only in" that file. Rows are compared on the
/// union of both column sets; a column absent from one side reads as blank.
pub fn diff(old: &Table, new: &Table, keep_resolved: bool) -> DiffOutcome {
    let mut columns: Vec<String> = old.columns.clone();
    for label in &new.columns {
        if !columns.contains(label) {
            columns.push(label.clone());
        }
    }
    columns.sort();

    let old_rows = distinct_rows(&old.project(&columns));
    let new_rows = distinct_rows(&new.project(&columns));

    let mut rows = Vec::with_capacity(old_rows.len() + new_rows.len());
    for row in &old_rows {
        let class = if new_rows.contains(row) {
            Classification::InBoth
        } else {
            Classification::OnlyInOld
        };
        rows.push(ClassifiedRow {
            row: row.clone(),
            class,
        });
    }
    for row in new_rows.iter().filter(|row| !old_rows.contains(*row)) {
        rows.push(ClassifiedRow {
            row: row.clone(),
            class: Classification::OnlyInNew,
        });
    }

    let mut counts = DiffCounts::default();
    for classified in &rows {
        counts.record(classified.class);
    }

    let visible = visible_table(&columns, &rows, keep_resolved);
    DiffOutcome {
        columns,
        rows,
        counts,
        visible,
        notes_error: None,
    }
}

fn distinct_rows(table: &Table) -> IndexSet<Row> {
    table.rows.iter().cloned().collect()
}

fn visible_table(columns: &[String], rows: &[ClassifiedRow], keep_resolved: bool) -> Table {
    let mut labels = columns.to_vec();
    labels.push(NEW_ERROR_COLUMN.to_string());

    let rows = rows
        .iter()
        .filter(|classified| keep_resolved || classified.class != Classification::OnlyInOld)
        .map(|classified| {
            let mut cells = classified.row.cells.clone();
            cells.push(CellValue::from(classified.class.indicator()));
            Row::new(cells)
        })
        .collect();
    Table::new(labels, rows)
}
