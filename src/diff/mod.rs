pub mod carry;
pub mod rows;

pub use carry::{carry_forward, identity_issue};
pub use rows::{NEW_ERROR_COLUMN, diff};

use crate::config::{MergePolicy, ReconcileConfig};
use crate::model::{IdentityIssue, LoadedWorkbook, SheetData, SheetOutcome};
use crate::normalize;
use crate::notes;
use std::collections::{BTreeMap, BTreeSet};

/// Reconciles every sheet name found in either workbook, in name order.
pub fn reconcile_workbooks(
    old: &LoadedWorkbook,
    new: &LoadedWorkbook,
    config: &ReconcileConfig,
) -> BTreeMap<String, SheetOutcome> {
    let names: BTreeSet<&String> = old.sheets.keys().chain(new.sheets.keys()).collect();

    names
        .into_iter()
        .map(|name| {
            let outcome = match (old.get(name), new.get(name)) {
                (Some(old_sheet), Some(new_sheet)) => {
                    reconcile_pair(name, old_sheet, new_sheet, config)
                }
                (Some(_), None) => {
                    tracing::debug!(sheet = %name, "sheet no longer present");
                    SheetOutcome::Removed
                }
                (None, Some(new_sheet)) => {
                    tracing::debug!(sheet = %name, "sheet added");
                    SheetOutcome::Added {
                        table: normalize::drop_volatile(&new_sheet.table, &config.normalize),
                        meta: new_sheet.meta.clone(),
                    }
                }
                (None, None) => SheetOutcome::Removed,
            };
            (name.clone(), outcome)
        })
        .collect()
}

/// Compares one sheet present in both workbooks.
///
/// Sheets flagged for carry-forward, or whose latest rows lack a usable
/// identity column, skip the row diff. A notes join failure is recorded on
/// the outcome rather than returned.
pub fn reconcile_pair(
    sheet_name: &str,
    old: &SheetData,
    new: &SheetData,
    config: &ReconcileConfig,
) -> SheetOutcome {
    let meta = old.meta.merged_with(&new.meta);
    let old_table = normalize::prepare(&old.table, &config.normalize);
    let new_table = normalize::prepare(&new.table, &config.normalize);

    let issue = match config.policy_for(sheet_name) {
        MergePolicy::CarryForward => Some(IdentityIssue::Configured),
        MergePolicy::Standard => identity_issue(&new_table, &config.notes.key),
    };
    if let Some(issue) = issue {
        tracing::warn!(
            sheet = %sheet_name,
            issue = %issue,
            "no reliable comparison possible, carrying latest rows forward"
        );
        let table = carry_forward(sheet_name, &old_table, &new_table, &config.notes);
        return SheetOutcome::CarriedForward {
            table,
            meta,
            issue,
        };
    }

    let old_table = normalize::normalize(sheet_name, &old_table, &config.normalize);
    let new_table = normalize::normalize(sheet_name, &new_table, &config.normalize);
    let (old_stripped, old_notes) = notes::extract(sheet_name, &old_table, &config.notes);
    let (new_stripped, new_notes) = notes::extract(sheet_name, &new_table, &config.notes);

    let mut outcome = diff(&old_stripped, &new_stripped, config.keep_resolved);
    if let Err(err) = notes::reattach(
        sheet_name,
        &mut outcome.visible,
        old_notes.as_ref(),
        new_notes.as_ref(),
        &config.notes,
    ) {
        tracing::warn!(sheet = %sheet_name, error = %err, "notes could not be merged");
        notes::mark_merge_failure(&mut outcome.visible);
        outcome.notes_error = Some(err.to_string());
    }

    tracing::debug!(
        sheet = %sheet_name,
        only_old = outcome.counts.only_old,
        only_new = outcome.counts.only_new,
        both = outcome.counts.both,
        "sheet compared"
    );
    SheetOutcome::Compared { outcome, meta }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, DiffCounts, MetaRows, Row, Table};
    use assert_matches::assert_matches;

    fn sheet(name: &str, columns: &[&str], rows: Vec<Vec<CellValue>>) -> SheetData {
        SheetData {
            name: name.to_string(),
            header_row: 2,
            table: Table::new(
                columns.iter().map(|c| c.to_string()).collect(),
                rows.into_iter().map(Row::new).collect(),
            ),
            meta: MetaRows::new(vec![vec![format!("{name} description").as_str().into()]]),
        }
    }

    fn workbook(sheets: Vec<SheetData>) -> LoadedWorkbook {
        LoadedWorkbook {
            sheets: sheets.into_iter().map(|s| (s.name.clone(), s)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn comments_do_not_count_as_differences() {
        let config = ReconcileConfig::default();
        let old = sheet(
            "X",
            &["SOCSEC1", "SSID", "Comments"],
            vec![vec!["1".into(), "a".into(), "old note".into()]],
        );
        let new = sheet(
            "X",
            &["Comments", "SSID", "SOCSEC1"],
            vec![vec!["new note".into(), "a".into(), "1".into()]],
        );

        let outcome = reconcile_pair("X", &old, &new, &config);
        assert_matches!(outcome, SheetOutcome::Compared { ref outcome, .. } => {
            assert!(outcome.counts.is_unchanged());
            assert_eq!(outcome.counts.both, 1);
            assert_eq!(
                outcome.visible.columns,
                vec!["SOCSEC1", "SSID", NEW_ERROR_COLUMN, "Comments"]
            );
            assert_eq!(outcome.visible.rows[0].cells[3], CellValue::from("new note"));
        });
    }

    #[test]
    fn duplicated_identity_falls_back_to_carry_forward() {
        let config = ReconcileConfig::default();
        let old = sheet("Y", &["SOCSEC1", "Term"], vec![vec!["1".into(), "F".into()]]);
        let new = sheet(
            "Y",
            &["SOCSEC1", "Term"],
            vec![vec!["1".into(), "F".into()], vec!["1".into(), "S".into()]],
        );

        let outcome = reconcile_pair("Y", &old, &new, &config);
        assert_matches!(
            outcome,
            SheetOutcome::CarriedForward {
                issue: IdentityIssue::Duplicated { count: 1, .. },
                ..
            }
        );
    }

    #[test]
    fn configured_sheets_always_carry_forward() {
        let config = ReconcileConfig::default();
        let old = sheet("BNB001W03", &["SOCSEC1"], vec![vec!["1".into()]]);
        let new = sheet("BNB001W03", &["SOCSEC1"], vec![vec!["1".into()]]);
        assert_matches!(
            reconcile_pair("BNB001W03", &old, &new, &config),
            SheetOutcome::CarriedForward {
                issue: IdentityIssue::Configured,
                ..
            }
        );
    }

    #[test]
    fn repeated_identity_in_old_keeps_every_note() {
        let config = ReconcileConfig::default();
        let old = sheet(
            "Z",
            &["SOCSEC1", "Term", "Comments"],
            vec![
                vec!["1".into(), "F".into(), "first".into()],
                vec!["1".into(), "S".into(), "second".into()],
                vec!["2".into(), "F".into(), "keep me".into()],
                vec!["3".into(), "F".into(), "and me".into()],
            ],
        );
        let new = sheet(
            "Z",
            &["SOCSEC1", "Term"],
            vec![
                vec!["1".into(), "F".into()],
                vec!["2".into(), "F".into()],
                vec!["3".into(), "F".into()],
            ],
        );

        let outcome = reconcile_pair("Z", &old, &new, &config);
        assert_matches!(outcome, SheetOutcome::Compared { ref outcome, .. } => {
            assert!(outcome.notes_error.is_none());
            assert_eq!(
                outcome.visible.columns,
                vec!["SOCSEC1", "Term", NEW_ERROR_COLUMN, "Comments"]
            );
            assert_eq!(
                outcome.counts,
                DiffCounts { only_old: 1, only_new: 0, both: 3 }
            );
            let note_of = |id: &str| {
                outcome
                    .visible
                    .rows
                    .iter()
                    .find(|row| row.cells[0] == CellValue::from(id))
                    .map(|row| row.cells[3].to_string())
            };
            assert_eq!(note_of("1").as_deref(), Some("first; second"));
            assert_eq!(note_of("2").as_deref(), Some("keep me"));
            assert_eq!(note_of("3").as_deref(), Some("and me"));
        });
    }

    #[test]
    fn union_of_sheet_names_is_covered() {
        let config = ReconcileConfig::default();
        let old = workbook(vec![
            sheet("Gone", &["SOCSEC1"], vec![vec!["1".into()]]),
            sheet("Kept", &["SOCSEC1"], vec![vec!["1".into()]]),
        ]);
        let new = workbook(vec![
            sheet("Kept", &["SOCSEC1"], vec![vec!["1".into()]]),
            sheet("Fresh", &["SOCSEC1", "FAKeyint"], vec![vec!["2".into(), 9.0.into()]]),
        ]);

        let outcomes = reconcile_workbooks(&old, &new, &config);
        let names: Vec<_> = outcomes.keys().cloned().collect();
        assert_eq!(names, vec!["Fresh", "Gone", "Kept"]);
        assert_matches!(outcomes["Gone"], SheetOutcome::Removed);
        assert_matches!(outcomes["Kept"], SheetOutcome::Compared { .. });
        assert_matches!(outcomes["Fresh"], SheetOutcome::Added { ref table, .. } => {
            assert_eq!(table.columns, vec!["SOCSEC1"]);
        });
    }
}
