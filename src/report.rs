//! Summary lines and the ordered set of sheets to publish.

use crate::model::{MetaRows, SheetOutcome, SummaryEntry, SummaryKind, Table};
use serde::Serialize;
use std::collections::BTreeMap;

/// A data sheet ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSheet {
    pub name: String,
    pub meta: MetaRows,
    pub table: Table,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub compared: usize,
    pub unchanged: usize,
    pub added: usize,
    pub removed: usize,
    pub carried_forward: usize,
    pub notes_failures: usize,
}

/// Collects one summary line per sheet outcome.
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    entries: Vec<SummaryEntry>,
    stats: ReportStats,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sheet_name: &str, outcome: &SheetOutcome) -> &SummaryEntry {
        let kind = match outcome {
            SheetOutcome::Compared { outcome, .. } => {
                self.stats.compared += 1;
                if outcome.notes_error.is_some() {
                    self.stats.notes_failures += 1;
                }
                if outcome.counts.is_unchanged() {
                    self.stats.unchanged += 1;
                    SummaryKind::Unchanged
                } else {
                    SummaryKind::Changed(outcome.counts)
                }
            }
            SheetOutcome::CarriedForward { issue, .. } => {
                self.stats.carried_forward += 1;
                SummaryKind::CarriedForward(issue.clone())
            }
            SheetOutcome::Added { .. } => {
                self.stats.added += 1;
                SummaryKind::Added
            }
            SheetOutcome::Removed => {
                self.stats.removed += 1;
                SummaryKind::NoLongerPresent
            }
        };
        self.entries.push(SummaryEntry::new(sheet_name, kind));
        &self.entries[self.entries.len() - 1]
    }

    pub fn finish(self) -> (Vec<SummaryEntry>, ReportStats) {
        (self.entries, self.stats)
    }
}

/// Everything the writer needs: summary lines and data sheets, both in
/// sheet-name order.
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    pub summary_sheet: String,
    pub entries: Vec<SummaryEntry>,
    pub sheets: Vec<OutputSheet>,
    pub stats: ReportStats,
}

impl ReconciliationReport {
    pub fn build(outcomes: BTreeMap<String, SheetOutcome>, summary_sheet: &str) -> Self {
        let mut builder = SummaryBuilder::new();
        let mut sheets = Vec::new();

        for (name, outcome) in outcomes {
            let line = builder.record(&name, &outcome).text();
            tracing::info!(sheet = %name, "{line}");

            let published = match outcome {
                SheetOutcome::Compared { outcome, meta } => Some((meta, outcome.visible)),
                SheetOutcome::CarriedForward { table, meta, .. } => Some((meta, table)),
                SheetOutcome::Added { table, meta } => Some((meta, table)),
                SheetOutcome::Removed => None,
            };
            if let Some((meta, table)) = published {
                sheets.push(OutputSheet { name, meta, table });
            }
        }

        let (entries, stats) = builder.finish();
        Self {
            summary_sheet: summary_sheet.to_string(),
            entries,
            sheets,
            stats,
        }
    }

    pub fn summary_lines(&self) -> Vec<String> {
        self.entries.iter().map(SummaryEntry::text).collect()
    }
}
