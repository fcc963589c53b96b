pub mod config;
pub mod diff;
pub mod enrich;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod notes;
pub mod picker;
pub mod report;
pub mod styles;
pub mod utils;
pub mod workbook;
pub mod writer;

pub use config::{CliArgs, ReconcileConfig};
pub use error::{ReconcileError, ReconcileResult};
pub use logging::{LoggingConfig, init_logging};
pub use picker::{FilePicker, default_picker};

use anyhow::Result;
use enrich::CrossReferenceEnricher;
use report::{ReconciliationReport, ReportStats};
use serde::Serialize;
use std::path::PathBuf;
use writer::{ReportWriter, SummaryLayout};

/// The two snapshots to reconcile and where to write the change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub old: PathBuf,
    pub new: PathBuf,
    pub output: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(old: impl Into<PathBuf>, new: impl Into<PathBuf>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            output: None,
        }
    }

    /// Takes paths from the command line, asking `picker` for any that are
    /// missing.
    pub fn resolve(args: &CliArgs, picker: &dyn FilePicker) -> ReconcileResult<Self> {
        let old = match args.old.clone() {
            Some(path) => path,
            None => picker.pick("first")?,
        };
        let new = match args.new.clone() {
            Some(path) => path,
            None => picker.pick("second")?,
        };
        Ok(Self {
            old,
            new,
            output: args.output.clone(),
        })
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| utils::output_path_for(&self.old, &self.new))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub output: PathBuf,
    pub stats: ReportStats,
    pub skipped_sheets: Vec<String>,
    pub summary: Vec<String>,
}

/// Loads both workbooks, reconciles every sheet and writes the change log.
///
/// Only workbook-level I/O failures are returned; per-sheet problems are
/// logged and reflected in the output.
pub fn run(request: &RunRequest, config: &ReconcileConfig) -> Result<RunReport> {
    let span = logging::run_span(
        &utils::path_to_forward_slashes(&request.old),
        &utils::path_to_forward_slashes(&request.new),
    );
    let _enter = span.enter();

    let old = workbook::load(&request.old, &config.loader)?;
    let new = workbook::load(&request.new, &config.loader)?;
    let skipped_sheets = old
        .skipped
        .iter()
        .chain(new.skipped.iter())
        .map(|skipped| skipped.name.clone())
        .collect();

    let outcomes = diff::reconcile_workbooks(&old, &new, config);
    let mut report = ReconciliationReport::build(outcomes, &config.summary_sheet);

    let layout = if config.enrich.enabled {
        let prior = config
            .enrich
            .prior_summary
            .clone()
            .unwrap_or_else(|| request.old.clone());
        CrossReferenceEnricher::from_config(&config.enrich, &prior, &config.summary_sheet)
            .enrich(&mut report.entries);
        SummaryLayout::Enriched {
            assignee_label: config.enrich.assignee_column.clone(),
            description_label: config.enrich.description_column.clone(),
        }
    } else {
        SummaryLayout::Plain
    };

    let output = request.output_path();
    ReportWriter::new(&output, layout).write(&report)?;

    let stats = report.stats;
    tracing::info!(
        output = %output.display(),
        compared = stats.compared,
        unchanged = stats.unchanged,
        added = stats.added,
        removed = stats.removed,
        carried_forward = stats.carried_forward,
        notes_failures = stats.notes_failures,
        "reconciliation finished"
    );

    Ok(RunReport {
        output,
        stats,
        skipped_sheets,
        summary: report.summary_lines(),
    })
}
