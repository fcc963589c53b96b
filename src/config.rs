use crate::error::ReconcileError;
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_EXCLUDED_SHEETS: &[&str] = &[
    "summary",
    "changelog",
    "warnings",
    "errors",
    "vcsin xref",
    "comparison summary",
];
const DEFAULT_HEADER_ROW: usize = 2;
const MAX_HEADER_ROW: usize = 2;
const DEFAULT_HEADER_MARKER: &str = "Repyear";
const DEFAULT_VOLATILE_COLUMNS: &[&str] = &["FAKeyint", "New Error?"];
const DEFAULT_MISSING_LABEL: &str = "missing col name";
const DEFAULT_SORT_KEYS: &[&str] = &["SSID", "Rowid"];
const DEFAULT_NOTES_MARKER: &str = "comments";
const DEFAULT_NOTES_KEY: &str = "SOCSEC1";
const DEFAULT_SUMMARY_SHEET: &str = "Comparison Summary";
const DEFAULT_CARRY_FORWARD_SHEETS: &[&str] =
    &["BFE001W04", "BNB001W03", "BNB006W01", "BNB006W05", "BSI003W01"];

/// Where the header sits on each sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HeaderMode {
    /// Header at a fixed zero-based row; the rows above are metadata.
    Fixed { row: usize },
    /// Header on the second row when it contains `marker`, else the first.
    Detect { marker: String },
}

impl Default for HeaderMode {
    fn default() -> Self {
        HeaderMode::Fixed {
            row: DEFAULT_HEADER_ROW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotesMerge {
    /// One column per notes label; the latest non-blank value wins.
    #[default]
    PreferLatest,
    /// Old and new notes side by side, old labels suffixed when they collide.
    KeepBoth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    #[default]
    Standard,
    /// Skip the row diff: emit the latest rows with old notes attached.
    CarryForward,
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub excluded_sheets: BTreeSet<String>,
    pub header: HeaderMode,
}

impl LoaderConfig {
    pub fn is_excluded(&self, sheet_name: &str) -> bool {
        self.excluded_sheets
            .contains(&sheet_name.trim().to_lowercase())
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            excluded_sheets: DEFAULT_EXCLUDED_SHEETS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            header: HeaderMode::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    pub volatile_columns: Vec<String>,
    pub missing_label: String,
    /// Row sort keys, first present one wins.
    pub sort_keys: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            volatile_columns: to_strings(DEFAULT_VOLATILE_COLUMNS),
            missing_label: DEFAULT_MISSING_LABEL.to_string(),
            sort_keys: to_strings(DEFAULT_SORT_KEYS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotesConfig {
    /// Case-insensitive substring identifying notes columns.
    pub marker: String,
    /// Identity column notes are keyed by.
    pub key: String,
    pub merge: NotesMerge,
}

impl NotesConfig {
    pub fn is_notes_column(&self, label: &str) -> bool {
        label.to_lowercase().contains(&self.marker.to_lowercase())
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_NOTES_MARKER.to_string(),
            key: DEFAULT_NOTES_KEY.to_string(),
            merge: NotesMerge::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub enabled: bool,
    pub lookup_path: Option<PathBuf>,
    /// Prior run's output; defaults to the old input file.
    pub prior_summary: Option<PathBuf>,
    pub assignee_column: String,
    pub description_column: String,
    pub code_column: String,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookup_path: None,
            prior_summary: None,
            assignee_column: "Assigned To:".to_string(),
            description_column: "Description".to_string(),
            code_column: "ErrCode".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub loader: LoaderConfig,
    pub normalize: NormalizeConfig,
    pub notes: NotesConfig,
    /// Publish only-in-old rows instead of dropping them.
    pub keep_resolved: bool,
    pub sheet_policies: BTreeMap<String, MergePolicy>,
    pub summary_sheet: String,
    pub enrich: EnrichConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            normalize: NormalizeConfig::default(),
            notes: NotesConfig::default(),
            keep_resolved: false,
            sheet_policies: DEFAULT_CARRY_FORWARD_SHEETS
                .iter()
                .map(|name| ((*name).to_string(), MergePolicy::CarryForward))
                .collect(),
            summary_sheet: DEFAULT_SUMMARY_SHEET.to_string(),
            enrich: EnrichConfig::default(),
        }
    }
}

impl ReconcileConfig {
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let file_config = if let Some(path) = args.config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let mut config = ReconcileConfig::default();
        file_config.apply(&mut config);

        if args.keep_resolved {
            config.keep_resolved = true;
        }
        if args.no_enrich {
            config.enrich.enabled = false;
        }
        if let Some(lookup) = args.lookup.clone() {
            config.enrich.lookup_path = Some(lookup);
        }
        if let Some(prior) = args.prior_summary.clone() {
            config.enrich.prior_summary = Some(prior);
        }
        if let Some(marker) = args.header_marker.clone() {
            config.loader.header = HeaderMode::Detect { marker };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.notes.marker.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "notes marker must not be empty".into(),
            ));
        }
        if self.notes.key.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "notes identity column must not be empty".into(),
            ));
        }
        if self.summary_sheet.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "summary sheet name must not be empty".into(),
            ));
        }
        match &self.loader.header {
            HeaderMode::Fixed { row } if *row > MAX_HEADER_ROW => {
                Err(ReconcileError::InvalidConfig(format!(
                    "header row {row} is beyond the supported offset {MAX_HEADER_ROW}"
                )))
            }
            HeaderMode::Detect { marker } if marker.trim().is_empty() => Err(
                ReconcileError::InvalidConfig("header marker must not be empty".into()),
            ),
            _ => Ok(()),
        }
    }

    pub fn policy_for(&self, sheet_name: &str) -> MergePolicy {
        self.sheet_policies
            .get(sheet_name)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "sheet-reconcile",
    about = "Compare two error-report snapshots and write a change-log workbook",
    version
)]
pub struct CliArgs {
    #[arg(long, value_name = "FILE", help = "Older report (prompted for when omitted)")]
    pub old: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Latest report (prompted for when omitted)")]
    pub new: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Output workbook (defaults to <old>_<new>.xlsx next to the old file)"
    )]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Path to a configuration file (YAML or JSON)")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "meta_data_path",
        value_name = "FILE",
        help = "Error-code lookup workbook with ErrCode and Description columns"
    )]
    pub lookup: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Previous change log to carry 'Assigned To:' from (defaults to --old)"
    )]
    pub prior_summary: Option<PathBuf>,

    #[arg(
        long,
        value_name = "LABEL",
        num_args = 0..=1,
        default_missing_value = DEFAULT_HEADER_MARKER,
        help = "Detect the header on row 1 or 2 by this column label instead of using row 3"
    )]
    pub header_marker: Option<String>,

    #[arg(long, help = "Write the plain summary without status, assignee or links")]
    pub no_enrich: bool,

    #[arg(long, help = "Keep rows that only exist in the old report, marked Resolved")]
    pub keep_resolved: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    excluded_sheets: Option<Vec<String>>,
    header: Option<HeaderMode>,
    volatile_columns: Option<Vec<String>>,
    missing_label: Option<String>,
    sort_keys: Option<Vec<String>>,
    notes_marker: Option<String>,
    notes_key: Option<String>,
    notes_merge: Option<NotesMerge>,
    keep_resolved: Option<bool>,
    sheet_policies: Option<BTreeMap<String, MergePolicy>>,
    summary_sheet: Option<String>,
    enrich: Option<bool>,
    lookup_path: Option<PathBuf>,
    assignee_column: Option<String>,
    description_column: Option<String>,
    code_column: Option<String>,
}

impl PartialConfig {
    fn apply(self, config: &mut ReconcileConfig) {
        if let Some(sheets) = self.excluded_sheets {
            config.loader.excluded_sheets = sheets
                .into_iter()
                .map(|name| name.trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect();
        }
        if let Some(header) = self.header {
            config.loader.header = header;
        }
        if let Some(columns) = self.volatile_columns {
            config.normalize.volatile_columns = columns;
        }
        if let Some(label) = self.missing_label {
            config.normalize.missing_label = label;
        }
        if let Some(keys) = self.sort_keys {
            config.normalize.sort_keys = keys;
        }
        if let Some(marker) = self.notes_marker {
            config.notes.marker = marker;
        }
        if let Some(key) = self.notes_key {
            config.notes.key = key;
        }
        if let Some(merge) = self.notes_merge {
            config.notes.merge = merge;
        }
        if let Some(keep) = self.keep_resolved {
            config.keep_resolved = keep;
        }
        if let Some(policies) = self.sheet_policies {
            config.sheet_policies = policies;
        }
        if let Some(name) = self.summary_sheet {
            config.summary_sheet = name;
        }
        if let Some(enabled) = self.enrich {
            config.enrich.enabled = enabled;
        }
        if let Some(path) = self.lookup_path {
            config.enrich.lookup_path = Some(path);
        }
        if let Some(column) = self.assignee_column {
            config.enrich.assignee_column = column;
        }
        if let Some(column) = self.description_column {
            config.enrich.description_column = column;
        }
        if let Some(column) = self.code_column {
            config.enrich.code_column = column;
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn exclusion_ignores_case_and_padding() {
        let loader = LoaderConfig::default();
        assert!(loader.is_excluded("  Comparison Summary "));
        assert!(loader.is_excluded("VCSIN XREF"));
        assert!(!loader.is_excluded("BNB001W03"));
    }

    #[test]
    fn notes_columns_match_by_substring() {
        let notes = NotesConfig::default();
        assert!(notes.is_notes_column("Comments"));
        assert!(notes.is_notes_column("Reviewer COMMENTS 2"));
        assert!(!notes.is_notes_column("Notes"));
    }

    #[test]
    fn default_policy_table_marks_carry_forward_sheets() {
        let config = ReconcileConfig::default();
        assert_eq!(config.policy_for("BNB006W05"), MergePolicy::CarryForward);
        assert_eq!(config.policy_for("XYZ"), MergePolicy::Standard);
    }

    #[test]
    fn yaml_file_overrides_defaults_and_cli_overrides_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reconcile.yaml");
        let mut file = fs::File::create(&path)?;
        writeln!(
            file,
            "notes_marker: notes\nkeep_resolved: false\nheader:\n  mode: detect\n  marker: Repyear\nsheet_policies:\n  ABC: carry_forward\n"
        )?;

        let args = CliArgs {
            config: Some(path),
            keep_resolved: true,
            ..Default::default()
        };
        let config = ReconcileConfig::from_args(&args)?;
        assert_eq!(config.notes.marker, "notes");
        assert!(config.keep_resolved);
        assert_eq!(
            config.loader.header,
            HeaderMode::Detect {
                marker: "Repyear".into()
            }
        );
        assert_eq!(config.policy_for("ABC"), MergePolicy::CarryForward);
        assert_eq!(config.policy_for("BNB001W03"), MergePolicy::Standard);
        Ok(())
    }

    #[test]
    fn rejects_header_offsets_past_two() {
        let mut config = ReconcileConfig::default();
        config.loader.header = HeaderMode::Fixed { row: 5 };
        assert!(matches!(
            config.validate(),
            Err(ReconcileError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_config_extension_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("reconcile.ini");
        fs::write(&path, "x=1").expect("write");
        assert!(load_config_file(&path).is_err());
    }
}
