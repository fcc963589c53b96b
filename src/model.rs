use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// A single scalar cell. Equality is exact and typed: `Number(1.0)` never
/// equals `Text("1")`.
#[derive(Debug, Clone, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            CellValue::Bool(_) => 0,
            CellValue::Number(_) => 1,
            CellValue::Text(_) => 2,
            CellValue::Error(_) => 3,
            CellValue::Empty => 4,
        }
    }
}

// -0.0 and 0.0 compare equal, every NaN equals every other NaN.
fn number_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Empty, CellValue::Empty) => true,
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Number(a), CellValue::Number(b)) => number_bits(*a) == number_bits(*b),
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Error(a), CellValue::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            CellValue::Empty => {}
            CellValue::Text(text) | CellValue::Error(text) => text.hash(state),
            CellValue::Number(value) => number_bits(*value).hash(state),
            CellValue::Bool(value) => value.hash(state),
        }
    }
}

/// Total order used for row sorting; blanks sort last.
impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Error(a), CellValue::Error(b)) => a.cmp(b),
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Number(a), CellValue::Number(b)) => {
                f64::from_bits(number_bits(*a)).total_cmp(&f64::from_bits(number_bits(*b)))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) | CellValue::Error(text) => write!(f, "{text}"),
            CellValue::Number(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
            CellValue::Bool(true) => write!(f, "TRUE"),
            CellValue::Bool(false) => write!(f, "FALSE"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// One data row, positionally aligned with its table's column labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Row {
    pub cells: Vec<CellValue>,
}

impl Row {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    pub fn get(&self, index: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells.get(index).unwrap_or(&EMPTY)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_empty)
    }
}

impl From<Vec<CellValue>> for Row {
    fn from(cells: Vec<CellValue>) -> Self {
        Row::new(cells)
    }
}

/// Column labels plus rows. Labels are unique once the table has been through
/// `normalize::canonical_labels`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == label)
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.column_index(label).is_some()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn value<'a>(&'a self, row: &'a Row, label: &str) -> Option<&'a CellValue> {
        self.column_index(label).map(|idx| row.get(idx))
    }

    /// Rebuilds the table with the given labels; absent labels become blanks.
    pub fn project(&self, labels: &[String]) -> Table {
        let indices: Vec<Option<usize>> = labels
            .iter()
            .map(|label| self.column_index(label))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                Row::new(
                    indices
                        .iter()
                        .map(|idx| idx.map(|i| row.get(i).clone()).unwrap_or_default())
                        .collect(),
                )
            })
            .collect();
        Table::new(labels.to_vec(), rows)
    }

    pub fn drop_columns<F>(&self, mut predicate: F) -> Table
    where
        F: FnMut(&str) -> bool,
    {
        let keep: Vec<String> = self
            .columns
            .iter()
            .filter(|label| !predicate(label))
            .cloned()
            .collect();
        self.project(&keep)
    }

    pub fn push_column(&mut self, label: impl Into<String>, values: Vec<CellValue>) {
        self.columns.push(label.into());
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.cells.resize(self.columns.len() - 1, CellValue::Empty);
            row.cells.push(values.next().unwrap_or_default());
        }
    }
}

/// Rows found above the header: a description line and a reference link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaRows {
    pub rows: Vec<Vec<CellValue>>,
}

impl MetaRows {
    pub const DESCRIPTION: (usize, usize) = (0, 0);
    pub const LINK: (usize, usize) = (1, 2);

    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(CellValue::is_empty))
    }

    pub fn cell(&self, (row, col): (usize, usize)) -> Option<&CellValue> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .filter(|value| !value.is_empty())
    }

    pub fn description(&self) -> Option<&CellValue> {
        self.cell(Self::DESCRIPTION)
    }

    pub fn link(&self) -> Option<&CellValue> {
        self.cell(Self::LINK)
    }

    fn set(&mut self, (row, col): (usize, usize), value: CellValue) {
        if self.rows.len() <= row {
            self.rows.resize(row + 1, Vec::new());
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value;
    }

    /// Keeps these rows, taking the description and link from `latest`
    /// wherever it carries them.
    pub fn merged_with(&self, latest: &MetaRows) -> MetaRows {
        let mut merged = self.clone();
        for slot in [Self::DESCRIPTION, Self::LINK] {
            if let Some(value) = latest.cell(slot) {
                merged.set(slot, value.clone());
            }
        }
        merged
    }
}

/// A loaded sheet: header offset, data table and metadata rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub header_row: usize,
    pub table: Table,
    pub meta: MetaRows,
}

#[derive(Debug, Clone)]
pub struct SkippedSheet {
    pub name: String,
    pub reason: String,
}

/// All retained sheets of one input file, keyed (and therefore ordered) by name.
#[derive(Debug, Clone, Default)]
pub struct LoadedWorkbook {
    pub path: PathBuf,
    pub sheets: BTreeMap<String, SheetData>,
    pub skipped: Vec<SkippedSheet>,
}

impl LoadedWorkbook {
    pub fn get(&self, name: &str) -> Option<&SheetData> {
        self.sheets.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    OnlyInOld,
    OnlyInNew,
    InBoth,
}

impl Classification {
    /// Value written to the "New Error?" column.
    pub fn indicator(&self) -> &'static str {
        match self {
            Classification::OnlyInNew => "Yes",
            Classification::InBoth => "No",
            Classification::OnlyInOld => "Resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCounts {
    pub only_old: usize,
    pub only_new: usize,
    pub both: usize,
}

impl DiffCounts {
    pub fn total(&self) -> usize {
        self.only_old + self.only_new + self.both
    }

    pub fn is_unchanged(&self) -> bool {
        self.only_old == 0 && self.only_new == 0
    }

    pub fn record(&mut self, class: Classification) {
        match class {
            Classification::OnlyInOld => self.only_old += 1,
            Classification::OnlyInNew => self.only_new += 1,
            Classification::InBoth => self.both += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRow {
    pub row: Row,
    pub class: Classification,
}

/// Result of comparing one sheet pair.
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    /// Comparison columns shared by every classified row.
    pub columns: Vec<String>,
    /// Every distinct row across both inputs, in first-seen order.
    pub rows: Vec<ClassifiedRow>,
    pub counts: DiffCounts,
    /// Rows to publish, with the "New Error?" column and reattached notes.
    pub visible: Table,
    /// Set when notes could not be rejoined.
    pub notes_error: Option<String>,
}

impl DiffOutcome {
    pub fn classification_of(&self, row: &Row) -> Option<Classification> {
        self.rows
            .iter()
            .find(|classified| &classified.row == row)
            .map(|classified| classified.class)
    }
}

/// Why a sheet could not be compared row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityIssue {
    Missing { column: String },
    Duplicated { column: String, count: usize },
    Configured,
}

impl fmt::Display for IdentityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityIssue::Missing { column } => write!(f, "no '{column}' column to compare"),
            IdentityIssue::Duplicated { column, count } => {
                write!(f, "{count} duplicate '{column}' rows")
            }
            IdentityIssue::Configured => write!(f, "identity column marked unreliable"),
        }
    }
}

/// What happened to one sheet name from the union of both workbooks.
#[derive(Debug, Clone)]
pub enum SheetOutcome {
    Compared {
        outcome: DiffOutcome,
        meta: MetaRows,
    },
    CarriedForward {
        table: Table,
        meta: MetaRows,
        issue: IdentityIssue,
    },
    Added {
        table: Table,
        meta: MetaRows,
    },
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SheetStatus {
    #[strum(serialize = "Complete")]
    Complete,
    #[strum(serialize = "New Error")]
    NewError,
    #[strum(serialize = "Recurring error")]
    Recurring,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryKind {
    NoLongerPresent,
    Added,
    Unchanged,
    Changed(DiffCounts),
    CarriedForward(IdentityIssue),
}

/// One line of the comparison summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    pub sheet: String,
    pub kind: SummaryKind,
    pub status: Option<SheetStatus>,
    pub assigned_to: Option<String>,
    pub description: Option<String>,
}

impl SummaryEntry {
    pub fn new(sheet: impl Into<String>, kind: SummaryKind) -> Self {
        Self {
            sheet: sheet.into(),
            kind,
            status: None,
            assigned_to: None,
            description: None,
        }
    }

    pub fn text(&self) -> String {
        let sheet = &self.sheet;
        match &self.kind {
            SummaryKind::NoLongerPresent => {
                format!("Error '{sheet}': no longer present in latest file.")
            }
            SummaryKind::Added => format!("Error '{sheet}' added to latest file."),
            SummaryKind::Unchanged => {
                format!("Error '{sheet}': exists in both files, no differences.")
            }
            SummaryKind::Changed(counts) => format!(
                "Error '{sheet}': {} rows only in old, {} rows only in new, {} rows in both.",
                counts.only_old, counts.only_new, counts.both
            ),
            SummaryKind::CarriedForward(issue) => format!(
                "Error '{sheet}' present in latest file ({issue}); no reliable comparison was possible, latest rows kept as-is."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_typed() {
        assert_ne!(CellValue::Number(1.0), CellValue::Text("1".into()));
        assert_eq!(CellValue::Number(0.0), CellValue::Number(-0.0));
        assert_eq!(CellValue::Number(f64::NAN), CellValue::Number(f64::NAN));
        assert_ne!(CellValue::Text("abc".into()), CellValue::Text("ABC".into()));
    }

    #[test]
    fn blanks_sort_last() {
        let mut values = vec![
            CellValue::Empty,
            CellValue::Text("b".into()),
            CellValue::Number(3.0),
            CellValue::Number(-1.0),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                CellValue::Number(-1.0),
                CellValue::Number(3.0),
                CellValue::Text("b".into()),
                CellValue::Empty,
            ]
        );
    }

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(CellValue::Number(2024.0).to_string(), "2024");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
    }

    #[test]
    fn project_fills_missing_columns_with_blanks() {
        let table = Table::new(
            vec!["A".into(), "B".into()],
            vec![Row::new(vec![1.0.into(), "x".into()])],
        );
        let projected = table.project(&["B".into(), "C".into()]);
        assert_eq!(projected.columns, vec!["B", "C"]);
        assert_eq!(projected.rows[0].cells, vec!["x".into(), CellValue::Empty]);
    }

    #[test]
    fn latest_description_and_link_win() {
        let old = MetaRows::new(vec![
            vec!["old description".into()],
            vec![CellValue::Empty, "keep".into(), "old link".into()],
        ]);
        let new = MetaRows::new(vec![vec!["new description".into()]]);
        let merged = old.merged_with(&new);
        assert_eq!(merged.description(), Some(&"new description".into()));
        assert_eq!(merged.link(), Some(&"old link".into()));
        assert_eq!(merged.rows[1][1], "keep".into());
    }

    #[test]
    fn summary_text_for_changed_sheet() {
        let entry = SummaryEntry::new(
            "X",
            SummaryKind::Changed(DiffCounts {
                only_old: 1,
                only_new: 1,
                both: 1,
            }),
        );
        assert_eq!(
            entry.text(),
            "Error 'X': 1 rows only in old, 1 rows only in new, 1 rows in both."
        );
    }
}
