//! Error taxonomy for a reconciliation run.
//!
//! Sheet-scoped failures (`SheetShape`, `NotesMerge`) are recovered where they
//! occur and only logged; everything else aborts the run.

use std::path::PathBuf;
use thiserror::Error;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Input workbook missing or unreadable
    #[error("failed to open workbook {path:?}: {message}")]
    WorkbookOpen { path: PathBuf, message: String },

    /// Output workbook could not be produced
    #[error("failed to write workbook {path:?}: {message}")]
    WorkbookWrite { path: PathBuf, message: String },

    /// Sheet structure does not fit the expected header layout
    #[error("sheet '{sheet}' has an unexpected shape: {reason}")]
    SheetShape { sheet: String, reason: String },

    /// Extracted notes could not be joined back by identity
    #[error("could not reattach notes on sheet '{sheet}': {reason}")]
    NotesMerge { sheet: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operator dismissed the file prompt
    #[error("no {0} file selected")]
    NoSelection(String),
}

impl ReconcileError {
    pub fn sheet_shape(sheet: impl Into<String>, reason: impl Into<String>) -> Self {
        ReconcileError::SheetShape {
            sheet: sheet.into(),
            reason: reason.into(),
        }
    }

    pub fn notes_merge(sheet: impl Into<String>, reason: impl Into<String>) -> Self {
        ReconcileError::NotesMerge {
            sheet: sheet.into(),
            reason: reason.into(),
        }
    }

    /// Whether the run may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReconcileError::SheetShape { .. } | ReconcileError::NotesMerge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_scoped_errors_are_recoverable() {
        assert!(ReconcileError::sheet_shape("X", "empty").is_recoverable());
        assert!(ReconcileError::notes_merge("X", "conflict").is_recoverable());
        assert!(
            !ReconcileError::WorkbookOpen {
                path: PathBuf::from("a.xlsx"),
                message: "missing".into(),
            }
            .is_recoverable()
        );
        assert!(!ReconcileError::NoSelection("first".into()).is_recoverable());
    }

    #[test]
    fn messages_name_the_sheet() {
        let err = ReconcileError::sheet_shape("BNB001W03", "header row is blank");
        assert_eq!(
            err.to_string(),
            "sheet 'BNB001W03' has an unexpected shape: header row is blank"
        );
    }
}
