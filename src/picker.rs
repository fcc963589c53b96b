//! Interactive selection of the two input workbooks.

use crate::error::{ReconcileError, ReconcileResult};
use std::path::PathBuf;

/// Asks the operator for a file. `which` names the file being asked for
/// ("first", "second").
pub trait FilePicker {
    fn pick(&self, which: &str) -> ReconcileResult<PathBuf>;
}

/// Terminal prompt reading a path.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptPicker;

impl FilePicker for PromptPicker {
    fn pick(&self, which: &str) -> ReconcileResult<PathBuf> {
        let answer: String = dialoguer::Input::new()
            .with_prompt(format!("Path to the {which} workbook"))
            .allow_empty(true)
            .interact_text()
            .map_err(|err| {
                tracing::warn!(error = %err, "file prompt failed");
                ReconcileError::NoSelection(which.to_string())
            })?;
        selection(which, answer)
    }
}

/// Native file dialog restricted to workbooks.
#[cfg(feature = "dialog")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DialogPicker;

#[cfg(feature = "dialog")]
impl FilePicker for DialogPicker {
    fn pick(&self, which: &str) -> ReconcileResult<PathBuf> {
        rfd::FileDialog::new()
            .set_title(format!("Select the {which} Excel file"))
            .add_filter("Excel", &["xlsx", "xlsm"])
            .pick_file()
            .ok_or_else(|| ReconcileError::NoSelection(which.to_string()))
    }
}

/// Fixed answers, for scripted runs.
#[derive(Debug, Clone, Default)]
pub struct PresetPicker {
    pub first: Option<PathBuf>,
    pub second: Option<PathBuf>,
}

impl FilePicker for PresetPicker {
    fn pick(&self, which: &str) -> ReconcileResult<PathBuf> {
        let chosen = match which {
            "first" => self.first.clone(),
            "second" => self.second.clone(),
            _ => None,
        };
        chosen.ok_or_else(|| ReconcileError::NoSelection(which.to_string()))
    }
}

pub fn default_picker() -> Box<dyn FilePicker> {
    #[cfg(feature = "dialog")]
    {
        Box::new(DialogPicker)
    }
    #[cfg(not(feature = "dialog"))]
    {
        Box::new(PromptPicker)
    }
}

fn selection(which: &str, answer: String) -> ReconcileResult<PathBuf> {
    let trimmed = answer.trim().trim_matches(|c| c == '"' || c == '\'');
    if trimmed.is_empty() {
        return Err(ReconcileError::NoSelection(which.to_string()));
    }
    Ok(PathBuf::from(trimmed))
}
