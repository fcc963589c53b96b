use std::path::{Path, PathBuf};

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<old stem>_<new stem>.xlsx`, placed next to the old file.
pub fn output_path_for(old: &Path, new: &Path) -> PathBuf {
    let name = format!("{}_{}.xlsx", file_stem(old), file_stem(new));
    match old.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _ => PathBuf::from(name),
    }
}

/// In-document `HYPERLINK` formula (without the leading `=`) to cell A1 of
/// `sheet_name`, displaying `label`.
pub fn sheet_link_formula(sheet_name: &str, label: &str) -> String {
    let target = sheet_name.replace('\'', "''").replace('"', "\"\"");
    let label = label.replace('"', "\"\"");
    format!("HYPERLINK(\"#'{target}'!A1\", \"{label}\")")
}

pub fn path_to_forward_slashes(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if raw.contains('\\') {
        raw.replace('\\', "/")
    } else {
        raw.into_owned()
    }
}
