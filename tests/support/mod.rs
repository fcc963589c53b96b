#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sheet_reconcile::config::LoaderConfig;
use sheet_reconcile::model::{CellValue, LoadedWorkbook, Table};
use sheet_reconcile::workbook;
use tempfile::{TempDir, tempdir};
use umya_spreadsheet::{self, Spreadsheet, Worksheet};

pub fn write_workbook_to_path<F>(path: &Path, f: F)
where
    F: FnOnce(&mut Spreadsheet),
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dir");
    }
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    f(&mut book);
    umya_spreadsheet::writer::xlsx::write(&book, path).expect("write workbook");
}

pub struct TestWorkspace {
    _tempdir: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let tempdir = tempdir().expect("tempdir");
        let root = tempdir.path().to_path_buf();
        Self {
            _tempdir: tempdir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn create_workbook<F>(&self, name: &str, f: F) -> PathBuf
    where
        F: FnOnce(&mut Spreadsheet),
    {
        let path = self.path(name);
        write_workbook_to_path(&path, f);
        path
    }
}

pub fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

pub fn num(value: f64) -> CellValue {
    CellValue::Number(value)
}

/// Adds a sheet laid out like an error export: description in A1, reference
/// link in C2, header on row 3, data below.
pub fn add_error_sheet(
    book: &mut Spreadsheet,
    name: &str,
    description: &str,
    columns: &[&str],
    rows: &[Vec<CellValue>],
) {
    let sheet = book.new_sheet(name).expect("new sheet");
    sheet.get_cell_mut((1u32, 1u32)).set_value_string(description);
    sheet
        .get_cell_mut((3u32, 2u32))
        .set_value_string(format!("https://reports.example.edu/errors/{name}"));
    write_rows(sheet, 3, columns, rows);
}

/// Adds a sheet with its header on the first row.
pub fn add_plain_sheet(
    book: &mut Spreadsheet,
    name: &str,
    columns: &[&str],
    rows: &[Vec<CellValue>],
) {
    let sheet = book.new_sheet(name).expect("new sheet");
    write_rows(sheet, 1, columns, rows);
}

fn write_rows(sheet: &mut Worksheet, header_row: u32, columns: &[&str], rows: &[Vec<CellValue>]) {
    for (idx, label) in columns.iter().enumerate() {
        sheet
            .get_cell_mut((idx as u32 + 1, header_row))
            .set_value_string(*label);
    }
    for (row_idx, row) in rows.iter().enumerate() {
        let row_num = header_row + 1 + row_idx as u32;
        for (col_idx, value) in row.iter().enumerate() {
            let cell = sheet.get_cell_mut((col_idx as u32 + 1, row_num));
            match value {
                CellValue::Empty => {}
                CellValue::Text(s) | CellValue::Error(s) => {
                    cell.set_value_string(s.as_str());
                }
                CellValue::Number(n) => {
                    cell.set_value_number(*n);
                }
                CellValue::Bool(b) => {
                    cell.set_value_bool(*b);
                }
            }
        }
    }
}

pub fn load_output(path: &Path) -> LoadedWorkbook {
    workbook::load(path, &LoaderConfig::default()).expect("load output")
}

pub fn read_output(path: &Path) -> Spreadsheet {
    umya_spreadsheet::reader::xlsx::read(path).expect("read output")
}

/// Header-on-row-one table of `sheet_name`.
pub fn sheet_table(book: &Spreadsheet, sheet_name: &str) -> Table {
    let sheet = book.get_sheet_by_name(sheet_name).expect("sheet present");
    workbook::read_table(sheet, 0).expect("table")
}

pub fn column(table: &Table, label: &str) -> Vec<String> {
    let idx = table
        .column_index(label)
        .unwrap_or_else(|| panic!("column {label} in {:?}", table.columns));
    table.rows.iter().map(|row| row.get(idx).to_string()).collect()
}
