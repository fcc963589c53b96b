//! Sheet loading: header placement, metadata rows and exclusion of
//! non-data sheets.

use crate::config::{HeaderMode, LoaderConfig};
use crate::error::{ReconcileError, ReconcileResult};
use crate::model::{CellValue, LoadedWorkbook, MetaRows, Row, SheetData, SkippedSheet, Table};
use std::collections::BTreeMap;
use std::path::Path;
use umya_spreadsheet::reader::xlsx;
use umya_spreadsheet::{Spreadsheet, Worksheet};

pub fn open_spreadsheet(path: &Path) -> ReconcileResult<Spreadsheet> {
    if !path.is_file() {
        return Err(ReconcileError::WorkbookOpen {
            path: path.to_path_buf(),
            message: "file not found".to_string(),
        });
    }
    xlsx::read(path).map_err(|err| ReconcileError::WorkbookOpen {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Loads every retained sheet of the workbook at `path`.
///
/// A sheet that does not fit the header layout is skipped with a warning;
/// only failing to open the file itself is an error.
pub fn load(path: &Path, config: &LoaderConfig) -> ReconcileResult<LoadedWorkbook> {
    let book = open_spreadsheet(path)?;
    let mut sheets = BTreeMap::new();
    let mut skipped = Vec::new();

    for sheet in book.get_sheet_collection() {
        let name = sheet.get_name().to_string();
        if config.is_excluded(&name) {
            tracing::debug!(sheet = %name, "excluded sheet");
            continue;
        }

        match load_sheet(sheet, &config.header) {
            Ok(data) => {
                tracing::debug!(
                    sheet = %name,
                    header_row = data.header_row,
                    rows = data.table.row_count(),
                    columns = data.table.columns.len(),
                    "loaded sheet"
                );
                sheets.insert(name, data);
            }
            Err(err) => {
                tracing::warn!(sheet = %name, error = %err, "skipped sheet");
                skipped.push(SkippedSheet {
                    name,
                    reason: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        path = %path.display(),
        sheets = sheets.len(),
        skipped = skipped.len(),
        "workbook loaded"
    );

    Ok(LoadedWorkbook {
        path: path.to_path_buf(),
        sheets,
        skipped,
    })
}

pub fn load_sheet(sheet: &Worksheet, header: &HeaderMode) -> ReconcileResult<SheetData> {
    let name = sheet.get_name().to_string();
    let grid = read_grid(sheet);
    if grid.is_empty() {
        return Err(ReconcileError::sheet_shape(&name, "sheet is empty"));
    }

    let header_row = match header {
        HeaderMode::Fixed { row } => *row,
        HeaderMode::Detect { marker } => detect_header_row(&grid, marker),
    };

    let (table, meta) = split_at_header(&name, grid, header_row)?;
    Ok(SheetData {
        name,
        header_row,
        table,
        meta,
    })
}

/// Second row when it carries `marker`, otherwise the first.
pub fn detect_header_row(grid: &[Vec<CellValue>], marker: &str) -> usize {
    let marker_on_second_row = grid.get(1).is_some_and(|row| {
        row.iter()
            .any(|cell| cell.as_text().is_some_and(|text| text.trim() == marker))
    });
    if marker_on_second_row { 1 } else { 0 }
}

/// Reads a header-qualified table from a sheet whose header row is known,
/// dropping the metadata rows. Used for auxiliary lookup sheets.
pub fn read_table(sheet: &Worksheet, header_row: usize) -> ReconcileResult<Table> {
    let name = sheet.get_name().to_string();
    let grid = read_grid(sheet);
    split_at_header(&name, grid, header_row).map(|(table, _)| table)
}

fn split_at_header(
    sheet_name: &str,
    mut grid: Vec<Vec<CellValue>>,
    header_row: usize,
) -> ReconcileResult<(Table, MetaRows)> {
    if grid.len() <= header_row {
        return Err(ReconcileError::sheet_shape(
            sheet_name,
            format!(
                "expected a header on row {} but the sheet has {} rows",
                header_row + 1,
                grid.len()
            ),
        ));
    }

    let mut body = grid.split_off(header_row + 1);
    let mut header = grid.pop().unwrap_or_default();
    let meta = MetaRows::new(grid);

    if header.iter().all(CellValue::is_empty) {
        return Err(ReconcileError::sheet_shape(
            sheet_name,
            format!("header row {} is blank", header_row + 1),
        ));
    }

    // Metadata cells can widen the used range past the data columns.
    let width = (0..header.len())
        .rev()
        .find(|&idx| {
            !header[idx].is_empty()
                || body
                    .iter()
                    .any(|row| row.get(idx).is_some_and(|cell| !cell.is_empty()))
        })
        .map_or(0, |idx| idx + 1);
    header.truncate(width);
    for row in &mut body {
        row.truncate(width);
    }

    let columns: Vec<String> = header
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    let rows = body
        .into_iter()
        .map(Row::new)
        .filter(|row| !row.is_blank())
        .collect();

    Ok((Table::new(columns, rows), meta))
}

/// Dense grid of the used range, row-major, A1 at `[0][0]`.
pub fn read_grid(sheet: &Worksheet) -> Vec<Vec<CellValue>> {
    let (max_col, max_row) = sheet.get_highest_column_and_row();
    let mut grid = Vec::with_capacity(max_row as usize);
    for row in 1..=max_row {
        let mut cells = Vec::with_capacity(max_col as usize);
        for col in 1..=max_col {
            cells.push(
                sheet
                    .get_cell((col, row))
                    .map(cell_to_value)
                    .unwrap_or_default(),
            );
        }
        grid.push(cells);
    }
    grid
}

pub fn cell_to_value(cell: &umya_spreadsheet::Cell) -> CellValue {
    let raw = cell.get_value();
    if raw.is_empty() {
        return CellValue::Empty;
    }
    match cell.get_data_type() {
        "n" => raw
            .parse::<f64>()
            .map(CellValue::Number)
            .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
        "b" => CellValue::Bool(raw == "1" || raw.eq_ignore_ascii_case("true")),
        "e" => CellValue::Error(raw.to_string()),
        _ => CellValue::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_string())
    }

    #[test]
    fn marker_on_second_row_moves_header_down() {
        let grid = vec![
            vec![text("BNB001 description")],
            vec![text("Repyear"), text("SSID")],
            vec![CellValue::Number(2024.0), text("A1")],
        ];
        assert_eq!(detect_header_row(&grid, "Repyear"), 1);
        assert_eq!(detect_header_row(&grid[1..], "Repyear"), 0);
    }

    #[test]
    fn split_keeps_rows_above_header_as_metadata() -> ReconcileResult<()> {
        let grid = vec![
            vec![text("Students missing a term"), CellValue::Empty, CellValue::Empty],
            vec![CellValue::Empty, CellValue::Empty, text("https://portal/err")],
            vec![text("SSID"), CellValue::Empty, text("Comments")],
            vec![text("1"), CellValue::Number(4.0), CellValue::Empty],
            vec![CellValue::Empty, CellValue::Empty, CellValue::Empty],
            vec![text("2"), CellValue::Number(5.0), text("check")],
        ];
        let (table, meta) = split_at_header("S", grid, 2)?;
        assert_eq!(table.columns, vec!["SSID", "", "Comments"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(meta.description(), Some(&text("Students missing a term")));
        assert_eq!(meta.link(), Some(&text("https://portal/err")));
        Ok(())
    }

    #[test]
    fn link_beyond_data_columns_adds_no_column() -> ReconcileResult<()> {
        let grid = vec![
            vec![text("Majors out of range"), CellValue::Empty, CellValue::Empty],
            vec![CellValue::Empty, CellValue::Empty, text("https://portal/majors")],
            vec![text("SOCSEC1"), text("Major"), CellValue::Empty],
            vec![text("1"), text("0901"), CellValue::Empty],
        ];
        let (table, meta) = split_at_header("S", grid, 2)?;
        assert_eq!(table.columns, vec!["SOCSEC1", "Major"]);
        assert_eq!(table.rows[0].cells, vec![text("1"), text("0901")]);
        assert_eq!(meta.link(), Some(&text("https://portal/majors")));
        Ok(())
    }

    #[test]
    fn unlabelled_column_with_data_is_kept() -> ReconcileResult<()> {
        let grid = vec![
            vec![text("SOCSEC1"), CellValue::Empty],
            vec![text("1"), text("stray")],
        ];
        let (table, _) = split_at_header("S", grid, 0)?;
        assert_eq!(table.columns, vec!["SOCSEC1", ""]);
        Ok(())
    }

    #[test]
    fn short_sheet_is_a_shape_error() {
        let grid = vec![vec![text("only row")]];
        let err = split_at_header("S", grid, 2).unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("has 1 rows"));
    }

    #[test]
    fn blank_header_is_a_shape_error() {
        let grid = vec![vec![CellValue::Empty], vec![text("data")]];
        assert!(split_at_header("S", grid, 0).is_err());
    }

    #[test]
    fn numbers_and_text_keep_their_type() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_by_name_mut("Sheet1").expect("sheet");
        sheet.get_cell_mut("A1").set_value_number(1);
        sheet.get_cell_mut("B1").set_value_string("1");
        sheet.get_cell_mut("C1").set_value_bool(true);

        let sheet = book.get_sheet_by_name("Sheet1").expect("sheet");
        let grid = read_grid(sheet);
        assert_eq!(grid[0][0], CellValue::Number(1.0));
        assert_eq!(grid[0][1], text("1"));
        assert_eq!(grid[0][2], CellValue::Bool(true));
    }
}
