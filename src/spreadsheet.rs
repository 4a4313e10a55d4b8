//! Writes the market table into one named sheet of an xlsx workbook.
//!
//! The target sheet is replaced wholesale each cycle; every other sheet in the
//! workbook is carried over untouched and keeps its position.

use std::path::{Path, PathBuf};

use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::CycleError;
use crate::market_table::{MarketTable, column_headers};
use crate::storage_utils::WorkbookConfig;

/// What the target sheet looked like before a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetState {
    Populated { rows: u32 },
    Empty,
    Absent,
}

fn load_workbook(path: &Path) -> Result<Option<Spreadsheet>, CycleError> {
    if !path.try_exists()? {
        return Ok(None);
    }
    umya_spreadsheet::reader::xlsx::read(path)
        .map(Some)
        .map_err(|e| CycleError::persistence(path, e))
}

fn sheet_state(book: Option<&Spreadsheet>, sheet_name: &str) -> SheetState {
    match book.and_then(|b| b.get_sheet_by_name(sheet_name)) {
        None => SheetState::Absent,
        Some(sheet) => match sheet.get_highest_row() {
            0 => SheetState::Empty,
            rows => SheetState::Populated { rows },
        },
    }
}

/// Checks the file, then the sheet, then its rows. A file that exists but cannot be
/// read is an error, not `Absent`.
pub fn probe_sheet(path: &Path, sheet_name: &str) -> Result<SheetState, CycleError> {
    let book = load_workbook(path)?;
    Ok(sheet_state(book.as_ref(), sheet_name))
}

fn fill_sheet(sheet: &mut Worksheet, headers: &[String], table: &MarketTable) {
    for (col, header) in (1u32..).zip(headers) {
        sheet.get_cell_mut((col, 1u32)).set_value_string(header.as_str());
    }

    for (row, record) in (2u32..).zip(&table.records) {
        sheet.get_cell_mut((1u32, row)).set_value_string(record.name.as_str());
        sheet.get_cell_mut((2u32, row)).set_value_string(record.symbol.as_str());
        sheet.get_cell_mut((3u32, row)).set_value_number(record.current_price);
        sheet.get_cell_mut((4u32, row)).set_value_number(record.market_cap);
        sheet.get_cell_mut((5u32, row)).set_value_number(record.total_volume);
        if let Some(change) = record.price_change_percentage_24h {
            sheet.get_cell_mut((6u32, row)).set_value_number(change);
        }
    }
}

fn temp_path_for(path: &Path) -> Result<PathBuf, CycleError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| CycleError::persistence(path, "path has no file name"))?;
    let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
    Ok(path.with_file_name(tmp_name))
}

// Write next to the target and rename over it, so a failed write never clobbers
// the previous workbook.
fn write_atomically(book: &Spreadsheet, path: &Path) -> Result<(), CycleError> {
    let tmp_path = temp_path_for(path)?;

    if let Err(e) = umya_spreadsheet::writer::xlsx::write(book, &tmp_path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(CycleError::persistence(path, e));
    }
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Blocking write of `table` into `sheet_name`. Returns the sheet's prior state.
pub fn write_table(
    path: &Path,
    sheet_name: &str,
    headers: &[String],
    table: &MarketTable,
) -> Result<SheetState, CycleError> {
    let existing = load_workbook(path)?;
    let prior = sheet_state(existing.as_ref(), sheet_name);

    let mut book = existing.unwrap_or_else(umya_spreadsheet::new_file_empty_worksheet);

    let sheet = match prior {
        SheetState::Absent => book
            .new_sheet(sheet_name)
            .map_err(|e| CycleError::persistence(path, e))?,
        SheetState::Empty | SheetState::Populated { .. } => book
            .get_sheet_by_name_mut(sheet_name)
            .ok_or_else(|| CycleError::persistence(path, "sheet vanished while writing"))?,
    };

    if let SheetState::Populated { rows } = prior {
        sheet.remove_row(&1, &rows);
    }
    // Merges carry no cells, so they survive remove_row and can sit past the last row.
    sheet.get_merge_cells_mut().clear();
    fill_sheet(sheet, headers, table);

    write_atomically(&book, path)?;
    Ok(prior)
}

/// Persists each cycle's table into the configured workbook sheet.
pub struct SheetWriter {
    config: WorkbookConfig,
    headers: [String; 6],
}

impl SheetWriter {
    pub fn new(config: WorkbookConfig, currency: &str) -> Self {
        Self {
            config,
            headers: column_headers(currency),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub async fn persist(&self, table: MarketTable) -> Result<SheetState, CycleError> {
        let path = self.config.path.clone();
        let sheet_name = self.config.sheet_name.clone();
        let headers = self.headers.clone();

        tokio::task::spawn_blocking(move || write_table(&path, &sheet_name, &headers, &table))
            .await?
    }
}
