// Excel import (first sheet) and result workbook export

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};

use gridbatch_core::OutputRecord;

use crate::error::{ExportError, InputError};

/// Name of the single worksheet in result workbooks.
pub const RESULTS_SHEET: &str = "Results";

fn parse_error(message: impl Into<String>) -> InputError {
    InputError::Parse { format: "xlsx", message: message.into() }
}

/// Read the first worksheet of an Excel file (xlsx, xls, xlsb, ods) as rows
/// of display strings.
///
/// Rows whose cells are all empty come back with zero cells.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, InputError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| parse_error(format!("Failed to open Excel file: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| parse_error("Excel file contains no sheets"))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| parse_error(format!("Failed to read sheet '{}': {}", sheet_name, e)))?;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| {
            if row.iter().all(|cell| matches!(cell, Data::Empty)) {
                Vec::new()
            } else {
                row.iter().map(cell_text).collect()
            }
        })
        .collect();

    log::debug!("read {} row(s) from sheet '{}'", rows.len(), sheet_name);
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Format nicely: integers without decimals
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{:?}", e),
        // Serial number; the id/user columns are text in practice
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Build the result workbook: one `Results` sheet, header row, one row per record.
pub fn export_bytes(records: &[OutputRecord]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    {
        let worksheet = workbook
            .add_worksheet()
            .set_name(RESULTS_SHEET)
            .map_err(|e| ExportError::Xlsx(format!("Failed to create sheet '{}': {}", RESULTS_SHEET, e)))?;

        for (col, header) in OutputRecord::HEADERS.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, *header, &header_format)
                .map_err(|e| ExportError::Xlsx(format!("Failed to write header: {}", e)))?;
        }

        for (idx, record) in records.iter().enumerate() {
            let row = (idx + 1) as u32;
            for (col, value) in record.fields().iter().enumerate() {
                worksheet
                    .write_string(row, col as u16, *value)
                    .map_err(|e| ExportError::Xlsx(format!("Failed to write row {}: {}", row + 1, e)))?;
            }
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| ExportError::Xlsx(format!("Failed to save XLSX file: {}", e)))
}
