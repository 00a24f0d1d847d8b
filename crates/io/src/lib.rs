// File I/O: tabular input -> records, records -> result artifacts

pub mod csv;
pub mod export;
pub mod normalize;
pub mod xlsx;
mod error;

use std::path::Path;

use gridbatch_core::InputRecord;

pub use error::{ExportError, InputError};
pub use export::{render, Artifact};
pub use gridbatch_core::OutputFormat;

/// Declared format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Xlsx,
}

impl InputFormat {
    /// `.xlsx` / `.xls` (any case) are spreadsheets; everything else is read as CSV text.
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") | Some("xls") => InputFormat::Xlsx,
            _ => InputFormat::Csv,
        }
    }
}

/// Records loaded from one input file.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    /// File name without its last extension; prefixes the result artifact name.
    pub base_name: String,
    pub format: InputFormat,
    pub records: Vec<InputRecord>,
}

/// File name with the last extension removed (`prompts.v2.csv` -> `prompts.v2`).
pub fn base_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

/// Tabular parser: raw bytes -> ordered rows of string cells.
///
/// Fails with [`InputError::EmptyInput`] when fewer than two rows with any
/// cells (header plus one data row) are present. Empty lines do not count.
pub fn parse_rows(bytes: &[u8], format: InputFormat) -> Result<Vec<Vec<String>>, InputError> {
    let rows = match format {
        InputFormat::Csv => csv::parse_rows(&csv::decode(bytes)),
        InputFormat::Xlsx => xlsx::read_rows(bytes)?,
    };

    if rows.iter().filter(|r| !r.is_empty()).count() < 2 {
        return Err(InputError::EmptyInput);
    }

    Ok(rows)
}

/// Parse and normalize an in-memory file.
pub fn load_bytes(file_name: &str, bytes: &[u8]) -> Result<LoadedInput, InputError> {
    let format = InputFormat::from_file_name(file_name);
    let rows = parse_rows(bytes, format)?;
    let records = normalize::normalize(&rows)?;

    log::info!("loaded {} record(s) from {}", records.len(), file_name);

    Ok(LoadedInput {
        base_name: base_name(file_name),
        format,
        records,
    })
}

/// Read, parse and normalize a file from disk.
pub fn load_path(path: &Path) -> Result<LoadedInput, InputError> {
    let bytes = std::fs::read(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    load_bytes(&file_name, &bytes)
}
