use std::path::PathBuf;

/// Failure turning a source file into input records.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The byte stream could not be read as the declared format.
    #[error("failed to parse {format} file: {message}")]
    Parse { format: &'static str, message: String },

    /// Fewer than two rows (header plus at least one data row).
    #[error("input file is empty: a header row and at least one data row are required")]
    EmptyInput,

    /// The header row lacks `id` and/or `user`.
    #[error("input must contain \"id\" and \"user\" columns (missing: {})", .missing.join(", "))]
    MissingColumn { missing: Vec<&'static str> },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure serializing or writing a result artifact.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to build XLSX workbook: {0}")]
    Xlsx(String),

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
