// Result artifacts: naming, rendering, writing

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use gridbatch_core::{OutputFormat, OutputRecord};

use crate::error::ExportError;

/// A rendered, downloadable result file.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Write into `dir` under the artifact's own file name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes).map_err(|source| ExportError::Io { path: path.clone(), source })?;
        log::info!("wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// ISO-8601 timestamp made filesystem-safe: `:` and `.` become `-`,
/// truncated to seconds (`2024-05-01T09-30-15`).
pub fn timestamp_slug(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
        .chars()
        .take(19)
        .collect()
}

/// `{base}_results_{timestamp}.{ext}`
pub fn artifact_name(base_name: &str, format: OutputFormat, now: DateTime<Utc>) -> String {
    format!("{}_results_{}.{}", base_name, timestamp_slug(now), format.extension())
}

/// Serialize the records in `format` and name the artifact after the input.
pub fn render(
    records: &[OutputRecord],
    base_name: &str,
    format: OutputFormat,
    now: DateTime<Utc>,
) -> Result<Artifact, ExportError> {
    let bytes = match format {
        OutputFormat::Csv => crate::csv::export_bytes(records),
        OutputFormat::Xlsx => crate::xlsx::export_bytes(records)?,
    };

    Ok(Artifact {
        file_name: artifact_name(base_name, format, now),
        format,
        bytes,
    })
}
