//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, bad flag mix) |
//! | 3-9     | input / output   | Reading the input file, writing results  |
//! | 10-19   | config           | Settings, templates, API key, keychain   |
//! | 20-29   | batch            | Remote batch lifecycle                   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `batch_exit_code` if it comes from a session error

use gridbatch_io::InputError;
use gridbatch_session::BatchError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, conflicting options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Input / output (3-9)
// =============================================================================

/// Input file missing or unreadable.
pub const EXIT_INPUT_READ: u8 = 3;

/// Input file could not be parsed (corrupt spreadsheet).
pub const EXIT_INPUT_PARSE: u8 = 4;

/// Input has a header but no data rows.
pub const EXIT_INPUT_EMPTY: u8 = 5;

/// Header lacks the `id` and/or `user` column.
pub const EXIT_INPUT_COLUMNS: u8 = 6;

/// Result artifact could not be rendered or written.
pub const EXIT_OUTPUT_WRITE: u8 = 7;

// =============================================================================
// Config (10-19)
// =============================================================================

/// Settings value rejected, or settings file could not be written.
pub const EXIT_CONFIG_INVALID: u8 = 10;

/// No API key from flag, environment or keychain.
pub const EXIT_MISSING_KEY: u8 = 11;

/// Keychain error (cannot read/write credentials).
pub const EXIT_KEYCHAIN: u8 = 12;

/// Named template does not exist.
pub const EXIT_TEMPLATE_NOT_FOUND: u8 = 13;

// =============================================================================
// Batch (20-29)
// =============================================================================

/// Input file upload rejected or unreachable.
pub const EXIT_BATCH_UPLOAD: u8 = 20;

/// Batch creation rejected.
pub const EXIT_BATCH_SUBMIT: u8 = 21;

/// Status check failed (HTTP or network). Polling stops.
pub const EXIT_BATCH_POLL: u8 = 22;

/// Batch reached `failed`, `expired` or `cancelled`.
pub const EXIT_BATCH_FAILED: u8 = 23;

/// Batch completed without an output file.
pub const EXIT_BATCH_NO_OUTPUT: u8 = 24;

/// Output file download failed.
pub const EXIT_BATCH_DOWNLOAD: u8 = 25;

/// Output file contained a malformed JSON line.
pub const EXIT_BATCH_RESULT_PARSE: u8 = 26;

/// Map an input loading error to its exit code.
pub fn input_exit_code(err: &InputError) -> u8 {
    match err {
        InputError::Io { .. } => EXIT_INPUT_READ,
        InputError::Parse { .. } => EXIT_INPUT_PARSE,
        InputError::EmptyInput => EXIT_INPUT_EMPTY,
        InputError::MissingColumn { .. } => EXIT_INPUT_COLUMNS,
    }
}

/// Map a session error to its exit code.
pub fn batch_exit_code(err: &BatchError) -> u8 {
    match err {
        BatchError::Input(e) => input_exit_code(e),
        BatchError::Validation(_) => EXIT_USAGE,
        BatchError::Upload(_) => EXIT_BATCH_UPLOAD,
        BatchError::Submission(_) => EXIT_BATCH_SUBMIT,
        BatchError::Poll(_) => EXIT_BATCH_POLL,
        BatchError::Terminal { .. } => EXIT_BATCH_FAILED,
        BatchError::MissingOutput { .. } => EXIT_BATCH_NO_OUTPUT,
        BatchError::Download(_) => EXIT_BATCH_DOWNLOAD,
        BatchError::ResultParse(_) => EXIT_BATCH_RESULT_PARSE,
        BatchError::Export(_) => EXIT_OUTPUT_WRITE,
    }
}
