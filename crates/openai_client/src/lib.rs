//! Batch API client: the four calls a batch run needs.
//!
//! This crate is the single source of truth for the remote wire contract:
//! upload input file, create batch, retrieve batch, download file content.
//!
//! No retries. No polling loop (the session owns the timer). No UI concepts.

mod client;

pub use client::{
    api_error_message, ApiError, BatchObject, BatchStatus, FileObject, OpenAiClient, RequestCounts,
    BATCH_FILE_NAME, COMPLETION_WINDOW, DEFAULT_API_BASE,
};
