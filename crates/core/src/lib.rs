//! `gridbatch-core`: records, batch request lines, result reconciliation.
//!
//! Pure crate: no file or network I/O. Callers hand in parsed records and
//! raw output-file text; everything here is deterministic.

pub mod model;
pub mod reconcile;
pub mod request;

pub use model::{BatchRequestLine, ChatMessage, InputRecord, OutputFormat, OutputRecord, RequestBody, ResultRecord};
pub use reconcile::{parse_results, reconcile, ReconcileSummary, ResultParseError};
pub use request::{build_jsonl, build_requests, RequestConfig};

/// Endpoint every request line (and the batch itself) is bound to.
pub const CHAT_COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";

/// Correlation id for the record at `index` (0-based) in input order.
pub fn custom_id(index: usize) -> String {
    format!("request-{}", index + 1)
}
