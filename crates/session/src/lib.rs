//! `gridbatch-session`: one batch run as an explicit state machine.
//!
//! `Idle → Uploading → Submitting → Polling → Completed | Failed`
//!
//! The session owns the loaded records, the active batch id and the poll
//! timer. Front ends drive it through `load_*`, `submit_batch`, `poll_once`
//! (or `wait_for_completion`) and `download_output`, and read `is_busy` to
//! gate the submit action.

mod api;
mod error;
mod session;
pub mod timer;

pub use api::BatchApi;
pub use error::BatchError;
pub use session::{BatchSession, Phase, PollOutcome};
pub use timer::{PollTimer, TickerState};
