use gridbatch_core::ResultParseError;
use gridbatch_io::{ExportError, InputError};
use gridbatch_openai::{ApiError, BatchStatus};

/// Everything that can stop a batch run.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Input(#[from] InputError),

    /// Precondition not met; the session state is unchanged.
    #[error("{0}")]
    Validation(String),

    #[error("file upload failed: {0}")]
    Upload(#[source] ApiError),

    #[error("batch creation failed: {0}")]
    Submission(#[source] ApiError),

    #[error("status check failed: {0}")]
    Poll(#[source] ApiError),

    #[error("output download failed: {0}")]
    Download(#[source] ApiError),

    #[error("batch {batch_id} completed without an output file")]
    MissingOutput { batch_id: String },

    #[error("batch {batch_id} ended with status '{status}'")]
    Terminal { batch_id: String, status: BatchStatus },

    #[error("malformed batch output: {0}")]
    ResultParse(#[from] ResultParseError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
