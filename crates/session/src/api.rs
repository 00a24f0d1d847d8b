// Remote calls the session depends on

use gridbatch_openai::{ApiError, BatchObject, FileObject, OpenAiClient};

/// The four batch endpoints plus a credential check.
///
/// Implemented by [`OpenAiClient`]; tests substitute scripted fakes.
pub trait BatchApi {
    fn has_credentials(&self) -> bool;
    fn upload_batch_file(&self, jsonl: &str) -> Result<FileObject, ApiError>;
    fn create_batch(&self, input_file_id: &str, endpoint: &str) -> Result<BatchObject, ApiError>;
    fn retrieve_batch(&self, batch_id: &str) -> Result<BatchObject, ApiError>;
    fn file_content(&self, file_id: &str) -> Result<String, ApiError>;
}

impl BatchApi for OpenAiClient {
    fn has_credentials(&self) -> bool {
        self.has_token()
    }

    fn upload_batch_file(&self, jsonl: &str) -> Result<FileObject, ApiError> {
        OpenAiClient::upload_batch_file(self, jsonl)
    }

    fn create_batch(&self, input_file_id: &str, endpoint: &str) -> Result<BatchObject, ApiError> {
        OpenAiClient::create_batch(self, input_file_id, endpoint)
    }

    fn retrieve_batch(&self, batch_id: &str) -> Result<BatchObject, ApiError> {
        OpenAiClient::retrieve_batch(self, batch_id)
    }

    fn file_content(&self, file_id: &str) -> Result<String, ApiError> {
        OpenAiClient::file_content(self, file_id)
    }
}
