// Batch lifecycle controller

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gridbatch_core::{build_jsonl, reconcile, InputRecord, OutputFormat, RequestConfig, CHAT_COMPLETIONS_ENDPOINT};
use gridbatch_io::{render, Artifact, LoadedInput};
use gridbatch_openai::{BatchObject, BatchStatus};

use crate::api::BatchApi;
use crate::error::BatchError;
use crate::timer::PollTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Uploading,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Uploading => "uploading",
            Phase::Submitting => "submitting",
            Phase::Polling => "polling",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of a single status check that did not end the run in failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Still running; the timer keeps going.
    Pending(BatchStatus),
    /// Output is ready for [`BatchSession::download_output`].
    Completed { output_file_id: String },
}

/// State of one batch run.
pub struct BatchSession<A: BatchApi> {
    api: A,
    poll_interval: Duration,
    phase: Phase,
    input: Option<LoadedInput>,
    batch_id: Option<String>,
    output_file_id: Option<String>,
    timer: Option<PollTimer>,
}

impl<A: BatchApi> BatchSession<A> {
    pub fn new(api: A, poll_interval: Duration) -> Self {
        Self {
            api,
            poll_interval,
            phase: Phase::Idle,
            input: None,
            batch_id: None,
            output_file_id: None,
            timer: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn batch_id(&self) -> Option<&str> {
        self.batch_id.as_deref()
    }

    pub fn records(&self) -> &[InputRecord] {
        self.input.as_ref().map(|i| i.records.as_slice()).unwrap_or(&[])
    }

    /// True while a run is in flight; the submit action should be disabled.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Uploading | Phase::Submitting | Phase::Polling)
    }

    pub fn timer_active(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| t.is_active())
    }

    // ── Input ───────────────────────────────────────────────────────

    /// Replace the loaded records. Returns the record count.
    pub fn load_input(&mut self, input: LoadedInput) -> Result<usize, BatchError> {
        if self.is_busy() {
            return Err(BatchError::Validation("cannot load input while a batch is in progress".to_string()));
        }
        let count = input.records.len();
        self.input = Some(input);
        self.reset();
        Ok(count)
    }

    pub fn load_path(&mut self, path: &Path) -> Result<usize, BatchError> {
        let input = gridbatch_io::load_path(path)?;
        self.load_input(input)
    }

    pub fn load_bytes(&mut self, file_name: &str, bytes: &[u8]) -> Result<usize, BatchError> {
        let input = gridbatch_io::load_bytes(file_name, bytes)?;
        self.load_input(input)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Upload the request lines, create the batch and start the poll timer.
    ///
    /// Validation failures leave the session untouched. A previous run's
    /// timer is cancelled first, so at most one poller exists.
    pub fn submit_batch(&mut self, config: &RequestConfig) -> Result<String, BatchError> {
        let records = self.records();
        if records.is_empty() {
            return Err(BatchError::Validation("no input records loaded".to_string()));
        }
        if !self.api.has_credentials() {
            return Err(BatchError::Validation("an API key is required".to_string()));
        }

        let jsonl = build_jsonl(records, config)
            .map_err(|e| BatchError::Validation(format!("failed to build request lines: {}", e)))?;
        let count = records.len();

        self.cancel_timer();
        self.reset();

        self.transition(Phase::Uploading);
        let file = match self.api.upload_batch_file(&jsonl) {
            Ok(file) => file,
            Err(e) => {
                self.transition(Phase::Failed);
                return Err(BatchError::Upload(e));
            }
        };
        log::info!("uploaded {} request(s) as {}", count, file.id);

        self.transition(Phase::Submitting);
        let batch = match self.api.create_batch(&file.id, CHAT_COMPLETIONS_ENDPOINT) {
            Ok(batch) => batch,
            Err(e) => {
                self.transition(Phase::Failed);
                return Err(BatchError::Submission(e));
            }
        };
        log::info!("created batch {} ({})", batch.id, batch.status);

        self.batch_id = Some(batch.id.clone());
        self.transition(Phase::Polling);
        self.timer = Some(PollTimer::start(self.poll_interval));
        Ok(batch.id)
    }

    /// One status check.
    ///
    /// `completed` stops the timer and records the output file;
    /// `failed`, `expired` and `cancelled` stop the timer and fail the run;
    /// anything else keeps polling. A request error is fatal for the run.
    pub fn poll_once(&mut self) -> Result<PollOutcome, BatchError> {
        let batch = self.poll_status()?;
        let batch_id = batch.id.clone();

        if batch.status == BatchStatus::Completed {
            self.cancel_timer();
            return match batch.output_file_id {
                Some(output_file_id) => {
                    self.output_file_id = Some(output_file_id.clone());
                    self.transition(Phase::Completed);
                    Ok(PollOutcome::Completed { output_file_id })
                }
                None => {
                    self.transition(Phase::Failed);
                    Err(BatchError::MissingOutput { batch_id })
                }
            };
        }

        if batch.status.is_failure() {
            self.cancel_timer();
            self.transition(Phase::Failed);
            return Err(BatchError::Terminal { batch_id, status: batch.status });
        }

        Ok(PollOutcome::Pending(batch.status))
    }

    fn poll_status(&mut self) -> Result<BatchObject, BatchError> {
        let batch_id = match (&self.phase, &self.batch_id) {
            (Phase::Polling, Some(id)) => id.clone(),
            _ => return Err(BatchError::Validation("no batch is being polled".to_string())),
        };

        match self.api.retrieve_batch(&batch_id) {
            Ok(batch) => {
                log::info!("batch {} status: {}", batch_id, batch.status);
                Ok(batch)
            }
            Err(e) => {
                self.cancel_timer();
                self.transition(Phase::Failed);
                Err(BatchError::Poll(e))
            }
        }
    }

    /// Poll on every timer tick until the batch leaves the running states.
    ///
    /// `on_pending` sees every non-terminal status. Returns the output file id.
    pub fn wait_for_completion<F>(&mut self, mut on_pending: F) -> Result<String, BatchError>
    where
        F: FnMut(&BatchStatus),
    {
        loop {
            let ticked = self.timer.as_ref().is_some_and(|t| t.wait_tick());
            if !ticked {
                return Err(BatchError::Validation("no batch is being polled".to_string()));
            }
            match self.poll_once()? {
                PollOutcome::Completed { output_file_id } => return Ok(output_file_id),
                PollOutcome::Pending(status) => on_pending(&status),
            }
        }
    }

    /// Fetch the output file, reconcile it against the loaded records and
    /// render the result artifact.
    pub fn download_output(&mut self, format: OutputFormat, now: DateTime<Utc>) -> Result<Artifact, BatchError> {
        let (output_file_id, input) = match (&self.phase, &self.output_file_id, &self.input) {
            (Phase::Completed, Some(id), Some(input)) => (id.clone(), input),
            _ => return Err(BatchError::Validation("no completed batch to download".to_string())),
        };

        let text = self.api.file_content(&output_file_id).map_err(BatchError::Download)?;
        log::debug!("downloaded {} ({} bytes)", output_file_id, text.len());

        let (rows, summary) = reconcile(&input.records, &text)?;
        log::info!(
            "reconciled {} record(s): {} matched, {} missing, {} with errors",
            rows.len(),
            summary.matched,
            summary.missing,
            summary.errored
        );

        Ok(render(&rows, &input.base_name, format, now)?)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn transition(&mut self, next: Phase) {
        log::debug!("session {} -> {}", self.phase, next);
        self.phase = next;
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.batch_id = None;
        self.output_file_id = None;
    }

    fn cancel_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gridbatch_io::InputFormat;
    use gridbatch_openai::{ApiError, FileObject};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Scripted remote: statuses are handed out one per retrieve call.
    #[derive(Default)]
    struct FakeApi {
        token: bool,
        fail_upload: bool,
        fail_create: bool,
        statuses: RefCell<VecDeque<Result<BatchObject, ApiError>>>,
        output: String,
        uploads: RefCell<Vec<String>>,
        downloads: Cell<usize>,
    }

    impl FakeApi {
        fn with_statuses(statuses: Vec<Result<BatchObject, ApiError>>) -> Self {
            FakeApi {
                token: true,
                statuses: RefCell::new(statuses.into()),
                ..Default::default()
            }
        }
    }

    impl BatchApi for FakeApi {
        fn has_credentials(&self) -> bool {
            self.token
        }

        fn upload_batch_file(&self, jsonl: &str) -> Result<FileObject, ApiError> {
            if self.fail_upload {
                return Err(ApiError::Http(401, "Incorrect API key provided".into()));
            }
            self.uploads.borrow_mut().push(jsonl.to_string());
            Ok(FileObject { id: "file-in".into(), filename: None, purpose: Some("batch".into()) })
        }

        fn create_batch(&self, input_file_id: &str, endpoint: &str) -> Result<BatchObject, ApiError> {
            assert_eq!(input_file_id, "file-in");
            assert_eq!(endpoint, "/v1/chat/completions");
            if self.fail_create {
                return Err(ApiError::Http(400, "bad endpoint".into()));
            }
            Ok(batch("validating", None))
        }

        fn retrieve_batch(&self, _batch_id: &str) -> Result<BatchObject, ApiError> {
            self.statuses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(batch("in_progress", None)))
        }

        fn file_content(&self, _file_id: &str) -> Result<String, ApiError> {
            self.downloads.set(self.downloads.get() + 1);
            Ok(self.output.clone())
        }
    }

    fn batch(status: &str, output: Option<&str>) -> BatchObject {
        BatchObject {
            id: "batch_1".into(),
            status: BatchStatus::from(status),
            input_file_id: Some("file-in".into()),
            output_file_id: output.map(String::from),
            error_file_id: None,
            request_counts: None,
        }
    }

    fn input(n: usize) -> LoadedInput {
        LoadedInput {
            base_name: "prompts".into(),
            format: InputFormat::Csv,
            records: (1..=n).map(|i| InputRecord::new(i.to_string(), format!("question {}", i))).collect(),
        }
    }

    fn config() -> RequestConfig {
        RequestConfig {
            model: "gpt-3.5-turbo-0125".into(),
            temperature: Some("0.7".into()),
            max_tokens: Some("1000".into()),
            system_message: "Answer briefly.".into(),
        }
    }

    fn session(api: FakeApi) -> BatchSession<FakeApi> {
        BatchSession::new(api, Duration::from_millis(10))
    }

    fn result_line(n: usize, content: &str) -> String {
        serde_json::json!({
            "custom_id": format!("request-{}", n),
            "response": { "status_code": 200, "body": { "choices": [{ "message": { "role": "assistant", "content": content } }] } }
        })
        .to_string()
    }

    #[test]
    fn test_submit_requires_records() {
        let mut s = session(FakeApi::with_statuses(vec![]));
        let err = s.submit_batch(&config()).unwrap_err();
        assert!(matches!(err, BatchError::Validation(_)));
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.api().uploads.borrow().is_empty());
    }

    #[test]
    fn test_submit_requires_key() {
        let mut s = session(FakeApi::default());
        s.load_input(input(1)).unwrap();
        let err = s.submit_batch(&config()).unwrap_err();
        assert!(matches!(err, BatchError::Validation(_)));
        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.timer_active());
    }

    #[test]
    fn test_submit_starts_polling() {
        let mut s = session(FakeApi::with_statuses(vec![]));
        s.load_input(input(2)).unwrap();

        let id = s.submit_batch(&config()).unwrap();
        assert_eq!(id, "batch_1");
        assert_eq!(s.phase(), Phase::Polling);
        assert!(s.is_busy());
        assert!(s.timer_active());

        let uploads = s.api().uploads.borrow();
        assert_eq!(uploads[0].lines().count(), 2);
        assert!(uploads[0].contains("\"custom_id\":\"request-2\""));
    }

    #[test]
    fn test_upload_failure() {
        let mut api = FakeApi::with_statuses(vec![]);
        api.fail_upload = true;
        let mut s = session(api);
        s.load_input(input(1)).unwrap();

        let err = s.submit_batch(&config()).unwrap_err();
        assert!(matches!(err, BatchError::Upload(ApiError::Http(401, _))));
        assert_eq!(s.phase(), Phase::Failed);
        assert!(!s.is_busy());
        assert!(!s.timer_active());
    }

    #[test]
    fn test_submission_failure() {
        let mut api = FakeApi::with_statuses(vec![]);
        api.fail_create = true;
        let mut s = session(api);
        s.load_input(input(1)).unwrap();

        let err = s.submit_batch(&config()).unwrap_err();
        assert!(matches!(err, BatchError::Submission(_)));
        assert_eq!(s.phase(), Phase::Failed);
        assert!(s.batch_id().is_none());
    }

    #[test]
    fn test_in_progress_keeps_timer_active() {
        let mut s = session(FakeApi::with_statuses(vec![Ok(batch("in_progress", None))]));
        s.load_input(input(1)).unwrap();
        s.submit_batch(&config()).unwrap();

        let outcome = s.poll_once().unwrap();
        assert_eq!(outcome, PollOutcome::Pending(BatchStatus::InProgress));
        assert!(s.timer_active());
        assert_eq!(s.phase(), Phase::Polling);
    }

    #[test]
    fn test_expired_stops_timer_without_download() {
        let mut s = session(FakeApi::with_statuses(vec![Ok(batch("expired", None))]));
        s.load_input(input(1)).unwrap();
        s.submit_batch(&config()).unwrap();

        let err = s.poll_once().unwrap_err();
        match err {
            BatchError::Terminal { status, .. } => assert_eq!(status, BatchStatus::Expired),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!s.timer_active());
        assert_eq!(s.phase(), Phase::Failed);
        assert_eq!(s.api().downloads.get(), 0);

        let err = s.download_output(OutputFormat::Csv, Utc::now()).unwrap_err();
        assert!(matches!(err, BatchError::Validation(_)));
        assert_eq!(s.api().downloads.get(), 0);
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut s = session(FakeApi::with_statuses(vec![
            Ok(batch("cancelling", None)),
            Ok(batch("cancelled", None)),
        ]));
        s.load_input(input(1)).unwrap();
        s.submit_batch(&config()).unwrap();

        assert_eq!(s.poll_once().unwrap(), PollOutcome::Pending(BatchStatus::Cancelling));
        assert!(matches!(s.poll_once(), Err(BatchError::Terminal { .. })));
        assert!(!s.timer_active());
    }

    #[test]
    fn test_poll_error_is_fatal() {
        let mut s = session(FakeApi::with_statuses(vec![Err(ApiError::Network("connection reset".into()))]));
        s.load_input(input(1)).unwrap();
        s.submit_batch(&config()).unwrap();

        assert!(matches!(s.poll_once(), Err(BatchError::Poll(ApiError::Network(_)))));
        assert_eq!(s.phase(), Phase::Failed);
        assert!(!s.timer_active());
        assert!(matches!(s.poll_once(), Err(BatchError::Validation(_))));
    }

    #[test]
    fn test_completed_without_output_file() {
        let mut s = session(FakeApi::with_statuses(vec![Ok(batch("completed", None))]));
        s.load_input(input(1)).unwrap();
        s.submit_batch(&config()).unwrap();

        assert!(matches!(s.poll_once(), Err(BatchError::MissingOutput { .. })));
        assert_eq!(s.phase(), Phase::Failed);
    }

    #[test]
    fn test_end_to_end_partial_results() {
        let mut api = FakeApi::with_statuses(vec![
            Ok(batch("validating", None)),
            Ok(batch("in_progress", None)),
            Ok(batch("finalizing", None)),
            Ok(batch("completed", Some("file-out"))),
        ]);
        api.output = format!("{}\n{}\n", result_line(3, "third"), result_line(1, "first"));
        let mut s = session(api);
        s.load_input(input(3)).unwrap();
        s.submit_batch(&config()).unwrap();

        let mut seen = Vec::new();
        let output_id = s.wait_for_completion(|status| seen.push(status.clone())).unwrap();
        assert_eq!(output_id, "file-out");
        assert_eq!(seen.len(), 3);
        assert_eq!(s.phase(), Phase::Completed);
        assert!(!s.timer_active());
        assert!(!s.is_busy());

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 15).unwrap();
        let artifact = s.download_output(OutputFormat::Csv, now).unwrap();
        assert_eq!(artifact.file_name, "prompts_results_2024-05-01T09-30-15.csv");

        let text = String::from_utf8(artifact.bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,user,assistant");
        assert_eq!(lines[1], "\"1\",\"question 1\",\"first\"");
        assert_eq!(lines[2], "\"2\",\"question 2\",\"\"");
        assert_eq!(lines[3], "\"3\",\"question 3\",\"third\"");
    }

    #[test]
    fn test_malformed_output_is_result_parse_error() {
        let mut api = FakeApi::with_statuses(vec![Ok(batch("completed", Some("file-out")))]);
        api.output = format!("{}\n{{not json\n", result_line(1, "ok"));
        let mut s = session(api);
        s.load_input(input(1)).unwrap();
        s.submit_batch(&config()).unwrap();
        s.poll_once().unwrap();

        let err = s.download_output(OutputFormat::Xlsx, Utc::now()).unwrap_err();
        assert!(matches!(err, BatchError::ResultParse(_)));
    }

    #[test]
    fn test_resubmit_replaces_timer() {
        let mut s = session(FakeApi::with_statuses(vec![]));
        s.load_input(input(1)).unwrap();
        s.submit_batch(&config()).unwrap();
        let first = s.timer.as_ref().unwrap().state();
        assert!(first.is_running());

        s.submit_batch(&config()).unwrap();

        assert!(!first.is_running());
        let second = s.timer.as_ref().unwrap().state();
        assert!(second.is_running());
        assert!(s.timer_active());
        assert_eq!(s.api().uploads.borrow().len(), 2);
    }

    #[test]
    fn test_load_while_busy_rejected() {
        let mut s = session(FakeApi::with_statuses(vec![]));
        s.load_input(input(1)).unwrap();
        s.submit_batch(&config()).unwrap();

        assert!(matches!(s.load_input(input(2)), Err(BatchError::Validation(_))));
        assert_eq!(s.records().len(), 1);
    }

    #[test]
    fn test_load_bytes_reports_input_errors() {
        let mut s = session(FakeApi::with_statuses(vec![]));
        let err = s.load_bytes("in.csv", b"id,user\n").unwrap_err();
        assert!(matches!(err, BatchError::Input(gridbatch_io::InputError::EmptyInput)));
        assert_eq!(s.load_bytes("in.csv", b"id,user\n1,hi\n").unwrap(), 1);
    }
}
