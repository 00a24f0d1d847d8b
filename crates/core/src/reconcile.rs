//! Join batch output lines back onto the input records.
//!
//! Output order always follows input order. Lines arrive in whatever order
//! the remote side finished them; the `custom_id` decides where they land.

use std::collections::HashMap;

use serde_json::Value;

use crate::custom_id;
use crate::model::{InputRecord, OutputRecord, ResultRecord};

/// A line of the output file was not valid JSON. Fails the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("result line {line} is not valid JSON: {message}")]
pub struct ResultParseError {
    /// 1-based line number in the output file.
    pub line: usize,
    pub message: String,
}

/// Counts reported alongside the reconciled records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub matched: usize,
    pub missing: usize,
    pub errored: usize,
    /// Result lines whose `custom_id` matched no input record.
    pub unknown: usize,
}

/// Parse every non-blank line of a JSON-Lines output file.
pub fn parse_results(jsonl: &str) -> Result<Vec<ResultRecord>, ResultParseError> {
    let mut results = Vec::new();

    for (idx, raw) in jsonl.split('\n').enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line).map_err(|e| ResultParseError {
            line: idx + 1,
            message: e.to_string(),
        })?;

        let Some(id) = value.get("custom_id").and_then(Value::as_str) else {
            log::warn!("result line {} has no custom_id, skipping", idx + 1);
            continue;
        };

        let content = extract_content(&value).unwrap_or_default();
        let error = extract_error(&value);
        if content.is_empty() && error.is_none() {
            log::warn!("result {id}: no message content in either known response shape");
        }

        results.push(ResultRecord { custom_id: id.to_string(), content, error });
    }

    Ok(results)
}

/// Reconcile output-file text against the ordered input records.
///
/// Records without a result line get an empty `assistant` field.
pub fn reconcile(
    records: &[InputRecord],
    jsonl: &str,
) -> Result<(Vec<OutputRecord>, ReconcileSummary), ResultParseError> {
    let results = parse_results(jsonl)?;
    let mut summary = ReconcileSummary::default();

    let mut by_id: HashMap<String, ResultRecord> = HashMap::with_capacity(results.len());
    for result in results {
        if let Some(err) = &result.error {
            log::warn!("result {}: remote error: {}", result.custom_id, err);
            summary.errored += 1;
        }
        by_id.insert(result.custom_id.clone(), result);
    }

    let outputs: Vec<OutputRecord> = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let assistant = match by_id.remove(&custom_id(index)) {
                Some(result) => {
                    summary.matched += 1;
                    result.content
                }
                None => {
                    summary.missing += 1;
                    String::new()
                }
            };
            OutputRecord {
                id: record.id.clone(),
                user: record.user.clone(),
                assistant,
            }
        })
        .collect();

    summary.unknown = by_id.len();
    if summary.unknown > 0 {
        log::warn!("{} result line(s) matched no input record", summary.unknown);
    }

    Ok((outputs, summary))
}

/// The completion payload sits under `response.body` in batch output; fall
/// back to the line itself for flatter shapes.
fn payload(line: &Value) -> &Value {
    line.get("response")
        .and_then(|r| r.get("body"))
        .filter(|b| b.is_object())
        .unwrap_or(line)
}

/// `choices[0].message.content` (chat completions) or `message.content`.
fn extract_content(line: &Value) -> Option<String> {
    let body = payload(line);
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/message/content").and_then(Value::as_str))
        .map(String::from)
}

fn extract_error(line: &Value) -> Option<String> {
    let err = line.get("error").filter(|e| !e.is_null())?;
    Some(
        err.get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| err.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_line(id: &str, content: &str) -> String {
        serde_json::json!({
            "id": format!("batch_req_{id}"),
            "custom_id": id,
            "response": {
                "status_code": 200,
                "body": {
                    "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
                }
            },
            "error": null
        })
        .to_string()
    }

    fn records(n: usize) -> Vec<InputRecord> {
        (1..=n).map(|i| InputRecord::new(i.to_string(), format!("question {i}"))).collect()
    }

    #[test]
    fn test_out_of_order_results_keep_input_order() {
        let jsonl = [chat_line("request-3", "c"), chat_line("request-1", "a"), chat_line("request-2", "b")]
            .join("\n");
        let (out, summary) = reconcile(&records(3), &jsonl).unwrap();

        let assistants: Vec<&str> = out.iter().map(|o| o.assistant.as_str()).collect();
        assert_eq!(assistants, vec!["a", "b", "c"]);
        assert_eq!(out[0].id, "1");
        assert_eq!(out[2].user, "question 3");
        assert_eq!(summary.matched, 3);
        assert_eq!(summary.missing, 0);
    }

    #[test]
    fn test_missing_result_yields_empty_assistant() {
        let jsonl = [chat_line("request-3", "third"), chat_line("request-1", "first")].join("\n");
        let (out, summary) = reconcile(&records(3), &jsonl).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].assistant, "first");
        assert_eq!(out[1].assistant, "");
        assert_eq!(out[1].id, "2");
        assert_eq!(out[2].assistant, "third");
        assert_eq!(summary.missing, 1);
    }

    #[test]
    fn test_flat_message_shape() {
        let jsonl = r#"{"custom_id":"request-1","response":{"body":{"message":{"content":"flat"}}}}"#;
        let (out, _) = reconcile(&records(1), jsonl).unwrap();
        assert_eq!(out[0].assistant, "flat");
    }

    #[test]
    fn test_flat_shape_at_line_root() {
        let jsonl = r#"{"custom_id":"request-1","message":{"content":"root"}}"#;
        let (out, _) = reconcile(&records(1), jsonl).unwrap();
        assert_eq!(out[0].assistant, "root");
    }

    #[test]
    fn test_unrecognized_shape_is_empty_not_error() {
        let jsonl = r#"{"custom_id":"request-1","response":{"body":{"output":[1,2,3]}}}"#;
        let (out, summary) = reconcile(&records(1), jsonl).unwrap();
        assert_eq!(out[0].assistant, "");
        assert_eq!(summary.matched, 1);
    }

    #[test]
    fn test_null_content_is_empty() {
        let jsonl = r#"{"custom_id":"request-1","response":{"body":{"choices":[{"message":{"content":null}}]}}}"#;
        let (out, _) = reconcile(&records(1), jsonl).unwrap();
        assert_eq!(out[0].assistant, "");
    }

    #[test]
    fn test_malformed_line_fails_whole_batch() {
        let jsonl = format!("{}\n{{not json\n{}", chat_line("request-1", "a"), chat_line("request-2", "b"));
        let err = reconcile(&records(2), &jsonl).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_blank_and_crlf_lines_ignored() {
        let jsonl = format!("{}\r\n\r\n{}\r\n", chat_line("request-1", "a"), chat_line("request-2", "b"));
        let (out, _) = reconcile(&records(2), &jsonl).unwrap();
        assert_eq!(out[1].assistant, "b");
    }

    #[test]
    fn test_remote_error_line_counted() {
        let jsonl = r#"{"custom_id":"request-1","response":null,"error":{"code":"server_error","message":"boom"}}"#;
        let results = parse_results(jsonl).unwrap();
        assert_eq!(results[0].error.as_deref(), Some("boom"));
        assert_eq!(results[0].content, "");

        let (out, summary) = reconcile(&records(1), jsonl).unwrap();
        assert_eq!(out[0].assistant, "");
        assert_eq!(summary.errored, 1);
    }

    #[test]
    fn test_unknown_custom_id_ignored() {
        let jsonl = [chat_line("request-1", "a"), chat_line("request-9", "stray")].join("\n");
        let (out, summary) = reconcile(&records(1), &jsonl).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(summary.unknown, 1);
    }

    #[test]
    fn test_empty_output_file() {
        let (out, summary) = reconcile(&records(2), "").unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|o| o.assistant.is_empty()));
        assert_eq!(summary.missing, 2);
    }
}
