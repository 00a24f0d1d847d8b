//! Batch request builder.
//!
//! Turns input records plus the current form configuration into the
//! JSON-Lines payload uploaded to the files endpoint. The configuration is
//! read at build time on every submission; nothing is cached.

use crate::model::{BatchRequestLine, ChatMessage, InputRecord, RequestBody};
use crate::{custom_id, CHAT_COMPLETIONS_ENDPOINT};

pub const DEFAULT_TEMPERATURE: f64 = 0.0;
pub const DEFAULT_MAX_TOKENS: u64 = 1000;

/// Form values as the user typed them. Numeric fields stay raw strings and
/// are parsed (with defaults) when the request lines are built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    pub model: String,
    pub temperature: Option<String>,
    pub max_tokens: Option<String>,
    pub system_message: String,
}

impl RequestConfig {
    /// Effective temperature: leading float of the raw value, else 0.
    pub fn effective_temperature(&self) -> f64 {
        self.temperature
            .as_deref()
            .and_then(parse_leading_float)
            .filter(|t| t.is_finite())
            .unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Effective max tokens: leading integer of the raw value, else 1000.
    /// Zero and negative values also fall back to the default.
    pub fn effective_max_tokens(&self) -> u64 {
        self.max_tokens
            .as_deref()
            .and_then(parse_leading_int)
            .filter(|n| *n > 0)
            .map(|n| n as u64)
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

/// One request line per record, `custom_id` numbered from 1 in input order.
pub fn build_requests(records: &[InputRecord], config: &RequestConfig) -> Vec<BatchRequestLine> {
    let temperature = config.effective_temperature();
    let max_tokens = config.effective_max_tokens();

    records
        .iter()
        .enumerate()
        .map(|(index, record)| BatchRequestLine {
            custom_id: custom_id(index),
            method: "POST".to_string(),
            url: CHAT_COMPLETIONS_ENDPOINT.to_string(),
            body: RequestBody {
                model: config.model.clone(),
                temperature,
                max_tokens,
                messages: vec![
                    ChatMessage::system(config.system_message.as_str()),
                    ChatMessage::user(record.user.as_str()),
                ],
            },
        })
        .collect()
}

/// Serialize the request lines as JSON Lines (newline-joined, no trailing newline).
pub fn build_jsonl(records: &[InputRecord], config: &RequestConfig) -> Result<String, serde_json::Error> {
    let lines = build_requests(records, config)
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("built {} batch request line(s)", lines.len());
    Ok(lines.join("\n"))
}

/// Parse the longest numeric prefix of `raw` as a float (`"0.7abc"` -> 0.7).
fn parse_leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows it.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Parse the longest integer prefix of `raw` (`"1200.9"` -> 1200).
fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }

    s[..end].parse::<i64>().ok()
}
