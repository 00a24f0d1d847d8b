use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One `id,user` row from the source file.
///
/// `id` is carried through for display only. Correlation with the remote
/// batch is positional (see [`crate::custom_id`]).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputRecord {
    pub id: String,
    pub user: String,
}

impl InputRecord {
    pub fn new(id: impl Into<String>, user: impl Into<String>) -> Self {
        Self { id: id.into(), user: user.into() }
    }
}

// ---------------------------------------------------------------------------
// Batch request lines (one JSON object per line of the upload)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    /// Always `[system, user]`.
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequestLine {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: RequestBody,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Content extracted from one line of the batch output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub custom_id: String,
    /// Empty when the line carried no recognizable message content.
    pub content: String,
    /// Per-request error message reported by the remote side, if any.
    pub error: Option<String>,
}

/// An input record joined with its completion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: String,
    pub user: String,
    pub assistant: String,
}

impl OutputRecord {
    pub const HEADERS: [&'static str; 3] = ["id", "user", "assistant"];

    pub fn fields(&self) -> [&str; 3] {
        [&self.id, &self.user, &self.assistant]
    }
}

/// Serialization of the result artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Xlsx,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "xlsx" => Ok(OutputFormat::Xlsx),
            other => Err(format!("unknown output format '{}' (expected csv or xlsx)", other)),
        }
    }
}
