// Application settings
// Loaded from ~/.config/gridbatch/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gridbatch_core::OutputFormat;

use crate::error::ConfigError;
use crate::templates::Template;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-0125";
pub const DEFAULT_TEMPERATURE: &str = "0.7";
pub const DEFAULT_MAX_TOKENS: &str = "1000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Keys accepted by [`Settings::get`] / [`Settings::set`], in display order.
pub const KEYS: [&str; 6] = [
    "api.baseUrl",
    "batch.model",
    "batch.temperature",
    "batch.maxTokens",
    "batch.pollIntervalSecs",
    "output.format",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Remote API
    #[serde(rename = "api.baseUrl")]
    pub api_base_url: String,

    // Request form. Numeric fields keep the raw text; the request builder
    // parses and falls back.
    #[serde(rename = "batch.model")]
    pub model: String,

    #[serde(rename = "batch.temperature")]
    pub temperature: String,

    #[serde(rename = "batch.maxTokens")]
    pub max_tokens: String,

    #[serde(rename = "batch.pollIntervalSecs")]
    pub poll_interval_secs: u64,

    // Output
    #[serde(rename = "output.format")]
    pub output_format: OutputFormat,

    // Saved system messages
    #[serde(rename = "templates")]
    pub templates: Vec<Template>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            output_format: OutputFormat::Csv,
            templates: Vec::new(),
        }
    }
}

/// Drop `//` comment lines so hand-edited files still parse.
fn strip_comments(contents: &str) -> String {
    contents
        .lines()
        .filter(|line| !line.trim().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridbatch");
        config_dir.join("settings.json")
    }

    /// Load settings from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("error reading {}: {}; using default settings", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON (comment lines allowed). Missing keys take defaults.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(&strip_comments(contents))
    }

    /// Save current settings to `path`, creating the parent directory
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(self)?;

        fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("settings saved to {}", path.display());
        Ok(())
    }

    /// Polling cadence; never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Display value of a setting by its file key.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "api.baseUrl" => self.api_base_url.clone(),
            "batch.model" => self.model.clone(),
            "batch.temperature" => self.temperature.clone(),
            "batch.maxTokens" => self.max_tokens.clone(),
            "batch.pollIntervalSecs" => self.poll_interval_secs.to_string(),
            "output.format" => self.output_format.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Update a setting by its file key.
    ///
    /// Temperature and max tokens are stored verbatim; other keys are
    /// validated here.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        match key {
            "api.baseUrl" => {
                let value = value.trim();
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(invalid("expected an http:// or https:// URL"));
                }
                self.api_base_url = value.trim_end_matches('/').to_string();
            }
            "batch.model" => {
                if value.trim().is_empty() {
                    return Err(invalid("model must not be empty"));
                }
                self.model = value.trim().to_string();
            }
            "batch.temperature" => self.temperature = value.to_string(),
            "batch.maxTokens" => self.max_tokens = value.to_string(),
            "batch.pollIntervalSecs" => {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid("expected a whole number of seconds"))?;
                if secs == 0 {
                    return Err(invalid("interval must be at least 1 second"));
                }
                self.poll_interval_secs = secs;
            }
            "output.format" => {
                self.output_format = value.parse().map_err(|e: String| invalid(&e))?;
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}
