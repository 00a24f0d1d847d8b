// API key storage and lookup
//
// Keys come from (in order):
// 1. An explicit value (CLI flag or OPENAI_API_KEY)
// 2. System keychain
// 3. GRIDBATCH_OPENAI_KEY environment variable (CI/headless)
//
// Keys are NEVER stored in settings.json

use std::env;

use crate::error::ConfigError;

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "gridbatch";

/// Keychain account holding the batch API key
const KEYCHAIN_ACCOUNT: &str = "api/openai";

/// Environment fallback for headless use
pub const KEY_ENV_VAR: &str = "GRIDBATCH_OPENAI_KEY";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Passed in by the caller (flag or OPENAI_API_KEY)
    Explicit,
    /// Key retrieved from system keychain
    Keychain,
    /// Key retrieved from GRIDBATCH_OPENAI_KEY
    Environment,
    /// No key found
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Explicit => "flag/OPENAI_API_KEY",
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

impl std::fmt::Debug for KeyLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLookup")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("source", &self.source)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// First non-empty candidate in lookup order.
fn pick(explicit: Option<String>, keychain: Option<String>, environment: Option<String>) -> KeyLookup {
    let candidates = [
        (non_empty(explicit), KeySource::Explicit),
        (non_empty(keychain), KeySource::Keychain),
        (non_empty(environment), KeySource::Environment),
    ];
    for (key, source) in candidates {
        if key.is_some() {
            return KeyLookup { key, source };
        }
    }
    KeyLookup { key: None, source: KeySource::None }
}

#[cfg(feature = "keychain")]
fn keychain_key() -> Option<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT).ok()?;
    match entry.get_password() {
        Ok(key) => Some(key),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            log::debug!("keychain lookup failed: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "keychain"))]
fn keychain_key() -> Option<String> {
    None
}

/// Resolve the API key, preferring `explicit` when it is non-empty.
pub fn resolve_api_key(explicit: Option<&str>) -> KeyLookup {
    let explicit = explicit.map(str::to_string);
    let lookup = if non_empty(explicit.clone()).is_some() {
        pick(explicit, None, None)
    } else {
        pick(None, keychain_key(), env::var(KEY_ENV_VAR).ok())
    };
    log::debug!("api key source: {}", lookup.source.as_str());
    lookup
}

/// Store the API key in the system keychain
#[cfg(feature = "keychain")]
pub fn set_api_key(key: &str) -> Result<(), ConfigError> {
    if key.trim().is_empty() {
        return Err(ConfigError::Keychain("API key must not be empty".to_string()));
    }

    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT)
        .map_err(|e| ConfigError::Keychain(format!("Failed to create keychain entry: {}", e)))?;

    entry
        .set_password(key.trim())
        .map_err(|e| ConfigError::Keychain(format!("Failed to store key in keychain: {}", e)))
}

#[cfg(not(feature = "keychain"))]
pub fn set_api_key(_key: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Keychain(format!(
        "Keychain support not enabled. Set {} instead.",
        KEY_ENV_VAR
    )))
}

/// Delete the API key from the system keychain. Returns false when none was stored.
#[cfg(feature = "keychain")]
pub fn delete_api_key() -> Result<bool, ConfigError> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT)
        .map_err(|e| ConfigError::Keychain(format!("Failed to access keychain entry: {}", e)))?;

    match entry.delete_credential() {
        Ok(()) => Ok(true),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(e) => Err(ConfigError::Keychain(format!("Failed to delete key from keychain: {}", e))),
    }
}

#[cfg(not(feature = "keychain"))]
pub fn delete_api_key() -> Result<bool, ConfigError> {
    Err(ConfigError::Keychain("Keychain support not enabled.".to_string()))
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT).is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}
