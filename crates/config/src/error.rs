use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("template name must not be empty")]
    EmptyTemplateName,

    #[error("template content must not be blank")]
    EmptyTemplateContent,

    #[error("{0}")]
    Keychain(String),
}
