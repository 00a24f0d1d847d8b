// Configuration loading: settings file, templates, API key

pub mod keys;
pub mod settings;
pub mod templates;
mod error;

pub use error::ConfigError;
pub use keys::{KeyLookup, KeySource};
pub use settings::Settings;
pub use templates::Template;
