// Saved system-message templates, stored inside settings.json

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::settings::Settings;

/// A named system message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub content: String,
}

impl Settings {
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Insert or replace by name. The name is trimmed; content is stored as given.
    pub fn save_template(&mut self, name: &str, content: &str) -> Result<(), ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyTemplateName);
        }
        if content.trim().is_empty() {
            return Err(ConfigError::EmptyTemplateContent);
        }

        match self.templates.iter_mut().find(|t| t.name == name) {
            Some(existing) => existing.content = content.to_string(),
            None => self.templates.push(Template {
                name: name.to_string(),
                content: content.to_string(),
            }),
        }
        Ok(())
    }

    /// Remove by name. Returns false when no such template exists.
    pub fn delete_template(&mut self, name: &str) -> bool {
        let before = self.templates.len();
        self.templates.retain(|t| t.name != name);
        self.templates.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_appends_then_replaces() {
        let mut s = Settings::default();
        s.save_template("summarize", "Summarize the text.").unwrap();
        s.save_template("translate", "Translate to English.").unwrap();
        s.save_template(" summarize ", "Summarize in one line.").unwrap();

        assert_eq!(s.templates.len(), 2);
        assert_eq!(s.templates[0].name, "summarize");
        assert_eq!(s.template("summarize").unwrap().content, "Summarize in one line.");
    }

    #[test]
    fn test_save_rejects_empty_name_or_content() {
        let mut s = Settings::default();
        assert!(matches!(s.save_template("  ", "x"), Err(ConfigError::EmptyTemplateName)));
        assert!(matches!(s.save_template("a", " \n "), Err(ConfigError::EmptyTemplateContent)));
        assert!(s.templates.is_empty());
    }

    #[test]
    fn test_delete() {
        let mut s = Settings::default();
        s.save_template("a", "x").unwrap();
        assert!(!s.delete_template("b"));
        assert!(s.delete_template("a"));
        assert!(s.template("a").is_none());
    }

    #[test]
    fn test_templates_serialize_as_array() {
        let mut s = Settings::default();
        s.save_template("a", "x").unwrap();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["templates"], serde_json::json!([{ "name": "a", "content": "x" }]));
    }
}
