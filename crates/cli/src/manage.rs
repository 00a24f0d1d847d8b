// template / config / key

use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;

use gridbatch_config::keys;
use gridbatch_config::settings::KEYS;

use crate::exit_codes::EXIT_TEMPLATE_NOT_FOUND;
use crate::{CliError, SettingsStore};

fn template_not_found(name: &str) -> CliError {
    CliError::new(EXIT_TEMPLATE_NOT_FOUND, format!("no template named '{}'", name))
        .with_hint("run `gridbatch template list`")
}

// ============================================================================
// template
// ============================================================================

pub fn cmd_template_list(store: &SettingsStore) -> Result<(), CliError> {
    if store.settings.templates.is_empty() {
        eprintln!("No templates saved.");
        return Ok(());
    }
    for template in &store.settings.templates {
        println!("{}", template.name);
    }
    Ok(())
}

pub fn cmd_template_show(store: &SettingsStore, name: &str) -> Result<(), CliError> {
    let template = store.settings.template(name).ok_or_else(|| template_not_found(name))?;
    println!("{}", template.content);
    Ok(())
}

pub fn cmd_template_save(
    store: &mut SettingsStore,
    name: &str,
    content: Option<String>,
    file: Option<PathBuf>,
) -> Result<(), CliError> {
    let content = match (content, file) {
        (Some(text), _) => text,
        (None, Some(path)) => fs::read_to_string(&path).map_err(|e| CliError::read(&path, e))?,
        (None, None) => return Err(CliError::args("either --content or --file is required")),
    };

    let existed = store.settings.template(name.trim()).is_some();
    store.settings.save_template(name, &content).map_err(CliError::config)?;
    store.save()?;

    let verb = if existed { "Updated" } else { "Saved" };
    eprintln!("{} template '{}'", verb, name.trim());
    Ok(())
}

pub fn cmd_template_delete(store: &mut SettingsStore, name: &str) -> Result<(), CliError> {
    if !store.settings.delete_template(name) {
        return Err(template_not_found(name));
    }
    store.save()?;
    eprintln!("Deleted template '{}'", name);
    Ok(())
}

// ============================================================================
// config
// ============================================================================

pub fn cmd_config_show(store: &SettingsStore) -> Result<(), CliError> {
    for key in KEYS {
        let value = store.settings.get(key).unwrap_or_default();
        println!("{} = {}", key, value);
    }
    println!("templates = {}", store.settings.templates.len());
    Ok(())
}

pub fn cmd_config_set(store: &mut SettingsStore, key: &str, value: &str) -> Result<(), CliError> {
    store.settings.set(key, value).map_err(CliError::config)?;
    store.save()?;
    log::info!("{} set in {}", key, store.path.display());
    Ok(())
}

pub fn cmd_config_path(store: &SettingsStore) -> Result<(), CliError> {
    println!("{}", store.path.display());
    Ok(())
}

// ============================================================================
// key
// ============================================================================

pub fn cmd_key_set(key: Option<String>) -> Result<(), CliError> {
    let key = match key {
        Some(k) => k,
        None => {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| CliError::io(format!("failed to read key from stdin: {}", e)))?;
            line
        }
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::args("API key must not be empty"));
    }

    keys::set_api_key(key).map_err(CliError::config)?;
    eprintln!("API key stored in keychain");
    Ok(())
}

pub fn cmd_key_delete() -> Result<(), CliError> {
    if keys::delete_api_key().map_err(CliError::config)? {
        eprintln!("API key removed from keychain");
    } else {
        eprintln!("No API key stored in keychain");
    }
    Ok(())
}

pub fn cmd_key_status() -> Result<(), CliError> {
    let explicit = std::env::var("OPENAI_API_KEY").ok();
    let lookup = keys::resolve_api_key(explicit.as_deref());

    println!("key:      {}", if lookup.key.is_some() { "present" } else { "missing" });
    println!("source:   {}", lookup.source.as_str());
    println!("keychain: {}", if keys::keychain_available() { "ok" } else { "unavailable" });
    Ok(())
}
