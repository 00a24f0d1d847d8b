// run / preview / status

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use gridbatch_config::keys;
use gridbatch_config::Settings;
use gridbatch_core::{build_jsonl, OutputFormat, RequestConfig};
use gridbatch_openai::OpenAiClient;
use gridbatch_session::{BatchError, BatchSession};

use crate::exit_codes::{EXIT_BATCH_POLL, EXIT_MISSING_KEY, EXIT_TEMPLATE_NOT_FOUND};
use crate::{CliError, PromptArgs, RemoteArgs};

pub fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse()
}

/// Explicit text, then a file, then a saved template; empty when none given.
fn system_message(settings: &Settings, prompt: &PromptArgs) -> Result<String, CliError> {
    if let Some(text) = &prompt.system {
        return Ok(text.clone());
    }
    if let Some(path) = &prompt.system_file {
        return fs::read_to_string(path).map_err(|e| CliError::read(path, e));
    }
    if let Some(name) = &prompt.template {
        return settings
            .template(name)
            .map(|t| t.content.clone())
            .ok_or_else(|| {
                CliError::new(EXIT_TEMPLATE_NOT_FOUND, format!("no template named '{}'", name))
                    .with_hint("run `gridbatch template list`")
            });
    }
    Ok(String::new())
}

/// Stored settings overlaid with this invocation's flags.
pub fn request_config(settings: &Settings, prompt: &PromptArgs) -> Result<RequestConfig, CliError> {
    Ok(RequestConfig {
        model: prompt.model.clone().unwrap_or_else(|| settings.model.clone()),
        temperature: Some(prompt.temperature.clone().unwrap_or_else(|| settings.temperature.clone())),
        max_tokens: Some(prompt.max_tokens.clone().unwrap_or_else(|| settings.max_tokens.clone())),
        system_message: system_message(settings, prompt)?,
    })
}

fn client(settings: &Settings, remote: &RemoteArgs) -> Result<OpenAiClient, CliError> {
    let lookup = keys::resolve_api_key(remote.api_key.as_deref());
    let key = lookup.key.ok_or_else(|| {
        CliError::new(EXIT_MISSING_KEY, "no API key configured")
            .with_hint("pass --api-key, set OPENAI_API_KEY, or run `gridbatch key set`")
    })?;
    let api_base = remote.api_base.clone().unwrap_or_else(|| settings.api_base_url.clone());
    OpenAiClient::new(key, api_base).map_err(|e| CliError::io(e.to_string()))
}

// ============================================================================
// run
// ============================================================================

#[allow(clippy::too_many_arguments)]
pub fn cmd_run(
    settings: &Settings,
    input: PathBuf,
    prompt: PromptArgs,
    remote: RemoteArgs,
    format: Option<OutputFormat>,
    out_dir: PathBuf,
    poll_interval: Option<u64>,
    quiet: bool,
) -> Result<(), CliError> {
    if !out_dir.is_dir() {
        return Err(CliError::args(format!("output directory {} does not exist", out_dir.display())));
    }

    let loaded = gridbatch_io::load_path(&input).map_err(CliError::input)?;
    let config = request_config(settings, &prompt)?;
    let format = format.unwrap_or(settings.output_format);
    let interval = poll_interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.poll_interval());

    let client = client(settings, &remote)?;
    let mut session = BatchSession::new(client, interval);
    let count = session.load_input(loaded).map_err(CliError::batch)?;
    if !quiet {
        eprintln!("Loaded {} record(s) from {}", count, input.display());
    }

    let batch_id = session.submit_batch(&config).map_err(CliError::batch)?;
    if !quiet {
        eprintln!("Submitted batch {} (checking every {}s)", batch_id, interval.as_secs());
    }

    session
        .wait_for_completion(|status| {
            if !quiet {
                eprintln!("  {}: {}", batch_id, status);
            }
        })
        .map_err(CliError::batch)?;

    let artifact = session.download_output(format, Utc::now()).map_err(CliError::batch)?;
    let path = artifact
        .write_to(&out_dir)
        .map_err(|e| CliError::batch(BatchError::Export(e)))?;

    if !quiet {
        eprintln!("Batch {} completed", batch_id);
    }
    println!("{}", path.display());
    Ok(())
}

// ============================================================================
// preview
// ============================================================================

pub fn cmd_preview(settings: &Settings, input: PathBuf, prompt: PromptArgs) -> Result<(), CliError> {
    let loaded = gridbatch_io::load_path(&input).map_err(CliError::input)?;
    let config = request_config(settings, &prompt)?;
    let jsonl = build_jsonl(&loaded.records, &config).map_err(|e| CliError::io(e.to_string()))?;
    println!("{}", jsonl);
    Ok(())
}

// ============================================================================
// status
// ============================================================================

pub fn cmd_status(settings: &Settings, batch_id: &str, remote: RemoteArgs) -> Result<(), CliError> {
    let client = client(settings, &remote)?;
    let batch = client
        .retrieve_batch(batch_id)
        .map_err(|e| CliError::new(EXIT_BATCH_POLL, format!("status check failed: {}", e)))?;

    println!("id:      {}", batch.id);
    println!("status:  {}", batch.status);
    if let Some(counts) = batch.request_counts {
        println!("requests: {} total, {} completed, {} failed", counts.total, counts.completed, counts.failed);
    }
    if let Some(id) = &batch.output_file_id {
        println!("output:  {}", id);
    }
    if let Some(id) = &batch.error_file_id {
        println!("errors:  {}", id);
    }
    Ok(())
}
