// gridbatch CLI - spreadsheet prompts in, batch completions out

mod batch;
mod exit_codes;
mod manage;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};

use gridbatch_config::{ConfigError, Settings};
use gridbatch_io::InputError;
use gridbatch_session::BatchError;

use exit_codes::{
    batch_exit_code, input_exit_code, EXIT_CONFIG_INVALID, EXIT_ERROR, EXIT_INPUT_READ, EXIT_KEYCHAIN,
    EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "gridbatch")]
#[command(about = "Run a CSV/Excel sheet of prompts through the OpenAI Batch API")]
#[command(version)]
#[command(long_version = long_version())]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, env = "GRIDBATCH_SETTINGS", value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// System message and model parameters; flags override stored settings.
#[derive(Args, Debug, Default)]
pub struct PromptArgs {
    /// System message text
    #[arg(long, conflicts_with_all = ["system_file", "template"])]
    pub system: Option<String>,

    /// Read the system message from a file
    #[arg(long, value_name = "PATH", conflicts_with = "template")]
    pub system_file: Option<PathBuf>,

    /// Use a saved template as the system message
    #[arg(long, short = 't', value_name = "NAME")]
    pub template: Option<String>,

    /// Model name (default: batch.model)
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Sampling temperature (default: batch.temperature)
    #[arg(long, allow_hyphen_values = true)]
    pub temperature: Option<String>,

    /// Completion token cap (default: batch.maxTokens)
    #[arg(long, allow_hyphen_values = true)]
    pub max_tokens: Option<String>,
}

/// Where and how to reach the batch API.
#[derive(Args, Debug, Default)]
pub struct RemoteArgs {
    /// API key (otherwise keychain, then GRIDBATCH_OPENAI_KEY)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API base URL (default: api.baseUrl)
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a batch, wait for it, and write the merged results
    #[command(after_help = "\
Examples:
  gridbatch run prompts.csv --system 'Answer in one sentence.'
  gridbatch run survey.xlsx --template classify --format xlsx --out-dir results/
  gridbatch run prompts.csv -m gpt-4o-mini --temperature 0 --max-tokens 200")]
    Run {
        /// Input file (.csv, .xlsx or .xls) with `id` and `user` columns
        input: PathBuf,

        #[command(flatten)]
        prompt: PromptArgs,

        #[command(flatten)]
        remote: RemoteArgs,

        /// Output format: csv or xlsx (default: output.format)
        #[arg(long, short = 'f', value_parser = batch::parse_format)]
        format: Option<gridbatch_core::OutputFormat>,

        /// Directory the result file is written to
        #[arg(long, short = 'o', default_value = ".")]
        out_dir: PathBuf,

        /// Seconds between status checks (default: batch.pollIntervalSecs)
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        poll_interval: Option<u64>,

        /// Only print the result path
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Print the JSON Lines that `run` would upload (no network)
    #[command(after_help = "\
Examples:
  gridbatch preview prompts.csv --system 'Be brief.'
  gridbatch preview prompts.csv --template classify | head -n 1")]
    Preview {
        /// Input file (.csv, .xlsx or .xls)
        input: PathBuf,

        #[command(flatten)]
        prompt: PromptArgs,
    },

    /// Show the current status of a batch
    Status {
        /// Batch id (batch_...)
        batch_id: String,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Manage saved system-message templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },

    /// Show or change stored settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Manage the API key in the system keychain
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List template names
    List,
    /// Print a template's content
    Show { name: String },
    /// Create or replace a template
    Save {
        name: String,
        /// Template text
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        content: Option<String>,
        /// Read template text from a file
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// Delete a template
    Delete { name: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print all settings
    Show,
    /// Change one setting (e.g. batch.model gpt-4o-mini)
    Set { key: String, value: String },
    /// Print the settings file path
    Path,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store the API key (reads stdin when no value is given)
    Set { key: Option<String> },
    /// Remove the stored API key
    Delete,
    /// Show where the API key would come from
    Status,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GRIDBATCH_GIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("GRIDBATCH_TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GRIDBATCH_GIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("GRIDBATCH_TARGET"),
        )
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Settings file location plus its loaded contents.
pub struct SettingsStore {
    pub path: PathBuf,
    pub settings: Settings,
}

impl SettingsStore {
    fn open(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(Settings::config_path);
        let settings = Settings::load_from(&path);
        Self { path, settings }
    }

    pub fn save(&self) -> Result<(), CliError> {
        self.settings.save_to(&self.path).map_err(CliError::config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut store = SettingsStore::open(cli.settings);

    let result = match cli.command {
        Commands::Run { input, prompt, remote, format, out_dir, poll_interval, quiet } => {
            batch::cmd_run(&store.settings, input, prompt, remote, format, out_dir, poll_interval, quiet)
        }
        Commands::Preview { input, prompt } => batch::cmd_preview(&store.settings, input, prompt),
        Commands::Status { batch_id, remote } => batch::cmd_status(&store.settings, &batch_id, remote),
        Commands::Template { command } => match command {
            TemplateCommands::List => manage::cmd_template_list(&store),
            TemplateCommands::Show { name } => manage::cmd_template_show(&store, &name),
            TemplateCommands::Save { name, content, file } => {
                manage::cmd_template_save(&mut store, &name, content, file)
            }
            TemplateCommands::Delete { name } => manage::cmd_template_delete(&mut store, &name),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => manage::cmd_config_show(&store),
            ConfigCommands::Set { key, value } => manage::cmd_config_set(&mut store, &key, &value),
            ConfigCommands::Path => manage::cmd_config_path(&store),
        },
        Commands::Key { command } => match command {
            KeyCommands::Set { key } => manage::cmd_key_set(key),
            KeyCommands::Delete => manage::cmd_key_delete(),
            KeyCommands::Status => manage::cmd_key_status(),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn read(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::new(EXIT_INPUT_READ, format!("cannot read {}: {}", path.display(), err))
    }

    pub fn input(err: InputError) -> Self {
        let hint = match &err {
            InputError::MissingColumn { .. } => Some("the first row must name the columns, e.g. id,user".to_string()),
            InputError::EmptyInput => Some("add at least one row below the header".to_string()),
            _ => None,
        };
        Self { code: input_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn config(err: ConfigError) -> Self {
        let code = match &err {
            ConfigError::Keychain(_) => EXIT_KEYCHAIN,
            _ => EXIT_CONFIG_INVALID,
        };
        let hint = match &err {
            ConfigError::UnknownKey(_) => Some("run `gridbatch config show` to list keys".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Create error from session error with proper exit code.
    pub fn batch(err: BatchError) -> Self {
        let code = batch_exit_code(&err);
        let hint = match &err {
            BatchError::Input(InputError::MissingColumn { .. }) => {
                Some("the first row must name the columns, e.g. id,user".to_string())
            }
            BatchError::Upload(gridbatch_openai::ApiError::Http(401, _)) => {
                Some("check the API key (gridbatch key status)".to_string())
            }
            BatchError::Poll(_) => Some("polling stopped; check the batch later with `gridbatch status`".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
