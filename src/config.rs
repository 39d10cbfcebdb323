//! Command-line flags, environment configuration and startup context loading.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use context_store::{read_context_file, Context, ContextFileError};

use crate::session::SessionOptions;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV_VAR: &str = "OPENAI_BASE_URL";
pub const ORGANIZATION_ENV_VAR: &str = "OPENAI_ORGANIZATION";
pub const API_KEY_FILE_NAME: &str = ".gptrepl-key";

/// Long flag names that are also accepted with a single leading dash.
const LEGACY_FLAGS: &[&str] = &[
    "ctx",
    "model",
    "apikey",
    "nocommands",
    "quiet",
    "forgetful",
    "maxretries",
    "autosave",
    "autosave-prevent-load",
    "help",
    "version",
];

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "gptrepl", version)]
#[command(about = "Interactive chat REPL for OpenAI-compatible chat completion models", long_about = None)]
pub struct Cli {
    /// Load and append a JSON context file (such as one created by /save). Can be used multiple times.
    #[arg(long = "ctx", value_name = "PATH")]
    pub ctx: Vec<PathBuf>,

    /// The model ID string (e.g. gpt-3.5-turbo).
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// The OpenAI API key to use. Overrides $OPENAI_API_KEY and ~/.gptrepl-key.
    #[arg(long)]
    pub apikey: Option<String>,

    /// Disable slash ("/") commands.
    #[arg(long)]
    pub nocommands: bool,

    /// Only print the model's output (errors are still printed to stderr).
    #[arg(long)]
    pub quiet: bool,

    /// Don't update the conversation context after plain questions. Does not affect commands such as /escape.
    #[arg(long)]
    pub forgetful: bool,

    /// The maximum number of retries when establishing a request. Zero disables retries.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub maxretries: u32,

    /// Load the path as a JSON context if it exists and save the context to it after every update.
    /// Always loaded last, after every --ctx file.
    #[arg(long, value_name = "PATH")]
    pub autosave: Option<PathBuf>,

    /// Don't load the file given to --autosave. Ignored without --autosave.
    #[arg(long = "autosave-prevent-load")]
    pub autosave_prevent_load: bool,
}

impl Cli {
    /// Parses process arguments, accepting single-dash long flags.
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_legacy_flags(env::args_os()))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            model: self.model.clone(),
            quiet: self.quiet,
            forgetful: self.forgetful,
            commands_enabled: !self.nocommands,
            autosave_path: self.autosave.clone(),
        }
    }
}

/// Rewrites `-name` and `-name=value` into `--name` forms for known long
/// flags. Everything after a bare `--` is left alone.
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut normalized = Vec::new();
    let mut passthrough = false;

    for arg in args.into_iter().map(Into::into) {
        if passthrough {
            normalized.push(arg);
            continue;
        }
        let Some(text) = arg.to_str() else {
            normalized.push(arg);
            continue;
        };
        if text == "--" {
            passthrough = true;
            normalized.push(arg);
            continue;
        }
        let is_legacy = text
            .strip_prefix('-')
            .filter(|rest| !rest.starts_with('-'))
            .map(|rest| rest.split_once('=').map_or(rest, |(name, _)| name))
            .is_some_and(|name| LEGACY_FLAGS.contains(&name));
        if is_legacy {
            normalized.push(OsString::from(format!("-{text}")));
        } else {
            normalized.push(arg);
        }
    }

    normalized
}

/// Settings read from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub organization: Option<String>,
    pub text_editor: Option<String>,
    pub provider: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env_string_opt(API_KEY_ENV_VAR),
            base_url: env_string_opt(BASE_URL_ENV_VAR),
            organization: env_string_opt(ORGANIZATION_ENV_VAR),
            text_editor: env_string_opt(crate::editor::TEXT_EDITOR_ENV_VAR),
            provider: env_string_opt(crate::providers::PROVIDER_ENV_VAR),
        }
    }
}

pub(crate) fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

/// First credential found: the flag, the environment, then the key file in
/// `home`. Blank values count as missing.
pub fn resolve_api_key(
    flag: Option<&str>,
    env_key: Option<&str>,
    home: Option<&Path>,
) -> Option<String> {
    if let Some(key) = flag.filter(|key| !key.trim().is_empty()) {
        return Some(key.to_string());
    }
    if let Some(key) = env_key.filter(|key| !key.trim().is_empty()) {
        return Some(key.to_string());
    }

    let path = home?.join(API_KEY_FILE_NAME);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "no key file");
            return None;
        }
    };
    let key = contents.trim();
    (!key.is_empty()).then(|| key.to_string())
}

/// The message printed when no credential could be found.
pub fn api_key_help_lines(home: Option<&Path>) -> Vec<String> {
    let location = home
        .map(|home| format!("(currently {}) ", home.display()))
        .unwrap_or_default();
    vec![
        format!("An {} was not provided.", "OpenAI API key".red()),
        "gptrepl searches for the key in three places until one is found, in the following order:"
            .to_string(),
        " - The -apikey command-line flag".to_string(),
        format!(" - {API_KEY_ENV_VAR} environment variable"),
        format!(
            " - A file named \"{API_KEY_FILE_NAME}\" located in the home directory {location}containing only a plaintext key in UTF-8 encoding."
        ),
    ]
}

/// Builds the startup transcript: every `--ctx` file in order, then the
/// autosave file unless loading it is prevented or it does not exist.
pub fn load_initial_context(cli: &Cli) -> Result<Context, ContextFileError> {
    let mut context = Context::new();

    for path in &cli.ctx {
        context.extend(read_context_file(path)?);
        tracing::debug!(path = %path.display(), "loaded context file");
    }

    if let Some(path) = cli.autosave.as_deref() {
        if cli.autosave_prevent_load {
            tracing::debug!(path = %path.display(), "autosave load prevented");
        } else if matches!(path.try_exists(), Ok(false)) {
            tracing::debug!(path = %path.display(), "autosave file does not exist yet");
        } else {
            context.extend(read_context_file(path)?);
            tracing::debug!(path = %path.display(), "loaded autosave file");
        }
    }

    Ok(context)
}
