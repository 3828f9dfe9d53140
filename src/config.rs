use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::Cli;
use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = ".redline/config.toml";
pub const DEFAULT_EDITOR: &str = "micro";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub editor: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub popup_width: Option<String>,
    pub popup_height: Option<String>,
    pub split_percent: Option<u8>,
    pub context_lines: Option<usize>,
    pub review_root: Option<String>,
    pub prompts_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub editor: String,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
    pub popup_width: String,
    pub popup_height: String,
    pub split_percent: u8,
    pub context_lines: usize,
    pub review_root: PathBuf,
    pub prompts_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        merge(ConfigFile::default(), &bare_cli(), None)
    }
}

impl Config {
    /// Load config for this invocation. An explicit `--config` must exist;
    /// the default path is optional.
    pub fn load(cli: &Cli) -> Result<Self> {
        let file_config = match cli.config {
            Some(ref path) => {
                let path = Path::new(path);
                if !path.exists() {
                    return Err(Error::ConfigNotFound(path.to_path_buf()));
                }
                parse_config(&std::fs::read_to_string(path)?)?
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    parse_config(&std::fs::read_to_string(path)?)?
                } else {
                    ConfigFile::default()
                }
            }
        };

        let env_editor = std::env::var("EDITOR").ok();
        let config = merge(file_config, cli, env_editor);
        validate_merged(&config)?;
        Ok(config)
    }
}

fn bare_cli() -> Cli {
    Cli {
        command: None,
        self_test: false,
        config: None,
        editor: None,
        timeout: None,
    }
}

pub fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ConfigFile) -> Result<()> {
    if config.poll_interval_ms == Some(0) {
        return Err(Error::ConfigValidation(
            "poll_interval_ms must be > 0".to_string(),
        ));
    }
    if config.timeout_secs == Some(0) {
        return Err(Error::ConfigValidation(
            "timeout_secs must be > 0".to_string(),
        ));
    }
    if let Some(percent) = config.split_percent
        && !(1..=99).contains(&percent)
    {
        return Err(Error::ConfigValidation(format!(
            "split_percent must be between 1 and 99, got {percent}"
        )));
    }
    for (key, value) in [
        ("popup_width", &config.popup_width),
        ("popup_height", &config.popup_height),
    ] {
        if let Some(v) = value
            && v.trim().is_empty()
        {
            return Err(Error::ConfigValidation(format!("{key} must not be empty")));
        }
    }
    Ok(())
}

fn validate_merged(config: &Config) -> Result<()> {
    if config.editor.trim().is_empty() {
        return Err(Error::ConfigValidation(
            "editor must not be empty".to_string(),
        ));
    }
    if shell_words::split(&config.editor).is_err() {
        return Err(Error::ConfigValidation(format!(
            "editor command has unbalanced quotes: {}",
            config.editor
        )));
    }
    if config.timeout == Some(Duration::ZERO) {
        return Err(Error::ConfigValidation("timeout must be > 0".to_string()));
    }
    Ok(())
}

/// Merge CLI flags, the config file and `$EDITOR` into the effective config.
/// Precedence: CLI > file > environment > default.
pub fn merge(file: ConfigFile, cli: &Cli, env_editor: Option<String>) -> Config {
    Config {
        editor: cli
            .editor
            .clone()
            .or(file.editor)
            .or(env_editor.filter(|e| !e.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string()),
        poll_interval: Duration::from_millis(file.poll_interval_ms.unwrap_or(300)),
        timeout: cli
            .timeout
            .or(file.timeout_secs)
            .map(Duration::from_secs),
        popup_width: file.popup_width.unwrap_or_else(|| "90%".to_string()),
        popup_height: file.popup_height.unwrap_or_else(|| "90%".to_string()),
        split_percent: file.split_percent.unwrap_or(80),
        context_lines: file.context_lines.unwrap_or(2),
        review_root: file
            .review_root
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir),
        prompts_dir: PathBuf::from(
            file.prompts_dir
                .unwrap_or_else(|| ".redline/prompts".to_string()),
        ),
    }
}
