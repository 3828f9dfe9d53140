use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("not inside a git repository")]
    NotARepository,

    #[error("no overlay terminal available (requires tmux, kitty, or wezterm)")]
    NoOverlayTerminal,

    #[error("editor session timed out after {0:?}")]
    OverlayTimeout(Duration),

    #[error("overlay error: {0}")]
    Overlay(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("hook error: {0}")]
    Hook(String),

    #[error("prompt error: {0}")]
    Prompt(String),

    #[error("interrupted")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, Error>;
