use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};

/// Runs git commands in a fixed working directory.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run a git command, returning stdout with surrounding whitespace
    /// trimmed. A non-zero exit is an error carrying git's stderr.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        debug!(dir = %self.dir.display(), ?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Like [`Git::run`] but failures read as empty output.
    pub fn stdout(&self, args: &[&str]) -> String {
        self.run(args).unwrap_or_default()
    }

    /// Whether the command exits successfully.
    pub fn ok(&self, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Non-empty lines of a command's output.
    pub fn lines(&self, args: &[&str]) -> Vec<String> {
        self.stdout(args)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}
