use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};

/// Where the launcher looks for capability signals: environment variables
/// and executables on the search path.
pub trait Environment {
    /// Value of `key`, treating an empty value as unset.
    fn var(&self, key: &str) -> Option<String>;

    /// Absolute path of `binary` if it can be executed.
    fn resolve(&self, binary: &str) -> Option<PathBuf>;
}

/// The real process environment and `$PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn resolve(&self, binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }
}

/// Overlay support offered by the terminal the caller is running in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    None,
    /// `tmux display-popup -E`, which blocks until the editor exits.
    TmuxPopup { binary: PathBuf },
    /// `kitty @ launch --type=overlay`, returns immediately.
    KittyOverlay {
        binary: PathBuf,
        socket: Option<String>,
        window_id: Option<String>,
    },
    /// `wezterm cli split-pane`, returns immediately.
    WeztermSplit { binary: PathBuf, pane_id: String },
}

impl Capability {
    /// Probe the environment once. First match wins: tmux, kitty, wezterm.
    pub fn detect(env: &impl Environment) -> Self {
        if env.var("TMUX").is_some()
            && let Some(binary) = env.resolve("tmux")
        {
            return Capability::TmuxPopup { binary };
        }

        if let Some(binary) = env.resolve("kitty") {
            return Capability::KittyOverlay {
                binary,
                socket: env.var("KITTY_LISTEN_ON"),
                window_id: env.var("KITTY_WINDOW_ID"),
            };
        }

        if let Some(pane_id) = env.var("WEZTERM_PANE")
            && let Some(binary) = env.resolve("wezterm")
        {
            return Capability::WeztermSplit { binary, pane_id };
        }

        Capability::None
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Capability::None)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::None => write!(f, "none"),
            Capability::TmuxPopup { .. } => write!(f, "tmux popup"),
            Capability::KittyOverlay { socket, .. } => match socket {
                Some(s) => write!(f, "kitty overlay ({s})"),
                None => write!(f, "kitty overlay"),
            },
            Capability::WeztermSplit { pane_id, .. } => {
                write!(f, "wezterm split-pane (pane {pane_id})")
            }
        }
    }
}

/// How an editor session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayStatus {
    Closed,
    NoTerminal,
    TimedOut,
}

impl OverlayStatus {
    pub fn code(self) -> i32 {
        match self {
            OverlayStatus::Closed => 0,
            OverlayStatus::NoTerminal => 1,
            OverlayStatus::TimedOut => 124,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySettings {
    pub editor: String,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
    pub popup_width: String,
    pub popup_height: String,
    pub split_percent: u8,
}

impl OverlaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            editor: config.editor.clone(),
            poll_interval: config.poll_interval,
            timeout: config.timeout,
            popup_width: config.popup_width.clone(),
            popup_height: config.popup_height.clone(),
            split_percent: config.split_percent,
        }
    }
}

/// Opens files in the user's editor inside a terminal overlay and waits for
/// the editor to exit.
pub struct OverlayLauncher<E> {
    env: E,
    settings: OverlaySettings,
}

impl<E: Environment> OverlayLauncher<E> {
    pub fn new(env: E, settings: OverlaySettings) -> Self {
        Self { env, settings }
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    pub fn capability(&self) -> Capability {
        Capability::detect(&self.env)
    }

    /// Show `file` in the editor and block until the session ends.
    ///
    /// The file's contents are never read here; callers re-read it afterwards.
    pub async fn open(&self, file: &Path, title: &str) -> Result<OverlayStatus> {
        let capability = self.capability();
        self.open_with(&capability, file, title).await
    }

    pub async fn open_with(
        &self,
        capability: &Capability,
        file: &Path,
        title: &str,
    ) -> Result<OverlayStatus> {
        if !capability.is_available() {
            info!(file = %file.display(), "no overlay-capable terminal detected");
            return Ok(OverlayStatus::NoTerminal);
        }

        let editor = editor_argv(&self.settings.editor, file)?;
        info!(
            terminal = %capability,
            file = %file.display(),
            editor = %self.settings.editor,
            "opening editor overlay"
        );

        match capability {
            Capability::None => Ok(OverlayStatus::NoTerminal),
            Capability::TmuxPopup { binary } => {
                let args = tmux_popup_args(&self.settings, title, &editor);
                self.run_blocking(binary, &args).await
            }
            Capability::KittyOverlay {
                binary,
                socket,
                window_id,
            } => {
                let marker = CompletionMarker::fresh()?;
                let wrapper = wrapper_command(&editor, marker.path());
                let args = kitty_launch_args(
                    socket.as_deref(),
                    window_id.as_deref(),
                    title,
                    file,
                    &wrapper,
                );
                launch_detached(binary, &args).await?;
                self.wait_for_marker(&marker).await
            }
            Capability::WeztermSplit { binary, pane_id } => {
                let marker = CompletionMarker::fresh()?;
                let wrapper = wrapper_command(&editor, marker.path());
                let args = wezterm_split_args(pane_id, self.settings.split_percent, &wrapper);
                launch_detached(binary, &args).await?;
                self.wait_for_marker(&marker).await
            }
        }
    }

    async fn run_blocking(&self, binary: &Path, args: &[String]) -> Result<OverlayStatus> {
        let mut child = Command::new(binary)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Overlay(format!("failed to spawn '{}': {e}", binary.display()))
            })?;

        tokio::select! {
            status = child.wait() => {
                let status = status
                    .map_err(|e| Error::Overlay(format!("wait error: {e}")))?;
                if status.success() {
                    debug!("popup closed");
                    Ok(OverlayStatus::Closed)
                } else {
                    Err(Error::Overlay(format!(
                        "'{}' exited with {status}",
                        binary.display()
                    )))
                }
            }
            _ = interrupted() => Err(Error::Interrupted),
            _ = deadline(self.settings.timeout) => {
                warn!(timeout = ?self.settings.timeout, "editor popup timed out");
                Ok(OverlayStatus::TimedOut)
            }
        }
    }

    async fn wait_for_marker(&self, marker: &CompletionMarker) -> Result<OverlayStatus> {
        let interval = self.settings.poll_interval;
        debug!(marker = %marker.path().display(), ?interval, "waiting for completion marker");

        let poll = async {
            while !marker.exists() {
                tokio::time::sleep(interval).await;
            }
        };

        tokio::select! {
            _ = poll => Ok(OverlayStatus::Closed),
            _ = interrupted() => Err(Error::Interrupted),
            _ = deadline(self.settings.timeout) => {
                warn!(
                    timeout = ?self.settings.timeout,
                    marker = %marker.path().display(),
                    "editor overlay timed out"
                );
                Ok(OverlayStatus::TimedOut)
            }
        }
    }
}

/// Run a non-blocking launch command to completion. A non-zero exit means
/// the terminal never started the wrapper, so there is nothing to wait for.
async fn launch_detached(binary: &Path, args: &[String]) -> Result<()> {
    let output = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::Overlay(format!("failed to spawn '{}': {e}", binary.display())))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Overlay(format!(
            "'{}' exited with {}: {}",
            binary.display(),
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}

/// Split the editor command with shell-word rules and append the file.
pub fn editor_argv(editor: &str, file: &Path) -> Result<Vec<String>> {
    let mut argv = shell_words::split(editor)
        .map_err(|e| Error::Overlay(format!("invalid editor command '{editor}': {e}")))?;
    if argv.is_empty() {
        return Err(Error::Overlay("editor command is empty".to_string()));
    }
    argv.push(file.to_string_lossy().into_owned());
    Ok(argv)
}

/// Shell snippet run inside non-blocking overlays: the editor, then the marker.
pub fn wrapper_command(editor_argv: &[String], marker: &Path) -> String {
    format!(
        "{}; : > {}",
        shell_words::join(editor_argv),
        shell_words::quote(&marker.to_string_lossy())
    )
}

pub fn tmux_popup_args(
    settings: &OverlaySettings,
    title: &str,
    editor_argv: &[String],
) -> Vec<String> {
    let mut args = vec![
        "display-popup".to_string(),
        "-E".to_string(),
        "-w".to_string(),
        settings.popup_width.clone(),
        "-h".to_string(),
        settings.popup_height.clone(),
        "-T".to_string(),
        title.to_string(),
        "--".to_string(),
    ];
    args.extend(editor_argv.iter().cloned());
    args
}

pub fn kitty_launch_args(
    socket: Option<&str>,
    window_id: Option<&str>,
    title: &str,
    file: &Path,
    wrapper: &str,
) -> Vec<String> {
    let mut args = vec!["@".to_string()];
    if let Some(socket) = socket {
        args.push("--to".to_string());
        args.push(socket.to_string());
    }
    args.push("launch".to_string());
    args.push("--type=overlay".to_string());

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    args.push(format!("--title={}: {name}", title.trim()));

    // Pin the overlay to the caller's window rather than the focused one.
    if let Some(id) = window_id {
        args.push("--match".to_string());
        args.push(format!("id:{id}"));
    }
    args.extend(["sh".to_string(), "-c".to_string(), wrapper.to_string()]);
    args
}

pub fn wezterm_split_args(pane_id: &str, percent: u8, wrapper: &str) -> Vec<String> {
    vec![
        "cli".to_string(),
        "split-pane".to_string(),
        "--bottom".to_string(),
        "--percent".to_string(),
        percent.to_string(),
        "--pane-id".to_string(),
        pane_id.to_string(),
        "--".to_string(),
        "sh".to_string(),
        "-c".to_string(),
        wrapper.to_string(),
    ]
}

/// Sentinel file the overlay wrapper creates once the editor exits. It lives
/// in a uniquely named directory that is removed on drop, so a wrapper that
/// finishes after the wait was abandoned has nowhere to write.
#[derive(Debug)]
pub struct CompletionMarker {
    dir: PathBuf,
    path: PathBuf,
}

impl CompletionMarker {
    pub fn fresh() -> Result<Self> {
        Self::in_dir(&std::env::temp_dir())
    }

    pub fn in_dir(parent: &Path) -> Result<Self> {
        let dir = parent.join(format!("redline-{}", Uuid::new_v4()));
        std::fs::create_dir(&dir)?;
        Ok(Self {
            path: dir.join("done"),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl Drop for CompletionMarker {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(marker = %self.path.display(), "removed completion marker"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                marker = %self.path.display(),
                "failed to remove completion marker: {e}"
            ),
        }
    }
}
