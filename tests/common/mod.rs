#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use redline::config::Config;
use redline::overlay::OverlaySettings;

pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} in {} failed: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Working repo on `main` with one committed file, `README.md`.
pub fn setup_git_repo() -> tempfile::TempDir {
    let repo_dir = tempfile::TempDir::new().unwrap();
    run_git(repo_dir.path(), &["init", "-q"]);
    run_git(repo_dir.path(), &["config", "user.email", "test@test.com"]);
    run_git(repo_dir.path(), &["config", "user.name", "Test"]);
    run_git(repo_dir.path(), &["config", "commit.gpgsign", "false"]);
    std::fs::write(repo_dir.path().join("README.md"), "# Project\n\nHello.\n").unwrap();
    run_git(repo_dir.path(), &["add", "README.md"]);
    run_git(repo_dir.path(), &["commit", "-q", "-m", "init"]);
    run_git(repo_dir.path(), &["branch", "-M", "main"]);
    repo_dir
}

/// Write an executable `#!/bin/sh` script into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Editor that appends `line` to the file it is given.
pub fn appending_editor(dir: &Path, line: &str) -> PathBuf {
    write_script(
        dir,
        "editor",
        &format!("printf '%s\\n' '{line}' >> \"$1\""),
    )
}

/// Editor that leaves the file untouched.
pub fn noop_editor(dir: &Path) -> PathBuf {
    write_script(dir, "editor", "exit 0")
}

/// tmux stand-in: runs everything after `--` in the foreground, like
/// `display-popup -E` does.
pub fn fake_tmux(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "tmux",
        "while [ \"$#\" -gt 0 ] && [ \"$1\" != \"--\" ]; do shift; done\nshift\nexec \"$@\"",
    )
}

/// kitty/wezterm stand-in: records its arguments one per line in `log`, then
/// runs the trailing `sh -c` wrapper before returning.
pub fn fake_launcher(dir: &Path, name: &str, log: &Path) -> PathBuf {
    write_script(
        dir,
        name,
        &format!(
            "printf '%s\\n' \"$@\" > '{}'\nfor last; do :; done\nsh -c \"$last\"",
            log.display()
        ),
    )
}

/// Launcher that records its arguments but never runs the wrapper.
pub fn silent_launcher(dir: &Path, name: &str, log: &Path) -> PathBuf {
    write_script(
        dir,
        name,
        &format!("printf '%s\\n' \"$@\" > '{}'", log.display()),
    )
}

pub fn failing_launcher(dir: &Path, name: &str) -> PathBuf {
    write_script(dir, name, "echo 'remote control is disabled' >&2\nexit 3")
}

/// Settings that run `editor` and poll quickly.
pub fn test_settings(editor: &Path) -> OverlaySettings {
    OverlaySettings {
        editor: editor.display().to_string(),
        poll_interval: Duration::from_millis(20),
        ..OverlaySettings::from_config(&Config::default())
    }
}
