use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::git::Git;
use crate::overlay::{Environment, OverlayLauncher, OverlayStatus};

pub const REVIEW_FILE: &str = "review.diff";
pub const GIT_REVIEW_TITLE: &str = " Git Review ";

static DIFF_FILE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" b/(.+)$").unwrap());
static HUNK_CONTEXT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@@ .+? @@\s*(.+)").unwrap());
static UNSAFE_DIR_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_.-]").unwrap());

/// Headers between `diff --git` and the first hunk that carry no review value.
const TECHNICAL_HEADERS: &[&str] = &[
    "index ",
    "--- ",
    "+++ ",
    "old mode",
    "new mode",
    "new file mode",
    "deleted file mode",
    "similarity index",
    "rename from",
    "rename to",
    "copy from",
    "copy to",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    Uncommitted,
    Branch,
}

/// What to diff: the mode plus the revision arguments handed to `git diff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffTarget {
    pub mode: DiffMode,
    pub revision: String,
}

impl DiffTarget {
    /// Staged and unstaged changes against HEAD.
    pub fn uncommitted() -> Self {
        Self {
            mode: DiffMode::Uncommitted,
            revision: "HEAD".to_string(),
        }
    }

    /// Changes on the current branch since it forked from `base_ref`.
    /// Explicit ranges (`a..b`, `a...b`) are used verbatim.
    pub fn branch(base_ref: &str) -> Self {
        let revision = if base_ref.contains("..") {
            base_ref.to_string()
        } else {
            format!("{base_ref}...HEAD")
        };
        Self {
            mode: DiffMode::Branch,
            revision,
        }
    }

    /// The base side of the revision, e.g. `main` for `main...HEAD`.
    pub fn base(&self) -> &str {
        self.revision
            .split_once("...")
            .or_else(|| self.revision.split_once(".."))
            .map(|(base, _)| base)
            .unwrap_or(&self.revision)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    New,
    Modified,
    Deleted,
    Renamed,
    Copied,
    Changed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::New => write!(f, "new"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Deleted => write!(f, "deleted"),
            FileStatus::Renamed => write!(f, "renamed"),
            FileStatus::Copied => write!(f, "copied"),
            FileStatus::Changed => write!(f, "changed"),
        }
    }
}

/// Pick the diff target: an explicit base wins, then uncommitted work, then
/// the current branch against the default branch.
pub fn resolve_target(git: &Git, base_ref: Option<&str>) -> DiffTarget {
    if let Some(base) = base_ref {
        return DiffTarget::branch(base);
    }
    if has_uncommitted_changes(git) {
        return DiffTarget::uncommitted();
    }
    DiffTarget::branch(&detect_default_branch(git))
}

pub fn detect_default_branch(git: &Git) -> String {
    let origin_head = git.stdout(&["symbolic-ref", "refs/remotes/origin/HEAD"]);
    if let Some(branch) = origin_head.strip_prefix("refs/remotes/origin/") {
        return branch.to_string();
    }

    const CANDIDATES: [&str; 3] = ["master", "main", "trunk"];
    for branch in CANDIDATES {
        if git.ok(&["rev-parse", "--verify", &format!("origin/{branch}")]) {
            return branch.to_string();
        }
    }
    for branch in CANDIDATES {
        if git.ok(&["rev-parse", "--verify", branch]) {
            return branch.to_string();
        }
    }
    "master".to_string()
}

/// Staged, unstaged, or untracked (non-ignored) changes exist.
pub fn has_uncommitted_changes(git: &Git) -> bool {
    !git.stdout(&["diff", "--name-only"]).is_empty()
        || !git.stdout(&["diff", "--cached", "--name-only"]).is_empty()
        || !untracked_files(git).is_empty()
}

pub fn untracked_files(git: &Git) -> Vec<String> {
    git.lines(&["ls-files", "--others", "--exclude-standard"])
}

pub fn current_branch(git: &Git) -> String {
    git.stdout(&["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Repository name from the `origin` URL, else the working directory name.
pub fn project_name(git: &Git) -> String {
    let remote = git.stdout(&["remote", "get-url", "origin"]);
    if let Some(name) = project_name_from_remote(&remote) {
        return name;
    }
    git.dir()
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".to_string())
}

pub fn project_name_from_remote(url: &str) -> Option<String> {
    let last = url.trim().trim_end_matches('/').rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then(|| name.to_string())
}

/// Parse `git diff --name-status`. Renames and copies are keyed by their
/// new path.
pub fn parse_name_status(output: &str) -> BTreeMap<String, FileStatus> {
    let mut statuses = BTreeMap::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            continue;
        }
        let code = fields[0];
        if (code.starts_with('R') || code.starts_with('C')) && fields.len() >= 3 {
            let status = if code.starts_with('R') {
                FileStatus::Renamed
            } else {
                FileStatus::Copied
            };
            statuses.insert(fields[2].to_string(), status);
            continue;
        }
        let status = match code.chars().next() {
            Some('A') => FileStatus::New,
            Some('M') => FileStatus::Modified,
            Some('D') => FileStatus::Deleted,
            _ => FileStatus::Changed,
        };
        statuses.insert(fields[1..].join("\t"), status);
    }
    statuses
}

pub fn file_statuses(git: &Git, target: &DiffTarget) -> BTreeMap<String, FileStatus> {
    parse_name_status(&git.stdout(&["diff", "--name-status", &target.revision]))
}

/// Rewrite a raw `git diff` into a friendlier review layout: one
/// `=== path (status) ===` banner per file, no technical headers, and `···`
/// separators in place of hunk headers.
pub fn clean_diff(raw: &str, statuses: &BTreeMap<String, FileStatus>) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let mut output: Vec<String> = Vec::new();
    let mut in_header = true;

    for line in raw.lines() {
        if line.starts_with("diff --git ") {
            if let Some(caps) = DIFF_FILE_HEADER.captures(line) {
                let path = &caps[1];
                let status = statuses.get(path).copied().unwrap_or(FileStatus::Changed);
                if !output.is_empty() {
                    output.push(String::new());
                }
                output.push(format!("=== {path} ({status}) ==="));
                output.push(String::new());
            }
            in_header = true;
            continue;
        }

        if in_header && TECHNICAL_HEADERS.iter().any(|h| line.starts_with(h)) {
            continue;
        }

        if line.starts_with("@@") {
            in_header = false;
            match HUNK_CONTEXT.captures(line) {
                Some(caps) => output.push(format!("··· {}", &caps[1])),
                None => output.push("···".to_string()),
            }
            continue;
        }

        in_header = false;
        output.push(line.to_string());
    }

    output.join("\n") + "\n"
}

/// Synthetic sections for untracked files, every line shown as an addition.
/// Unreadable and non-UTF-8 files are skipped.
pub fn untracked_sections(root: &Path, files: &[String]) -> String {
    let mut sections = Vec::new();
    for file in files {
        let content = match std::fs::read_to_string(root.join(file)) {
            Ok(c) => c,
            Err(e) => {
                debug!(file = %file, "skipping untracked file: {e}");
                continue;
            }
        };
        let prefixed: Vec<String> = content.lines().map(|l| format!("+{l}")).collect();
        sections.push(format!("=== {file} (untracked) ===\n\n{}", prefixed.join("\n")));
    }
    if sections.is_empty() {
        String::new()
    } else {
        sections.join("\n\n") + "\n"
    }
}

/// One-line summary shown at the top of the review file.
pub fn review_header(git: &Git, target: &DiffTarget) -> String {
    let mut parts = vec![format!("Branch: {}", current_branch(git))];

    match target.mode {
        DiffMode::Uncommitted => {
            let staged = git.lines(&["diff", "--cached", "--name-only"]).len();
            let unstaged = git.lines(&["diff", "--name-only"]).len();
            let untracked = untracked_files(git).len();
            parts.push(format!("Staged: {staged}"));
            parts.push(format!("Unstaged: {unstaged}"));
            if untracked > 0 {
                parts.push(format!("Untracked: {untracked}"));
            }
        }
        DiffMode::Branch => {
            let base = target.base();
            let range = if target.revision.contains("...") {
                format!("{base}..HEAD")
            } else {
                target.revision.clone()
            };
            let commits = git.stdout(&["rev-list", "--count", &range]);
            let files = git.lines(&["diff", "--name-only", &target.revision]).len();
            parts.push(format!("Base: {base}"));
            parts.push(format!(
                "Commits: {}",
                if commits.is_empty() { "?" } else { commits.as_str() }
            ));
            parts.push(format!("Files: {files}"));
        }
    }

    parts.join(" | ")
}

/// Full review file content, or `None` when there is nothing to review.
pub fn build_review_content(git: &Git, target: &DiffTarget) -> Option<String> {
    let raw = git.stdout(&["diff", &target.revision]);
    let cleaned = clean_diff(&raw, &file_statuses(git, target));

    let untracked = match target.mode {
        DiffMode::Uncommitted => untracked_sections(git.dir(), &untracked_files(git)),
        DiffMode::Branch => String::new(),
    };

    if cleaned.is_empty() && untracked.is_empty() {
        return None;
    }

    let mut parts = vec![format!("# {}", review_header(git, target))];
    if !cleaned.is_empty() {
        parts.push(cleaned);
    }
    if !untracked.is_empty() {
        parts.push(untracked);
    }
    Some(parts.join("\n\n") + "\n")
}

/// Review repo location for a project and branch under `root`.
pub fn review_dir(root: &Path, project: &str, branch: &str) -> PathBuf {
    let name = format!("{project}-{branch}");
    let safe = UNSAFE_DIR_CHARS.replace_all(&name, "-");
    root.join(format!("git-review-{safe}"))
}

/// Scratch git repo that tracks the review file so the user's annotations
/// can be read back as a diff.
#[derive(Debug, Clone)]
pub struct ReviewRepo {
    dir: PathBuf,
}

impl ReviewRepo {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn review_file(&self) -> PathBuf {
        self.dir.join(REVIEW_FILE)
    }

    /// Initialise the repo if needed, then commit `content` as the new
    /// baseline.
    pub fn sync(&self, content: &str) -> Result<()> {
        let git = Git::new(&self.dir);
        if !self.dir.join(".git").exists() {
            std::fs::create_dir_all(&self.dir)?;
            git.run(&["init", "-q"])?;
            git.run(&["config", "user.email", "review@local"])?;
            git.run(&["config", "user.name", "review"])?;
            git.run(&["config", "commit.gpgsign", "false"])?;
            info!(dir = %self.dir.display(), "initialised review repo");
        }

        std::fs::write(self.review_file(), content)?;
        git.run(&["add", REVIEW_FILE])?;
        git.run(&[
            "commit",
            "-q",
            "--no-verify",
            "--allow-empty",
            "-m",
            "update review",
        ])?;
        Ok(())
    }

    /// The user's edits to the review file since the last sync.
    pub fn annotations(&self) -> Result<String> {
        Git::new(&self.dir).run(&["diff"])
    }

    /// Delete the repo. Returns whether anything was removed.
    pub fn remove(&self) -> Result<bool> {
        if !self.dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&self.dir)?;
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    NothingToReview,
    Unchanged,
    Annotated(String),
}

/// Review session for the repository `git` points at.
pub struct GitReview<'a, E> {
    pub git: &'a Git,
    pub launcher: &'a OverlayLauncher<E>,
    pub review_root: &'a Path,
}

impl<E: Environment> GitReview<'_, E> {
    pub fn repo(&self) -> ReviewRepo {
        ReviewRepo::new(review_dir(
            self.review_root,
            &project_name(self.git),
            &current_branch(self.git),
        ))
    }

    pub async fn run(&self, base_ref: Option<&str>) -> Result<ReviewOutcome> {
        if !self.git.ok(&["rev-parse", "--is-inside-work-tree"]) {
            return Err(Error::NotARepository);
        }

        let target = resolve_target(self.git, base_ref);
        info!(mode = ?target.mode, revision = %target.revision, "resolved review target");

        let Some(content) = build_review_content(self.git, &target) else {
            return Ok(ReviewOutcome::NothingToReview);
        };

        let repo = self.repo();
        repo.sync(&content)?;

        match self
            .launcher
            .open(&repo.review_file(), GIT_REVIEW_TITLE)
            .await?
        {
            OverlayStatus::NoTerminal => Err(Error::NoOverlayTerminal),
            OverlayStatus::TimedOut => Err(Error::OverlayTimeout(
                self.launcher.settings().timeout.unwrap_or_default(),
            )),
            OverlayStatus::Closed => {
                let annotations = repo.annotations()?;
                if annotations.is_empty() {
                    Ok(ReviewOutcome::Unchanged)
                } else {
                    Ok(ReviewOutcome::Annotated(annotations))
                }
            }
        }
    }
}
