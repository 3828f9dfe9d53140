use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use crate::diff::annotation_diff;
use crate::error::{Error, Result};
use crate::hook::{Decision, make_response, plan_from_event};
use crate::overlay::{Environment, OverlayLauncher, OverlayStatus};
use crate::prompts::PromptEngine;

pub const PLAN_REVIEW_TITLE: &str = "Plan Review";

const NO_TERMINAL_REASON: &str =
    "no overlay terminal available (requires tmux, kitty, or wezterm), skipping plan annotation";

/// Caller-side settings for the plan workflow.
pub struct PlanReview<'a, E> {
    pub launcher: &'a OverlayLauncher<E>,
    pub prompts: &'a PromptEngine,
    pub context_lines: usize,
}

impl<E: Environment> PlanReview<'_, E> {
    /// Hook mode: `input` is the raw PreToolUse event. Returns the JSON
    /// response to print. Overlay failures other than an interrupt degrade to
    /// an `ask` response.
    pub async fn run_hook(&self, input: &str) -> Result<String> {
        let plan = plan_from_event(input);
        if plan.is_empty() {
            return make_response(Decision::Ask, "no plan content in hook event");
        }

        let (status, edited) = match self.annotate(&plan).await {
            Ok(result) => result,
            Err(Error::Interrupted) => return Err(Error::Interrupted),
            Err(e) => {
                warn!("plan annotation failed: {e}");
                return make_response(
                    Decision::Ask,
                    &format!("plan annotation failed ({e}), skipping plan annotation"),
                );
            }
        };

        match status {
            OverlayStatus::NoTerminal => make_response(Decision::Ask, NO_TERMINAL_REASON),
            OverlayStatus::TimedOut => make_response(
                Decision::Ask,
                "editor session timed out, skipping plan annotation",
            ),
            OverlayStatus::Closed => {
                let diff = annotation_diff(&plan, &edited, self.context_lines);
                if diff.is_empty() {
                    info!("plan reviewed without changes");
                    return make_response(Decision::Ask, "plan reviewed, no changes");
                }
                info!(
                    added = diff.added,
                    removed = diff.removed,
                    "plan annotated, sending feedback"
                );
                let feedback = self.prompts.plan_feedback(&diff.text)?;
                make_response(Decision::Deny, &feedback)
            }
        }
    }

    /// File mode: annotate a copy of `plan_file`. Returns the unified diff,
    /// or `None` when the user made no changes.
    pub async fn run_file(&self, plan_file: &Path) -> Result<Option<String>> {
        if !plan_file.is_file() {
            return Err(Error::FileNotFound(plan_file.to_path_buf()));
        }
        let plan = std::fs::read_to_string(plan_file)?;

        let (status, edited) = self.annotate(&plan).await?;
        match status {
            OverlayStatus::NoTerminal => Err(Error::NoOverlayTerminal),
            OverlayStatus::TimedOut => Err(Error::OverlayTimeout(
                self.launcher.settings().timeout.unwrap_or_default(),
            )),
            OverlayStatus::Closed => {
                let diff = annotation_diff(&plan, &edited, self.context_lines);
                info!(
                    file = %plan_file.display(),
                    added = diff.added,
                    removed = diff.removed,
                    "plan file reviewed"
                );
                Ok((!diff.is_empty()).then_some(diff.text))
            }
        }
    }

    /// Write `plan` to a scratch file, open it, and read it back. The scratch
    /// file is removed when this returns.
    async fn annotate(&self, plan: &str) -> Result<(OverlayStatus, String)> {
        let mut scratch = tempfile::Builder::new()
            .prefix("plan-review-")
            .suffix(".md")
            .tempfile()?;
        scratch.write_all(plan.as_bytes())?;
        scratch.flush()?;

        let status = self.launcher.open(scratch.path(), PLAN_REVIEW_TITLE).await?;
        let edited = match status {
            OverlayStatus::Closed => std::fs::read_to_string(scratch.path())?,
            _ => String::new(),
        };
        Ok((status, edited))
    }
}
