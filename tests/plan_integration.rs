mod common;

use redline::error::Error;
use redline::hook::{Decision, HookResponse};
use redline::overlay::{OverlayLauncher, OverlaySettings};
use redline::plan::PlanReview;
use redline::prompts::PromptEngine;
use redline::test_helpers::StaticEnvironment;

use common::{appending_editor, fake_tmux, noop_editor, test_settings};

const EVENT: &str = r##"{
  "session_id": "abc",
  "hook_event_name": "PreToolUse",
  "tool_name": "ExitPlanMode",
  "tool_input": {"plan": "# Plan\n- task 1\n- task 2\n"}
}"##;

fn tmux_launcher(bin: &std::path::Path, settings: OverlaySettings) -> OverlayLauncher<StaticEnvironment> {
    let env = StaticEnvironment::new()
        .with_var("TMUX", "/tmp/tmux-1000/default,1,0")
        .with_binary("tmux", fake_tmux(bin));
    OverlayLauncher::new(env, settings)
}

fn parse(raw: &str) -> (Decision, Option<String>) {
    let response: HookResponse = serde_json::from_str(raw).unwrap();
    let out = response.hook_specific_output;
    assert_eq!(out.hook_event_name, "PreToolUse");
    (out.permission_decision, out.permission_decision_reason)
}

#[tokio::test]
async fn test_hook_annotation_denies_with_feedback() {
    let bin = tempfile::TempDir::new().unwrap();
    let launcher = tmux_launcher(
        bin.path(),
        test_settings(&appending_editor(bin.path(), "add timestamps")),
    );
    let prompts = PromptEngine::new(None);
    let review = PlanReview {
        launcher: &launcher,
        prompts: &prompts,
        context_lines: 2,
    };

    let raw = review.run_hook(EVENT).await.unwrap();
    let (decision, reason) = parse(&raw);
    assert_eq!(decision, Decision::Deny);
    let reason = reason.unwrap();
    assert!(reason.contains("+add timestamps"), "{reason}");
    assert!(reason.contains(" - task 2"));
    assert!(reason.contains("--- original"));
    assert!(reason.ends_with("then call ExitPlanMode again."));
}

#[tokio::test]
async fn test_hook_unchanged_plan_asks() {
    let bin = tempfile::TempDir::new().unwrap();
    let launcher = tmux_launcher(bin.path(), test_settings(&noop_editor(bin.path())));
    let prompts = PromptEngine::new(None);
    let review = PlanReview {
        launcher: &launcher,
        prompts: &prompts,
        context_lines: 2,
    };

    let (decision, reason) = parse(&review.run_hook(EVENT).await.unwrap());
    assert_eq!(decision, Decision::Ask);
    assert_eq!(reason.as_deref(), Some("plan reviewed, no changes"));
}

#[tokio::test]
async fn test_hook_uses_prompt_override() {
    let bin = tempfile::TempDir::new().unwrap();
    let prompts_dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        prompts_dir.path().join("plan-feedback.md"),
        "FEEDBACK\n{{ diff }}",
    )
    .unwrap();

    let launcher = tmux_launcher(
        bin.path(),
        test_settings(&appending_editor(bin.path(), "more tests")),
    );
    let prompts = PromptEngine::new(Some(prompts_dir.path().to_path_buf()));
    let review = PlanReview {
        launcher: &launcher,
        prompts: &prompts,
        context_lines: 2,
    };

    let (decision, reason) = parse(&review.run_hook(EVENT).await.unwrap());
    assert_eq!(decision, Decision::Deny);
    let reason = reason.unwrap();
    assert!(reason.starts_with("FEEDBACK\n--- original"), "{reason}");
    assert!(reason.contains("+more tests"));
}

#[tokio::test]
async fn test_hook_overlay_failure_asks() {
    let bin = tempfile::TempDir::new().unwrap();
    let settings = OverlaySettings {
        editor: "vim 'broken".to_string(),
        ..test_settings(&noop_editor(bin.path()))
    };
    let launcher = tmux_launcher(bin.path(), settings);
    let prompts = PromptEngine::new(None);
    let review = PlanReview {
        launcher: &launcher,
        prompts: &prompts,
        context_lines: 2,
    };

    let (decision, reason) = parse(&review.run_hook(EVENT).await.unwrap());
    assert_eq!(decision, Decision::Ask);
    assert!(reason.unwrap().starts_with("plan annotation failed"));
}

#[tokio::test]
async fn test_file_mode_returns_diff_and_leaves_file() {
    let bin = tempfile::TempDir::new().unwrap();
    let work = tempfile::TempDir::new().unwrap();
    let plan = work.path().join("plan.md");
    std::fs::write(&plan, "# Plan\n- task 1\n").unwrap();

    let launcher = tmux_launcher(
        bin.path(),
        test_settings(&appending_editor(bin.path(), "- task 2")),
    );
    let prompts = PromptEngine::new(None);
    let review = PlanReview {
        launcher: &launcher,
        prompts: &prompts,
        context_lines: 2,
    };

    let diff = review.run_file(&plan).await.unwrap().unwrap();
    assert_eq!(
        diff,
        "--- original\n+++ annotated\n@@ -1,2 +1,3 @@\n # Plan\n - task 1\n+- task 2\n"
    );
    assert_eq!(std::fs::read_to_string(&plan).unwrap(), "# Plan\n- task 1\n");
}

#[tokio::test]
async fn test_file_mode_unchanged_returns_none() {
    let bin = tempfile::TempDir::new().unwrap();
    let work = tempfile::TempDir::new().unwrap();
    let plan = work.path().join("plan.md");
    std::fs::write(&plan, "# Plan\n").unwrap();

    let launcher = tmux_launcher(bin.path(), test_settings(&noop_editor(bin.path())));
    let prompts = PromptEngine::new(None);
    let review = PlanReview {
        launcher: &launcher,
        prompts: &prompts,
        context_lines: 2,
    };

    assert_eq!(review.run_file(&plan).await.unwrap(), None);
}

#[tokio::test]
async fn test_file_mode_missing_file() {
    let bin = tempfile::TempDir::new().unwrap();
    let launcher = tmux_launcher(bin.path(), test_settings(&noop_editor(bin.path())));
    let prompts = PromptEngine::new(None);
    let review = PlanReview {
        launcher: &launcher,
        prompts: &prompts,
        context_lines: 2,
    };

    let err = review
        .run_file(&bin.path().join("missing.md"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
    assert!(err.to_string().starts_with("file not found"));
}
