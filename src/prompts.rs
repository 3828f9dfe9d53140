use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

const DEFAULT_PLAN_FEEDBACK: &str = include_str!("default_prompts/plan-feedback.md");

fn default_template(name: &str) -> Option<&'static str> {
    match name {
        "plan-feedback" => Some(DEFAULT_PLAN_FEEDBACK),
        _ => None,
    }
}

fn template_filename(name: &str) -> String {
    format!("{name}.md")
}

/// Feedback templates with embedded defaults and user overrides.
pub struct PromptEngine {
    override_dir: Option<PathBuf>,
}

impl PromptEngine {
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        Self { override_dir }
    }

    /// Load a template by name. A file in `override_dir` takes precedence
    /// over the embedded default.
    pub fn load_template(&self, name: &str) -> Result<String> {
        let default = default_template(name)
            .ok_or_else(|| Error::Prompt(format!("unknown prompt template: {name}")))?;

        if let Some(ref dir) = self.override_dir {
            let path = dir.join(template_filename(name));
            if path.exists() {
                debug!(path = %path.display(), "using prompt override");
                return read_override(&path);
            }
        }

        Ok(default.to_string())
    }

    pub fn render(&self, name: &str, vars: &HashMap<String, String>) -> Result<String> {
        let template = self.load_template(name)?;
        render_template(&template, vars)
    }

    /// Feedback sent back to the agent when the user changed the plan.
    pub fn plan_feedback(&self, diff: &str) -> Result<String> {
        let vars = HashMap::from([("diff".to_string(), diff.to_string())]);
        self.render("plan-feedback", &vars)
    }
}

fn read_override(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::Prompt(format!(
            "failed to read override template {}: {e}",
            path.display()
        ))
    })
}

/// Render `{{ variable }}` placeholders. Undefined variables are errors.
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> Result<String> {
    let engine = upon::Engine::new();
    let compiled = engine
        .compile(template)
        .map_err(|e| Error::Prompt(format!("invalid template: {e}")))?;
    let rendered = compiled
        .render(&engine, vars)
        .to_string()
        .map_err(|e| Error::Prompt(format!("failed to render template: {e}")))?;
    Ok(rendered.trim_end().to_string())
}
