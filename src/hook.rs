use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const HOOK_EVENT_NAME: &str = "PreToolUse";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Proceed unchanged to the normal approval dialog.
    Ask,
    /// Reject the tool call; the reason is fed back to the agent.
    Deny,
}

#[derive(Debug, Deserialize, Default)]
struct HookEvent {
    #[serde(default)]
    tool_input: ToolInput,
}

#[derive(Debug, Deserialize, Default)]
struct ToolInput {
    #[serde(default)]
    plan: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    pub hook_specific_output: HookSpecificOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub permission_decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
}

/// Extract the plan text from a PreToolUse event. Empty, malformed, or
/// plan-less input all yield an empty string.
pub fn plan_from_event(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    match serde_json::from_str::<HookEvent>(raw) {
        Ok(event) => event.tool_input.plan.unwrap_or_default(),
        Err(e) => {
            debug!("ignoring unparseable hook event: {e}");
            String::new()
        }
    }
}

/// Build the PreToolUse response envelope. An empty reason is omitted.
pub fn make_response(decision: Decision, reason: &str) -> Result<String> {
    let response = HookResponse {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: HOOK_EVENT_NAME.to_string(),
            permission_decision: decision,
            permission_decision_reason: (!reason.is_empty()).then(|| reason.to_string()),
        },
    };
    serde_json::to_string_pretty(&response)
        .map_err(|e| Error::Hook(format!("failed to serialize hook response: {e}")))
}
