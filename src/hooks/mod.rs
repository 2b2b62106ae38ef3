//! Post-transition hooks
//!
//! Hooks are user commands configured per target state. They run after a
//! transition is committed and never affect its outcome; their results are
//! journaled for audit.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapters::{run_command, AdapterError, AdapterResult, HookExecutor};
use penplot_journal::{HookRun, JobState};

/// Captured hook output is cut to this many bytes
pub const MAX_HOOK_OUTPUT: usize = 4096;

fn default_hook_timeout() -> u64 {
    30
}

/// A configured hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookSpec {
    /// Target state that triggers the hook
    pub on: JobState,
    /// argv
    pub command: Vec<String>,
    #[serde(default = "default_hook_timeout")]
    pub timeout_seconds: u64,
}

impl HookSpec {
    /// Label used in journal records
    pub fn label(&self) -> String {
        self.command.join(" ")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Hooks that fire when entering `state`
pub fn hooks_for(hooks: &[HookSpec], state: JobState) -> Vec<HookSpec> {
    hooks.iter().filter(|h| h.on == state).cloned().collect()
}

/// What a hook is told about the transition that triggered it
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    pub job_id: String,
    pub from_state: JobState,
    pub to_state: JobState,
    pub reason: String,
}

impl HookContext {
    /// Environment passed to hook commands
    pub fn env(&self) -> Vec<(String, String)> {
        vec![
            ("PENPLOT_JOB_ID".to_string(), self.job_id.clone()),
            ("PENPLOT_FROM_STATE".to_string(), self.from_state.to_string()),
            ("PENPLOT_TO_STATE".to_string(), self.to_state.to_string()),
            ("PENPLOT_REASON".to_string(), self.reason.clone()),
        ]
    }
}

/// Runs hook commands one after another
#[derive(Debug, Clone, Default)]
pub struct CommandHookExecutor;

impl CommandHookExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl HookExecutor for CommandHookExecutor {
    fn execute(&self, hooks: &[HookSpec], context: &HookContext) -> AdapterResult<Vec<HookRun>> {
        if let Some(hook) = hooks.iter().find(|h| h.command.is_empty()) {
            return Err(AdapterError::Command(format!(
                "hook for {} has an empty command",
                hook.on
            )));
        }

        let env = context.env();
        let mut results = Vec::with_capacity(hooks.len());
        for hook in hooks {
            let run = match run_command(&hook.command, &env, hook.timeout()) {
                Ok(output) => HookRun {
                    hook: hook.label(),
                    success: output.success,
                    output: truncate(format!("{}{}", output.stdout, output.stderr)),
                },
                Err(err) => {
                    warn!(job_id = %context.job_id, hook = %hook.label(), error = %err, "hook failed");
                    HookRun {
                        hook: hook.label(),
                        success: false,
                        output: err.to_string(),
                    }
                }
            };
            debug!(job_id = %context.job_id, hook = %run.hook, success = run.success, "hook finished");
            results.push(run);
        }
        Ok(results)
    }
}

fn truncate(mut output: String) -> String {
    if output.len() > MAX_HOOK_OUTPUT {
        let mut end = MAX_HOOK_OUTPUT;
        while !output.is_char_boundary(end) {
            end -= 1;
        }
        output.truncate(end);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> HookContext {
        HookContext {
            job_id: "abc123".to_string(),
            from_state: JobState::Armed,
            to_state: JobState::Plotting,
            reason: "go".to_string(),
        }
    }

    fn spec(on: JobState, command: &[&str]) -> HookSpec {
        HookSpec {
            on,
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_hook_spec_defaults() {
        let spec: HookSpec =
            serde_json::from_str(r#"{"on": "COMPLETED", "command": ["true"]}"#).unwrap();
        assert_eq!(spec.on, JobState::Completed);
        assert_eq!(spec.timeout_seconds, 30);
    }

    #[test]
    fn test_hooks_for_filters_by_state() {
        let hooks = vec![
            spec(JobState::Plotting, &["a"]),
            spec(JobState::Completed, &["b"]),
            spec(JobState::Plotting, &["c"]),
        ];
        let selected = hooks_for(&hooks, JobState::Plotting);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[1].label(), "c");
        assert!(hooks_for(&hooks, JobState::Aborted).is_empty());
    }

    #[test]
    fn test_empty_command_is_executor_error() {
        let result = CommandHookExecutor::new().execute(&[spec(JobState::Plotting, &[])], &context());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_binary_recorded_as_failure() {
        let runs = CommandHookExecutor::new()
            .execute(&[spec(JobState::Plotting, &["penplot-no-such-hook"])], &context())
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert!(!runs[0].success);
    }

    #[cfg(unix)]
    #[test]
    fn test_hook_sees_transition_env() {
        let runs = CommandHookExecutor::new()
            .execute(
                &[spec(
                    JobState::Plotting,
                    &["sh", "-c", "echo $PENPLOT_JOB_ID $PENPLOT_FROM_STATE $PENPLOT_TO_STATE"],
                )],
                &context(),
            )
            .unwrap();
        assert!(runs[0].success);
        assert_eq!(runs[0].output.trim(), "abc123 ARMED PLOTTING");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let long = "é".repeat(MAX_HOOK_OUTPUT);
        let cut = truncate(long);
        assert!(cut.len() <= MAX_HOOK_OUTPUT);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
