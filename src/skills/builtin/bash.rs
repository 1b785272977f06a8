use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{info, warn};

use crate::sandbox::{self, Decision, RunOutcome};
use crate::skills::function::str_param;
use crate::skills::{FunctionTool, Skill, Tool, ToolContext};

pub fn skill() -> Skill {
    Skill::new(
        "bash",
        "Execute bash commands and inspect the shell environment",
        vec![
            Arc::new(ExecuteBashTool),
            Arc::new(FunctionTool::with_context(
                "get_user",
                "Get the current user, home directory and working directory",
                json!({"type": "object", "properties": {}}),
                get_user,
            )),
            Arc::new(FunctionTool::with_context(
                "set_cwd",
                "Change the working directory used for subsequent bash commands",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Directory to switch to; relative paths and ~ are accepted"
                        }
                    },
                    "required": ["path"]
                }),
                set_cwd,
            )),
        ],
    )
}

/// Runs a command through `bash -c` in the session working directory.
///
/// The command is checked against the session blacklist first. When an
/// allowlist is configured, programs not yet on it are added before the
/// command runs.
pub struct ExecuteBashTool;

#[async_trait]
impl Tool for ExecuteBashTool {
    fn name(&self) -> &str {
        "execute_bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command in the current working directory and return its \
         stdout, stderr and exit code. Blacklisted commands are refused."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command line to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: Value, context: &mut ToolContext) -> anyhow::Result<Value> {
        let command = str_param(&params, "command")?;

        match context.session.policy.evaluate(command) {
            Decision::Block(entry) => {
                warn!("Blocked blacklisted command: {command}");
                return Ok(json!({
                    "status": "blocked",
                    "command": command,
                    "message": format!("Command '{entry}' is blacklisted"),
                }));
            }
            Decision::AllowAndRecord(programs) => {
                for program in &programs {
                    context.session.policy.add_to_allowlist(program);
                }
                info!("Added to allowlist: {}", programs.join(", "));
            }
            Decision::Allow => {}
        }

        let cwd = context.session.cwd().to_path_buf();
        let timeout = Duration::from_secs(context.config.bash.timeout_secs);

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command).current_dir(&cwd);

        let outcome = match sandbox::run(cmd, timeout).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return Ok(json!({
                    "status": "error",
                    "command": command,
                    "message": format!("Failed to start bash: {e}"),
                }))
            }
        };

        Ok(match outcome {
            RunOutcome::Finished(out) => {
                let status = if out.success() { "success" } else { "error" };
                json!({
                    "status": status,
                    "command": command,
                    "cwd": cwd.display().to_string(),
                    "stdout": out.stdout,
                    "stderr": out.stderr,
                    "returncode": out.code,
                })
            }
            RunOutcome::TimedOut => json!({
                "status": "timeout",
                "command": command,
                "message": format!("Command timed out after {}s", timeout.as_secs()),
            }),
        })
    }
}

fn get_user(_: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let home = dirs::home_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let shell = std::env::var("SHELL").unwrap_or_default();

    Ok(json!({
        "status": "success",
        "username": username,
        "home_directory": home,
        "current_working_directory": ctx.session.cwd().display().to_string(),
        "shell": shell,
    }))
}

fn set_cwd(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let path = str_param(params, "path")?;
    let cwd = ctx.session.set_cwd(path)?.display().to_string();
    Ok(json!({
        "status": "success",
        "message": format!("Working directory set to {cwd}"),
        "cwd": cwd,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    async fn bash(ctx: &mut ToolContext, command: &str) -> Value {
        ExecuteBashTool
            .execute(json!({ "command": command }), ctx)
            .await
            .unwrap()
    }

    #[test]
    fn test_skill_tools() {
        let skill = skill();
        assert_eq!(skill.name(), "bash");
        assert_eq!(
            skill.tool_names().collect::<Vec<_>>(),
            vec!["execute_bash", "get_user", "set_cwd"]
        );
    }

    #[tokio::test]
    async fn test_execute_bash_simple() {
        let mut ctx = testing::context();
        ctx.session
            .set_allowlist_blacklist(Some(vec!["echo".into()]), None);
        let result = bash(&mut ctx, "echo hello").await;
        assert_eq!(result["status"], "success");
        assert!(result["stdout"].as_str().unwrap().contains("hello"));
        assert_eq!(result["returncode"], 0);
    }

    #[tokio::test]
    async fn test_execute_bash_blacklisted() {
        let mut ctx = testing::context();
        ctx.session.set_allowlist_blacklist(None, Some(vec!["rm".into()]));
        let result = bash(&mut ctx, "rm file.txt").await;
        assert_eq!(result["status"], "blocked");
        assert!(result["message"]
            .as_str()
            .unwrap()
            .to_lowercase()
            .contains("blacklisted"));
    }

    #[tokio::test]
    async fn test_execute_bash_auto_adds_to_allowlist() {
        let mut ctx = testing::context();
        ctx.session
            .set_allowlist_blacklist(Some(vec!["ls".into()]), None);
        let result = bash(&mut ctx, "echo test").await;
        assert_eq!(result["status"], "success");
        assert!(ctx.session.policy.in_allowlist("echo"));
    }

    #[tokio::test]
    async fn test_execute_bash_nonzero_exit() {
        let mut ctx = testing::context();
        let result = bash(&mut ctx, "nonexistentcommand12345").await;
        assert_eq!(result["status"], "error");
        assert_ne!(result["returncode"], 0);
    }

    #[tokio::test]
    async fn test_execute_bash_runs_in_session_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = testing::context();
        ctx.session.set_cwd(dir.path().to_str().unwrap()).unwrap();
        let result = bash(&mut ctx, "pwd").await;
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            result["stdout"].as_str().unwrap().trim(),
            expected.to_str().unwrap()
        );
    }

    #[tokio::test]
    async fn test_execute_bash_timeout() {
        let mut config = crate::config::Config::default();
        config.bash.timeout_secs = 1;
        let mut ctx = testing::context_with(config);
        let result = bash(&mut ctx, "sleep 5").await;
        assert_eq!(result["status"], "timeout");
    }

    #[tokio::test]
    async fn test_execute_bash_missing_command_param() {
        let mut ctx = testing::context();
        let err = ExecuteBashTool
            .execute(json!({}), &mut ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("command"));
    }

    #[test]
    fn test_get_user() {
        let mut ctx = testing::context();
        let result = get_user(&json!({}), &mut ctx).unwrap();
        assert_eq!(result["status"], "success");
        assert!(result.get("username").is_some());
        assert!(result.get("home_directory").is_some());
        assert!(result.get("current_working_directory").is_some());
    }

    #[test]
    fn test_set_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = testing::context();
        let result = set_cwd(&json!({"path": dir.path().to_str().unwrap()}), &mut ctx).unwrap();
        assert!(result["message"]
            .as_str()
            .unwrap()
            .contains("Working directory set to"));
        assert_eq!(ctx.session.cwd(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_set_cwd_invalid() {
        let mut ctx = testing::context();
        assert!(set_cwd(&json!({"path": "/nonexistent/path/12345"}), &mut ctx).is_err());
    }
}
