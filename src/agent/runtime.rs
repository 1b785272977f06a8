use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::manager::ToolManager;
use crate::session::Session;
use crate::skills::{Tool, ToolContext};

use super::log::SessionLog;

/// Per-session overrides applied on top of the loaded [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ToolOptions {
    /// Replaces `[bash] allowlist` when set.
    pub allowlist: Option<Vec<String>>,
    /// Replaces `[bash] blacklist` when set.
    pub blacklist: Option<Vec<String>>,
    /// Exact tool names to expose, ignoring the persisted skill set.
    pub enabled_tools: Option<Vec<String>>,
}

/// One agent session's view of the tools.
///
/// Owns the session context, resolves which tools are exposed on every
/// call (so enabling a skill mid-session takes effect immediately) and
/// records each call in the conversation log.
pub struct ToolRuntime {
    context: ToolContext,
    enabled_override: Option<Vec<String>>,
    log: Option<SessionLog>,
}

impl ToolRuntime {
    pub fn new(
        manager: ToolManager,
        config: Arc<Config>,
        mut session: Session,
        options: ToolOptions,
    ) -> Self {
        let allowlist = options.allowlist.or_else(|| config.bash.allowlist.clone());
        let blacklist = options.blacklist.or_else(|| config.bash.blacklist.clone());
        session.set_allowlist_blacklist(allowlist, blacklist);

        Self {
            context: ToolContext::new(session, config, manager),
            enabled_override: options.enabled_tools,
            log: None,
        }
    }

    /// Records tool calls to `log` from now on.
    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ToolContext {
        &mut self.context
    }

    pub fn log(&self) -> Option<&SessionLog> {
        self.log.as_ref()
    }

    /// Tools currently exposed to the agent.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.context
            .manager
            .enabled_tools(self.enabled_override.as_deref())
    }

    /// Tool definitions in the shape LLM APIs expect.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools()
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "input_schema": tool.parameters_schema(),
                })
            })
            .collect()
    }

    /// Runs one tool call. Never fails: problems come back as an error
    /// payload the agent can read.
    pub async fn call(&mut self, name: &str, params: Value) -> Value {
        let params = if params.is_null() { json!({}) } else { params };
        let start = Instant::now();

        let result = match self.tools().into_iter().find(|t| t.name() == name) {
            Some(tool) => match tool.execute(params.clone(), &mut self.context).await {
                Ok(value) => value,
                Err(e) => json!({
                    "status": "error",
                    "message": format!("{e:#}"),
                }),
            },
            None => {
                let message = if self.context.manager.registry().get_tool(name).is_some() {
                    format!("Tool '{name}' is not enabled")
                } else {
                    format!("Unknown tool: {name}")
                };
                json!({"status": "error", "message": message})
            }
        };

        let duration = start.elapsed().as_secs_f64();
        let success = result.get("status").and_then(Value::as_str) == Some("success");
        info!(tool = %name, success, duration_secs = duration, "Tool call");

        if let Some(log) = &self.log {
            if let Err(e) = log.log_tool_call(name, &params, &result, success, duration) {
                warn!("Failed to write conversation log: {e}");
            }
        }
        result
    }
}
