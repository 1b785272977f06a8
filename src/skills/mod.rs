pub mod builtin;
pub mod function;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::manager::ToolManager;
use crate::session::Session;

/// Runtime context passed to tool execution.
///
/// One context exists per agent session. It carries the mutable session
/// state (allow/deny lists, working directory), the loaded configuration
/// and the tool manager used by the `tool_manager` skill.
pub struct ToolContext {
    pub session: Session,
    pub config: Arc<Config>,
    pub manager: ToolManager,
}

impl ToolContext {
    pub fn new(session: Session, config: Arc<Config>, manager: ToolManager) -> Self {
        Self {
            session,
            config,
            manager,
        }
    }
}

/// A tool that the LLM can invoke via tool_use.
///
/// Tools are grouped into [`Skill`]s, which are the unit the agent
/// enables and disables. The runtime calls `execute()` when the LLM
/// requests a tool_use for `name()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique identifier across the whole registry (not just the owning skill).
    /// Lowercase alphanumeric + underscores (e.g. "execute_bash").
    fn name(&self) -> &str;

    /// Human-readable description shown to the LLM for tool selection.
    fn description(&self) -> &str;

    /// JSON Schema describing the keyword arguments this tool accepts,
    /// including defaults. Used as `input_schema` in tool definitions.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given parameters.
    /// The returned JSON object is sent back to the LLM as a `tool_result`.
    async fn execute(
        &self,
        params: serde_json::Value,
        context: &mut ToolContext,
    ) -> anyhow::Result<serde_json::Value>;
}

/// A named bundle of tools, enabled or disabled as a whole.
///
/// Skills are built once from static definitions and never change
/// afterwards. Validation (non-empty, no duplicate tool names) happens
/// when the skill is added to a [`SkillRegistry`].
pub struct Skill {
    name: String,
    description: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl Skill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Tool names in declaration order.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name())
    }
}

impl std::fmt::Debug for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skill")
            .field("name", &self.name)
            .field("tools", &self.tool_names().collect::<Vec<_>>())
            .finish()
    }
}

pub use function::FunctionTool;
pub use registry::{RegistryError, SkillRegistry, ToolInfo};
