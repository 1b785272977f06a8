//! Tool-manager operations
//!
//! Bridges the read-only [`SkillRegistry`] and the persisted enabled-skill
//! set. The agent names a *tool*; activation happens at the granularity of
//! the skill that owns it, so a tool is never half enabled alongside its
//! siblings.
//!
//! Every operation returns a JSON payload with at least `status`
//! (`"success"` or `"error"`) and `message`. Nothing here returns `Err`:
//! the caller is an agent loop that has to keep running.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config_manager::{ConfigError, SkillStore};
use crate::skills::{SkillRegistry, Tool};

#[derive(Clone)]
pub struct ToolManager {
    registry: Arc<SkillRegistry>,
    store: Arc<dyn SkillStore>,
}

impl ToolManager {
    pub fn new(registry: Arc<SkillRegistry>, store: Arc<dyn SkillStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    /// Tool names of the currently enabled skills, in registry order.
    /// Re-read from the store on every call.
    pub fn enabled_tool_names(&self) -> Result<Vec<String>, ConfigError> {
        let skills = self.store.get_enabled_skills()?;
        Ok(self.registry.get_tool_names_for_skills(&skills))
    }

    /// Like [`Self::enabled_tool_names`], but falls back to every known
    /// tool when the enabled set cannot be read. Availability wins over
    /// least privilege here; callers that need strictness pass an explicit
    /// tool list to [`Self::enabled_tools`] instead.
    pub fn enabled_tool_names_or_all(&self) -> Vec<String> {
        match self.enabled_tool_names() {
            Ok(names) => names,
            Err(e) => {
                warn!("Cannot read enabled skills ({e}), exposing all tools");
                self.registry.get_all_tool_names()
            }
        }
    }

    /// Tools to expose to the agent. `explicit` overrides the persisted
    /// configuration entirely.
    pub fn enabled_tools(&self, explicit: Option<&[String]>) -> Vec<Arc<dyn Tool>> {
        match explicit {
            Some(names) => self.registry.get_enabled_tools(names),
            None => self
                .registry
                .get_enabled_tools(&self.enabled_tool_names_or_all()),
        }
    }

    pub fn list_enabled_tools(&self) -> Value {
        match self.enabled_tool_names() {
            Ok(names) => json!({
                "status": "success",
                "message": format!("{} tools enabled", names.len()),
                "count": names.len(),
                "enabled_tools": names,
            }),
            Err(e) => json!({
                "status": "error",
                "message": format!("Failed to list enabled tools: {e}"),
            }),
        }
    }

    pub fn get_available_tools(&self) -> Value {
        let info = self.registry.get_all_tools_info();
        if info.is_empty() {
            return json!({
                "status": "error",
                "message": "Tool registry is empty",
                "available_tools": {},
                "count": 0,
            });
        }

        let available: serde_json::Map<String, Value> = info
            .into_iter()
            .map(|(name, info)| (name, Value::String(info.description)))
            .collect();
        json!({
            "status": "success",
            "message": format!("{} tools available", available.len()),
            "count": available.len(),
            "available_tools": available,
        })
    }

    pub fn enable_tool(&self, tool_name: &str) -> Value {
        self.change_tool(tool_name, Change::Enable)
    }

    pub fn disable_tool(&self, tool_name: &str) -> Value {
        self.change_tool(tool_name, Change::Disable)
    }

    fn change_tool(&self, tool_name: &str, change: Change) -> Value {
        let Some(skill) = self.registry.get_skill_for_tool(tool_name) else {
            return json!({
                "status": "error",
                "message": format!("Unknown tool: {tool_name}"),
            });
        };

        let result = match change {
            Change::Enable => self.store.add_skill(skill),
            Change::Disable => self.store.remove_skill(skill),
        };
        if let Err(e) = result {
            warn!(tool = %tool_name, skill = %skill, retryable = e.is_retryable(), "Failed to {} tool: {e}", change.verb());
            return json!({
                "status": "error",
                "message": format!("Failed to {} tool: {e}", change.verb()),
            });
        }

        info!(tool = %tool_name, skill = %skill, "Skill {}", change.past());
        let mut payload = json!({
            "status": "success",
            "message": format!(
                "Skill '{skill}' {} (provides '{tool_name}')",
                change.past()
            ),
            "skill": skill,
        });
        // The change is saved; a failed re-read only loses the summary
        match self.enabled_tool_names() {
            Ok(enabled) => payload["enabled_tools"] = json!(enabled),
            Err(e) => {
                warn!(skill = %skill, "Cannot re-read enabled skills after change: {e}");
                payload["warning"] = json!(format!("Enabled tools could not be re-read: {e}"));
            }
        }
        payload
    }
}

#[derive(Clone, Copy)]
enum Change {
    Enable,
    Disable,
}

impl Change {
    fn verb(self) -> &'static str {
        match self {
            Change::Enable => "enable",
            Change::Disable => "disable",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Change::Enable => "enabled",
            Change::Disable => "disabled",
        }
    }
}
