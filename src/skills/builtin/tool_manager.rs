//! Builtin skill: lets the agent inspect and change its own tool set.
//!
//! Thin adapters over [`ToolManager`](crate::manager::ToolManager); changes
//! are persisted by the manager's store and apply from the next call on.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::skills::function::str_param;
use crate::skills::{FunctionTool, Skill, ToolContext};

fn tool_name_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "tool_name": {
                "type": "string",
                "description": description
            }
        },
        "required": ["tool_name"]
    })
}

pub fn skill() -> Skill {
    Skill::new(
        "tool_manager",
        "Inspect, enable and disable the agent's tools",
        vec![
            Arc::new(FunctionTool::with_context(
                "get_available_tools",
                "List every tool the agent knows about, with descriptions",
                json!({"type": "object", "properties": {}}),
                get_available_tools,
            )),
            Arc::new(FunctionTool::with_context(
                "list_enabled_tools",
                "List the currently enabled tools",
                json!({"type": "object", "properties": {}}),
                list_enabled_tools,
            )),
            Arc::new(FunctionTool::with_context(
                "enable_tool",
                "Enable a tool. This enables the whole skill that provides it.",
                tool_name_schema("Name of the tool to enable"),
                enable_tool,
            )),
            Arc::new(FunctionTool::with_context(
                "disable_tool",
                "Disable a tool. This disables the whole skill that provides it.",
                tool_name_schema("Name of the tool to disable"),
                disable_tool,
            )),
        ],
    )
}

fn get_available_tools(_: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    Ok(ctx.manager.get_available_tools())
}

fn list_enabled_tools(_: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    Ok(ctx.manager.list_enabled_tools())
}

fn enable_tool(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    Ok(ctx.manager.enable_tool(str_param(params, "tool_name")?))
}

fn disable_tool(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    Ok(ctx.manager.disable_tool(str_param(params, "tool_name")?))
}
