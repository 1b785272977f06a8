//! Builtin skill: allow/deny list management.
//!
//! Edits the lists held by the current session's
//! [`CommandPolicy`](crate::sandbox::CommandPolicy). Changes last for the
//! session only; initial lists come from the `[bash]` config section.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::skills::function::str_param;
use crate::skills::{FunctionTool, Skill, ToolContext};

fn command_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "command": {
                "type": "string",
                "description": description
            }
        },
        "required": ["command"]
    })
}

pub fn skill() -> Skill {
    Skill::new(
        "config",
        "Manage the command allowlist and blacklist for this session",
        vec![
            Arc::new(FunctionTool::with_context(
                "add_to_allowlist",
                "Add a command to the allowlist",
                command_schema("Command (program name) to allow"),
                add_to_allowlist,
            )),
            Arc::new(FunctionTool::with_context(
                "remove_from_allowlist",
                "Remove a command from the allowlist",
                command_schema("Command to remove from the allowlist"),
                remove_from_allowlist,
            )),
            Arc::new(FunctionTool::with_context(
                "add_to_blacklist",
                "Add a command to the blacklist so it is never executed",
                command_schema("Program name, or a multi-word command prefix, to block"),
                add_to_blacklist,
            )),
            Arc::new(FunctionTool::with_context(
                "remove_from_blacklist",
                "Remove a command from the blacklist",
                command_schema("Command to remove from the blacklist"),
                remove_from_blacklist,
            )),
            Arc::new(FunctionTool::with_context(
                "list_allowlist",
                "List all allowlisted commands",
                json!({"type": "object", "properties": {}}),
                list_allowlist,
            )),
            Arc::new(FunctionTool::with_context(
                "list_blacklist",
                "List all blacklisted commands",
                json!({"type": "object", "properties": {}}),
                list_blacklist,
            )),
            Arc::new(FunctionTool::with_context(
                "is_in_allowlist",
                "Check whether a command is allowlisted",
                command_schema("Command to check"),
                is_in_allowlist,
            )),
            Arc::new(FunctionTool::with_context(
                "is_in_blacklist",
                "Check whether a command is blacklisted",
                command_schema("Command to check"),
                is_in_blacklist,
            )),
        ],
    )
}

fn add_to_allowlist(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let command = str_param(params, "command")?;
    let added = ctx.session.policy.add_to_allowlist(command);
    if added {
        info!("Allowlisted: {command}");
    }
    let message = if added {
        format!("Added '{command}' to allowlist")
    } else {
        format!("'{command}' is already in allowlist")
    };
    Ok(json!({
        "status": "success",
        "message": message,
        "allowlist": ctx.session.policy.allowlist(),
    }))
}

fn remove_from_allowlist(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let command = str_param(params, "command")?;
    let removed = ctx.session.policy.remove_from_allowlist(command);
    let message = if removed {
        format!("Removed '{command}' from allowlist")
    } else {
        format!("'{command}' was not in allowlist")
    };
    Ok(json!({
        "status": "success",
        "message": message,
        "allowlist": ctx.session.policy.allowlist(),
    }))
}

fn add_to_blacklist(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let command = str_param(params, "command")?;
    let added = ctx.session.policy.add_to_blacklist(command);
    if added {
        info!("Blacklisted: {command}");
    }
    let message = if added {
        format!("Added '{command}' to blacklist")
    } else {
        format!("'{command}' is already in blacklist")
    };
    Ok(json!({
        "status": "success",
        "message": message,
        "blacklist": ctx.session.policy.blacklist(),
    }))
}

fn remove_from_blacklist(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let command = str_param(params, "command")?;
    let removed = ctx.session.policy.remove_from_blacklist(command);
    let message = if removed {
        format!("Removed '{command}' from blacklist")
    } else {
        format!("'{command}' was not in blacklist")
    };
    Ok(json!({
        "status": "success",
        "message": message,
        "blacklist": ctx.session.policy.blacklist(),
    }))
}

fn list_allowlist(_: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let list = ctx.session.policy.allowlist();
    Ok(json!({
        "status": "success",
        "allowlist": list,
        "count": list.len(),
    }))
}

fn list_blacklist(_: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let list = ctx.session.policy.blacklist();
    Ok(json!({
        "status": "success",
        "blacklist": list,
        "count": list.len(),
    }))
}

fn is_in_allowlist(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let command = str_param(params, "command")?;
    Ok(json!({
        "status": "success",
        "command": command,
        "in_allowlist": ctx.session.policy.in_allowlist(command),
    }))
}

fn is_in_blacklist(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let command = str_param(params, "command")?;
    Ok(json!({
        "status": "success",
        "command": command,
        "in_blacklist": ctx.session.policy.in_blacklist(command),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn cmd(c: &str) -> Value {
        json!({ "command": c })
    }

    #[test]
    fn test_add_to_allowlist_from_empty() {
        let mut ctx = testing::context();
        ctx.session.set_allowlist_blacklist(Some(vec![]), None);
        let result = add_to_allowlist(&cmd("ls"), &mut ctx).unwrap();
        assert_eq!(result["status"], "success");
        assert!(ctx.session.policy.in_allowlist("ls"));
        assert_eq!(result["allowlist"], json!(["ls"]));
    }

    #[test]
    fn test_add_to_allowlist_twice() {
        let mut ctx = testing::context();
        add_to_allowlist(&cmd("ls"), &mut ctx).unwrap();
        let result = add_to_allowlist(&cmd("ls"), &mut ctx).unwrap();
        assert_eq!(result["status"], "success");
        assert!(result["message"].as_str().unwrap().contains("already"));
        assert_eq!(result["allowlist"], json!(["ls"]));
    }

    #[test]
    fn test_add_to_blacklist() {
        let mut ctx = testing::context();
        ctx.session.set_allowlist_blacklist(None, Some(vec![]));
        let result = add_to_blacklist(&cmd("rm"), &mut ctx).unwrap();
        assert_eq!(result["status"], "success");
        assert!(ctx.session.policy.in_blacklist("rm"));
    }

    #[test]
    fn test_remove_from_allowlist() {
        let mut ctx = testing::context();
        ctx.session
            .set_allowlist_blacklist(Some(vec!["ls".into()]), None);
        let result = remove_from_allowlist(&cmd("ls"), &mut ctx).unwrap();
        assert_eq!(result["status"], "success");
        assert!(!ctx.session.policy.in_allowlist("ls"));

        let result = remove_from_allowlist(&cmd("ls"), &mut ctx).unwrap();
        assert!(result["message"].as_str().unwrap().contains("was not"));
    }

    #[test]
    fn test_remove_from_blacklist() {
        let mut ctx = testing::context();
        ctx.session.set_allowlist_blacklist(None, Some(vec!["rm".into()]));
        let result = remove_from_blacklist(&cmd("rm"), &mut ctx).unwrap();
        assert_eq!(result["status"], "success");
        assert!(!ctx.session.policy.in_blacklist("rm"));
    }

    #[test]
    fn test_list_allowlist() {
        let mut ctx = testing::context();
        ctx.session
            .set_allowlist_blacklist(Some(vec!["ls".into(), "cd".into()]), None);
        let result = list_allowlist(&json!({}), &mut ctx).unwrap();
        assert_eq!(result["status"], "success");
        assert_eq!(result["allowlist"], json!(["ls", "cd"]));
        assert_eq!(result["count"], 2);
    }

    #[test]
    fn test_list_blacklist() {
        let mut ctx = testing::context();
        ctx.session
            .set_allowlist_blacklist(None, Some(vec!["rm".into(), "dd".into()]));
        let result = list_blacklist(&json!({}), &mut ctx).unwrap();
        assert_eq!(result["blacklist"], json!(["rm", "dd"]));
        assert_eq!(result["count"], 2);
    }

    #[test]
    fn test_list_unset_is_empty() {
        let mut ctx = testing::context();
        let result = list_blacklist(&json!({}), &mut ctx).unwrap();
        assert_eq!(result["blacklist"], json!([]));
        assert_eq!(result["count"], 0);
    }

    #[test]
    fn test_is_in_allowlist() {
        let mut ctx = testing::context();
        ctx.session
            .set_allowlist_blacklist(Some(vec!["ls".into()]), None);
        assert_eq!(is_in_allowlist(&cmd("ls"), &mut ctx).unwrap()["in_allowlist"], true);
        assert_eq!(is_in_allowlist(&cmd("cd"), &mut ctx).unwrap()["in_allowlist"], false);
    }

    #[test]
    fn test_is_in_blacklist() {
        let mut ctx = testing::context();
        ctx.session.set_allowlist_blacklist(None, Some(vec!["rm".into()]));
        assert_eq!(is_in_blacklist(&cmd("rm"), &mut ctx).unwrap()["in_blacklist"], true);
        assert_eq!(is_in_blacklist(&cmd("ls"), &mut ctx).unwrap()["in_blacklist"], false);
    }

    #[test]
    fn test_missing_command_param() {
        let mut ctx = testing::context();
        assert!(add_to_blacklist(&json!({}), &mut ctx).is_err());
    }
}
