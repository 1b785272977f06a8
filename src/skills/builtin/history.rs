//! Builtin skill: shell and conversation history.
//!
//! Lets the agent look at what was run before and how its own tool calls
//! went. Reads the shell history file (one command per line) and the
//! `session_*/conversation.log` files written by
//! [`SessionLog`](crate::agent::log::SessionLog).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::agent::log::{parse_line, CONVERSATION_LOG, SESSION_DIR_PREFIX};
use crate::skills::function::int_param;
use crate::skills::{FunctionTool, Skill, ToolContext};

const MAX_BASH_HISTORY: u64 = 1000;
const MAX_CONVERSATION_ENTRIES: u64 = 100;

pub fn skill() -> Skill {
    Skill::new(
        "history",
        "History-related tools for reading command and conversation history",
        vec![
            Arc::new(FunctionTool::with_context(
                "read_bash_history",
                "Read bash command history",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of entries, newest first (max 1000)",
                            "default": 50
                        }
                    }
                }),
                read_bash_history,
            )),
            Arc::new(FunctionTool::with_context(
                "read_conversation_history",
                "Read conversation history",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of log entries (max 100)",
                            "default": 20
                        }
                    }
                }),
                read_conversation_history,
            )),
            Arc::new(FunctionTool::with_context(
                "get_tool_call_stats",
                "Parse tool-call history from session logs and return stats (counts, success rate, duration)",
                json!({
                    "type": "object",
                    "properties": {
                        "max_sessions": {
                            "type": "integer",
                            "description": "Number of most recent sessions to include",
                            "default": 5
                        },
                        "include_recent": {
                            "type": "integer",
                            "description": "Number of most recent calls to list (0 to omit)",
                            "default": 20
                        }
                    }
                }),
                get_tool_call_stats,
            )),
        ],
    )
}

fn read_bash_history(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let limit = int_param(params, "limit", 50).clamp(1, MAX_BASH_HISTORY) as usize;
    Ok(bash_history(&ctx.config.paths.history_file, limit))
}

fn read_conversation_history(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let limit = int_param(params, "limit", 20).clamp(1, MAX_CONVERSATION_ENTRIES) as usize;
    Ok(conversation_history(&ctx.config.paths.logs_dir, limit))
}

fn get_tool_call_stats(params: &Value, ctx: &mut ToolContext) -> anyhow::Result<Value> {
    let max_sessions = int_param(params, "max_sessions", 5).max(1) as usize;
    let include_recent = int_param(params, "include_recent", 20) as usize;
    Ok(tool_call_stats(
        &ctx.config.paths.logs_dir,
        max_sessions,
        include_recent,
    ))
}

// ── bash history ─────────────────────────────────────────

/// Unique commands, newest first.
fn bash_history(path: &Path, limit: usize) -> Value {
    let file = path.display().to_string();

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return json!({
                "status": "success",
                "history_file": file,
                "entries": [],
                "count": 0,
                "message": "History file does not exist yet",
            })
        }
        Err(e) => {
            return json!({
                "status": "error",
                "history_file": file,
                "entries": [],
                "count": 0,
                "message": describe_error(&e, "reading history file", "Error reading history"),
            })
        }
    };

    let mut entries: Vec<&str> = Vec::new();
    for cmd in content.lines().rev().map(str::trim) {
        if !cmd.is_empty() && !entries.contains(&cmd) {
            entries.push(cmd);
            if entries.len() >= limit {
                break;
            }
        }
    }

    json!({
        "status": "success",
        "history_file": file,
        "count": entries.len(),
        "message": format!("Retrieved {} history entries", entries.len()),
        "entries": entries,
    })
}

// ── conversation logs ────────────────────────────────────

/// Session directories under `logs_dir`, newest first (by mtime, then name).
fn session_dirs(logs_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(logs_dir)? {
        let entry = entry?;
        let is_session = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(SESSION_DIR_PREFIX));
        if is_session && entry.file_type()?.is_dir() {
            let modified = entry.metadata()?.modified()?;
            dirs.push((modified, entry.path()));
        }
    }
    dirs.sort_by(|a, b| b.cmp(a));
    Ok(dirs.into_iter().map(|(_, path)| path).collect())
}

/// `conversation.log` files of the newest `max_sessions` sessions, newest first.
fn latest_conversation_logs(logs_dir: &Path, max_sessions: usize) -> io::Result<Vec<PathBuf>> {
    if !logs_dir.exists() {
        return Ok(Vec::new());
    }
    Ok(session_dirs(logs_dir)?
        .into_iter()
        .take(max_sessions)
        .map(|dir| dir.join(CONVERSATION_LOG))
        .filter(|log| log.exists())
        .collect())
}

fn conversation_history(logs_dir: &Path, limit: usize) -> Value {
    let mut result = json!({
        "status": "success",
        "session_dir": null,
        "entries": [],
        "count": 0,
    });

    if !logs_dir.exists() {
        result["message"] = json!("Logs directory does not exist yet");
        return result;
    }

    let outcome = session_dirs(logs_dir).and_then(|dirs| {
        let Some(latest) = dirs.into_iter().next() else {
            return Ok(None);
        };
        let log = latest.join(CONVERSATION_LOG);
        if !log.exists() {
            return Ok(Some((latest, None)));
        }
        let content = fs::read_to_string(&log)?;
        Ok(Some((latest, Some(content))))
    });

    match outcome {
        Ok(None) => {
            result["message"] = json!("No session logs found");
        }
        Ok(Some((_, None))) => {
            result["message"] = json!("Conversation log file does not exist");
        }
        Ok(Some((session, Some(content)))) => {
            let lines: Vec<&str> = content.lines().collect();
            let tail = &lines[lines.len().saturating_sub(limit * 2)..];

            let mut entries: Vec<Value> = Vec::new();
            for line in tail.iter().rev() {
                let Some((ts, record)) = parse_line(line) else {
                    continue;
                };
                entries.push(json!({
                    "timestamp": record.get("timestamp").cloned().unwrap_or_else(|| json!(ts)),
                    "event": record.get("event").cloned().unwrap_or_else(|| json!("unknown")),
                    "data": record,
                }));
                if entries.len() >= limit {
                    break;
                }
            }
            entries.reverse();

            let name = session
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            result["session_dir"] = json!(session.display().to_string());
            result["count"] = json!(entries.len());
            result["message"] = json!(format!(
                "Retrieved {} conversation log entries from {name}",
                entries.len()
            ));
            result["entries"] = Value::Array(entries);
        }
        Err(e) => {
            result["status"] = json!("error");
            result["message"] = json!(describe_error(
                &e,
                "reading conversation logs",
                "Error reading conversation history"
            ));
        }
    }
    result
}

// ── tool call stats ──────────────────────────────────────

#[derive(Debug, Default, Serialize)]
struct ToolStats {
    count: u64,
    success_count: u64,
    success_rate: f64,
    total_duration_seconds: f64,
    avg_duration_seconds: Option<f64>,
    #[serde(skip)]
    timed_calls: u64,
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn tool_calls_in(log: &Path) -> io::Result<Vec<Value>> {
    let content = fs::read_to_string(log)?;
    Ok(content
        .lines()
        .filter_map(parse_line)
        .map(|(_, record)| record)
        .filter(|record| record.get("event").and_then(Value::as_str) == Some("tool_call"))
        .collect())
}

fn tool_call_stats(logs_dir: &Path, max_sessions: usize, include_recent: usize) -> Value {
    let mut result = json!({
        "status": "success",
        "sessions_parsed": 0,
        "log_files": [],
        "total_tool_calls": 0,
        "by_tool": {},
        "recent_calls": [],
    });

    let collected = latest_conversation_logs(logs_dir, max_sessions).and_then(|logs| {
        let mut calls = Vec::new();
        // Oldest session first so `calls` is chronological
        for log in logs.iter().rev() {
            calls.extend(tool_calls_in(log)?);
        }
        Ok((logs, calls))
    });

    let (logs, calls) = match collected {
        Ok(c) => c,
        Err(e) => {
            result["status"] = json!("error");
            result["message"] = json!(describe_error(
                &e,
                "reading conversation logs",
                "Error parsing tool call history"
            ));
            return result;
        }
    };

    if logs.is_empty() {
        result["message"] = json!("No session conversation logs found");
        return result;
    }

    let mut by_tool: BTreeMap<String, ToolStats> = BTreeMap::new();
    for call in &calls {
        let tool = call.get("tool").and_then(Value::as_str).unwrap_or("unknown");
        let stats = by_tool.entry(tool.to_string()).or_default();
        stats.count += 1;
        if call.get("success").and_then(Value::as_bool).unwrap_or(false) {
            stats.success_count += 1;
        }
        if let Some(d) = call.get("duration_seconds").and_then(Value::as_f64) {
            stats.total_duration_seconds += d;
            stats.timed_calls += 1;
        }
    }
    for stats in by_tool.values_mut() {
        stats.success_rate = round4(stats.success_count as f64 / stats.count as f64);
        stats.total_duration_seconds = round4(stats.total_duration_seconds);
        stats.avg_duration_seconds = (stats.timed_calls > 0)
            .then(|| round4(stats.total_duration_seconds / stats.timed_calls as f64));
    }

    if include_recent > 0 {
        let recent: Vec<Value> = calls[calls.len().saturating_sub(include_recent)..]
            .iter()
            .map(|c| {
                json!({
                    "tool": c.get("tool").and_then(Value::as_str).unwrap_or("unknown"),
                    "timestamp": c.get("timestamp"),
                    "success": c.get("success").and_then(Value::as_bool).unwrap_or(false),
                    "duration_seconds": c.get("duration_seconds"),
                })
            })
            .collect();
        result["recent_calls"] = Value::Array(recent);
    }

    result["log_files"] = json!(logs
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>());
    result["sessions_parsed"] = json!(logs.len());
    result["total_tool_calls"] = json!(calls.len());
    result["by_tool"] = json!(by_tool);
    result["message"] = json!(format!(
        "Parsed {} tool calls from {} session(s)",
        calls.len(),
        logs.len()
    ));
    result
}

fn describe_error(e: &io::Error, doing: &str, generic: &str) -> String {
    if e.kind() == io::ErrorKind::PermissionDenied {
        format!("Permission denied {doing}")
    } else {
        format!("{generic}: {e}")
    }
}
