//! Per-session conversation log.
//!
//! Each runtime session appends to
//! `{logs_dir}/session_{YYYYmmdd_HHMMSS}/conversation.log`, one event per
//! line:
//!
//! ```text
//! 2026-10-18T09:12:03.120+02:00 - flouri - INFO - {"event":"tool_call",...}
//! ```
//!
//! The history skill reads these files back, so the line format is a
//! contract between the two.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::{json, Value};
use tracing::debug;

pub const SESSION_DIR_PREFIX: &str = "session_";
pub const CONVERSATION_LOG: &str = "conversation.log";
const DEFAULT_LOGGER_NAME: &str = "flouri";

pub struct SessionLog {
    dir: PathBuf,
    path: PathBuf,
    /// Second field of every line.
    name: String,
}

impl SessionLog {
    /// Creates a new session directory under `logs_dir`.
    ///
    /// If a directory for the current second already exists, a numeric
    /// suffix is appended.
    pub fn create(logs_dir: &Path) -> Result<Self> {
        fs::create_dir_all(logs_dir)?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();

        let mut dir = logs_dir.join(format!("{SESSION_DIR_PREFIX}{stamp}"));
        let mut n = 1;
        while dir.exists() {
            dir = logs_dir.join(format!("{SESSION_DIR_PREFIX}{stamp}_{n}"));
            n += 1;
        }
        fs::create_dir(&dir)?;

        let path = dir.join(CONVERSATION_LOG);
        debug!("Session log: {}", path.display());
        Ok(Self {
            dir,
            path,
            name: DEFAULT_LOGGER_NAME.to_string(),
        })
    }

    /// Sets the logger name written on each line (the agent name).
    /// The ` - ` field separator cannot appear inside it.
    pub fn with_name(mut self, name: &str) -> Self {
        let name = name.trim().replace(" - ", "-");
        if !name.is_empty() {
            self.name = name;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one event. `data` must be a JSON object; `event` and
    /// `timestamp` are added to it.
    pub fn log_event(&self, event: &str, data: Value) -> Result<()> {
        let timestamp = chrono::Local::now().to_rfc3339();
        let mut record = match data {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        record.insert("event".to_string(), json!(event));
        record.insert("timestamp".to_string(), json!(timestamp));

        let line = format_line(&timestamp, &self.name, "INFO", &Value::Object(record));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn log_tool_call(
        &self,
        tool: &str,
        args: &Value,
        result: &Value,
        success: bool,
        duration_seconds: f64,
    ) -> Result<()> {
        self.log_event(
            "tool_call",
            json!({
                "tool": tool,
                "args": args,
                "result": result,
                "success": success,
                "duration_seconds": duration_seconds,
            }),
        )
    }
}

fn format_line(timestamp: &str, name: &str, level: &str, record: &Value) -> String {
    format!("{timestamp} - {name} - {level} - {record}")
}

/// Parses one log line; `None` for blank, foreign or malformed lines.
/// Returns the timestamp prefix and the JSON record.
pub fn parse_line(line: &str) -> Option<(&str, Value)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut parts = line.splitn(4, " - ");
    let timestamp = parts.next()?;
    let _name = parts.next()?;
    let _level = parts.next()?;
    let payload = parts.next()?;
    let record = serde_json::from_str(payload).ok()?;
    Some((timestamp, record))
}
