use std::sync::Arc;

use chrono::Local;
use serde_json::{json, Value};

use crate::skills::{FunctionTool, Skill};

pub fn skill() -> Skill {
    Skill::new(
        "system",
        "System information such as the current date and time",
        vec![Arc::new(FunctionTool::new(
            "get_current_datetime",
            "Get the current local date, time and timezone",
            json!({"type": "object", "properties": {}}),
            get_current_datetime,
        ))],
    )
}

fn get_current_datetime(_: &Value) -> anyhow::Result<Value> {
    let now = Local::now();
    Ok(json!({
        "status": "success",
        "datetime": now.to_rfc3339(),
        "date": now.format("%Y-%m-%d").to_string(),
        "time": now.format("%H:%M:%S").to_string(),
        "timezone": now.format("%:z").to_string(),
        "unix_timestamp": now.timestamp(),
    }))
}
