//! Builtin skill: ROS 2 command-line wrappers.
//!
//! Each tool is one row in [`COMMANDS`]: the `ros2` verb it runs and how
//! its JSON parameters turn into argv. The executable comes from
//! `[ros2] program` so tests and non-standard installs can point it
//! elsewhere.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::process::Command;
use tracing::debug;

use crate::sandbox::{self, CommandOutput, RunOutcome};
use crate::skills::{Skill, Tool, ToolContext};

/// Upper bound for the `duration` of bounded commands.
const MAX_DURATION_SECS: f64 = 300.0;

/// How a parameter is rendered on the command line.
#[derive(Debug, Clone, Copy)]
enum Arg {
    /// Bare value; `true` marks it required.
    Positional(bool),
    /// `<flag> <value>` when given.
    Flag(&'static str),
    /// `<flag>` when `true`.
    Switch(&'static str),
    /// Every element of an array as its own positional.
    Many,
}

#[derive(Debug)]
struct Param {
    name: &'static str,
    description: &'static str,
    ty: &'static str,
    arg: Arg,
}

impl Param {
    const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            ty: "string",
            arg: Arg::Positional(true),
        }
    }

    const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            ty: "string",
            arg: Arg::Positional(false),
        }
    }

    const fn flag(
        name: &'static str,
        flag: &'static str,
        ty: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            description,
            ty,
            arg: Arg::Flag(flag),
        }
    }

    const fn switch(name: &'static str, flag: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            ty: "boolean",
            arg: Arg::Switch(flag),
        }
    }

    fn is_required(&self) -> bool {
        matches!(self.arg, Arg::Positional(true))
    }

    fn schema(&self) -> Value {
        let mut schema = json!({
            "type": self.ty,
            "description": self.description,
        });
        if matches!(self.arg, Arg::Many) {
            schema["items"] = json!({"type": "string"});
        }
        schema
    }
}

#[derive(Debug)]
pub struct Ros2Command {
    name: &'static str,
    description: &'static str,
    verb: &'static [&'static str],
    params: &'static [Param],
    /// Output is one item per line.
    lists: bool,
    /// Never exits on its own; runs for a `duration` (default seconds).
    bounded: Option<f64>,
}

const SHOW_TYPES: Param = Param::switch("show_types", "-t", "Also show the type of each entry");
const TOPIC: Param = Param::required("topic_name", "Topic name, e.g. /chatter");
const SERVICE: Param = Param::required("service_name", "Service name, e.g. /add_two_ints");
const NODE: Param = Param::required("node_name", "Fully qualified node name, e.g. /talker");
const BAG: Param = Param::required("bag_path", "Path to the bag directory or file");

const fn plain(
    name: &'static str,
    description: &'static str,
    verb: &'static [&'static str],
    params: &'static [Param],
) -> Ros2Command {
    Ros2Command {
        name,
        description,
        verb,
        params,
        lists: false,
        bounded: None,
    }
}

const fn listing(
    name: &'static str,
    description: &'static str,
    verb: &'static [&'static str],
    params: &'static [Param],
) -> Ros2Command {
    Ros2Command {
        name,
        description,
        verb,
        params,
        lists: true,
        bounded: None,
    }
}

const fn bounded(
    name: &'static str,
    description: &'static str,
    verb: &'static [&'static str],
    params: &'static [Param],
    default_secs: f64,
) -> Ros2Command {
    Ros2Command {
        name,
        description,
        verb,
        params,
        lists: false,
        bounded: Some(default_secs),
    }
}

pub static COMMANDS: &[Ros2Command] = &[
    // topic
    listing(
        "ros2_topic_list",
        "List active ROS 2 topics",
        &["topic", "list"],
        &[SHOW_TYPES],
    ),
    plain(
        "ros2_topic_echo",
        "Print one message published on a topic",
        &["topic", "echo", "--once"],
        &[
            TOPIC,
            Param::optional("message_type", "Message type, e.g. std_msgs/msg/String"),
        ],
    ),
    plain(
        "ros2_topic_info",
        "Show publishers, subscribers and type of a topic",
        &["topic", "info"],
        &[TOPIC, Param::switch("verbose", "-v", "Include QoS details")],
    ),
    bounded(
        "ros2_topic_hz",
        "Measure the publishing rate of a topic for a few seconds",
        &["topic", "hz"],
        &[
            TOPIC,
            Param::flag("window", "--window", "integer", "Sample window size"),
        ],
        5.0,
    ),
    plain(
        "ros2_topic_type",
        "Show the message type of a topic",
        &["topic", "type"],
        &[TOPIC],
    ),
    // service
    listing(
        "ros2_service_list",
        "List active ROS 2 services",
        &["service", "list"],
        &[SHOW_TYPES],
    ),
    plain(
        "ros2_service_type",
        "Show the type of a service",
        &["service", "type"],
        &[SERVICE],
    ),
    plain(
        "ros2_service_call",
        "Call a service",
        &["service", "call"],
        &[
            SERVICE,
            Param::required("service_type", "Service type, e.g. example_interfaces/srv/AddTwoInts"),
            Param::optional("request", "Request in YAML, e.g. \"{a: 1, b: 2}\""),
        ],
    ),
    // action
    listing(
        "ros2_action_list",
        "List active ROS 2 actions",
        &["action", "list"],
        &[SHOW_TYPES],
    ),
    plain(
        "ros2_action_info",
        "Show clients and servers of an action",
        &["action", "info"],
        &[Param::required("action_name", "Action name, e.g. /fibonacci")],
    ),
    // node
    listing(
        "ros2_node_list",
        "List running ROS 2 nodes",
        &["node", "list"],
        &[],
    ),
    plain(
        "ros2_node_info",
        "Show the publishers, subscribers, services and actions of a node",
        &["node", "info"],
        &[NODE],
    ),
    // param
    listing(
        "ros2_param_list",
        "List parameters, of one node or of all nodes",
        &["param", "list"],
        &[Param::optional("node_name", "Node to list parameters for")],
    ),
    plain(
        "ros2_param_get",
        "Get a parameter value",
        &["param", "get"],
        &[NODE, Param::required("param_name", "Parameter name")],
    ),
    plain(
        "ros2_param_set",
        "Set a parameter value",
        &["param", "set"],
        &[
            NODE,
            Param::required("param_name", "Parameter name"),
            Param::required("value", "New value"),
        ],
    ),
    // interface
    listing(
        "ros2_interface_list",
        "List available message, service and action interfaces",
        &["interface", "list"],
        &[
            Param::switch("only_msgs", "-m", "Only list messages"),
            Param::switch("only_srvs", "-s", "Only list services"),
            Param::switch("only_actions", "-a", "Only list actions"),
        ],
    ),
    plain(
        "ros2_interface_show",
        "Show the definition of an interface",
        &["interface", "show"],
        &[Param::required("type_name", "Interface type, e.g. std_msgs/msg/String")],
    ),
    // pkg
    listing(
        "ros2_pkg_list",
        "List installed ROS 2 packages",
        &["pkg", "list"],
        &[],
    ),
    plain(
        "ros2_pkg_prefix",
        "Show the install prefix of a package",
        &["pkg", "prefix"],
        &[Param::required("package_name", "Package name")],
    ),
    // bag
    bounded(
        "ros2_bag_record",
        "Record topics to a bag for a fixed duration",
        &["bag", "record"],
        &[
            Param {
                name: "topics",
                description: "Topics to record",
                ty: "array",
                arg: Arg::Many,
            },
            Param::switch("all", "-a", "Record all topics"),
            Param::flag("output", "-o", "string", "Output bag path"),
        ],
        10.0,
    ),
    bounded(
        "ros2_bag_play",
        "Play back a bag, stopping after the given duration",
        &["bag", "play"],
        &[
            BAG,
            Param::flag("rate", "-r", "number", "Playback rate multiplier"),
            Param::switch("loop", "-l", "Loop playback"),
        ],
        10.0,
    ),
    plain(
        "ros2_bag_info",
        "Show metadata of a bag",
        &["bag", "info"],
        &[BAG],
    ),
    plain(
        "ros2_bag_reindex",
        "Rebuild the metadata file of a bag",
        &["bag", "reindex"],
        &[
            BAG,
            Param::flag("storage", "-s", "string", "Storage identifier, e.g. sqlite3"),
        ],
    ),
    plain(
        "ros2_bag_compress",
        "Compress a bag",
        &["bag", "compress"],
        &[BAG],
    ),
    plain(
        "ros2_bag_decompress",
        "Decompress a bag",
        &["bag", "decompress"],
        &[BAG],
    ),
    plain(
        "ros2_bag_validate",
        "Check a bag for consistency",
        &["bag", "validate"],
        &[BAG],
    ),
];

pub fn skill() -> Skill {
    Skill::new(
        "ros2",
        "ROS 2 command line tools for topics, services, actions, nodes, parameters, interfaces, packages and bags",
        COMMANDS
            .iter()
            .map(|command| Arc::new(Ros2Tool(command)) as Arc<dyn Tool>)
            .collect(),
    )
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl Ros2Command {
    /// Arguments after the program name.
    fn argv(&self, params: &Value) -> anyhow::Result<Vec<String>> {
        let mut args: Vec<String> = self.verb.iter().map(|s| s.to_string()).collect();

        for param in self.params {
            let value = params.get(param.name).unwrap_or(&Value::Null);
            match param.arg {
                Arg::Positional(required) => match render(value) {
                    Some(v) if !v.is_empty() => args.push(v),
                    _ if required => bail!("Missing required parameter: {}", param.name),
                    _ => {}
                },
                Arg::Flag(flag) => {
                    if let Some(v) = render(value) {
                        args.push(flag.to_string());
                        args.push(v);
                    }
                }
                Arg::Switch(flag) => {
                    if value.as_bool().unwrap_or(false) {
                        args.push(flag.to_string());
                    }
                }
                Arg::Many => match value {
                    Value::Array(items) => args.extend(items.iter().filter_map(render)),
                    Value::Null => {}
                    other => args.extend(render(other)),
                },
            }
        }
        Ok(args)
    }

    fn duration(&self, params: &Value) -> Option<f64> {
        let default = self.bounded?;
        let requested = params
            .get("duration")
            .and_then(Value::as_f64)
            .filter(|d| *d > 0.0)
            .unwrap_or(default);
        Some(requested.min(MAX_DURATION_SECS))
    }

    fn schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in self.params {
            properties.insert(param.name.to_string(), param.schema());
            if param.is_required() {
                required.push(param.name);
            }
        }
        if let Some(default) = self.bounded {
            properties.insert(
                "duration".to_string(),
                json!({
                    "type": "number",
                    "description": "Seconds to run before stopping",
                    "default": default,
                }),
            );
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn finished(command_line: &str, out: CommandOutput, lists: bool) -> Value {
    let status = if out.success() { "success" } else { "error" };
    let mut result = json!({
        "status": status,
        "command": command_line,
        "returncode": out.code,
    });
    if lists && out.success() {
        let items: Vec<&str> = out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        result["count"] = json!(items.len());
        result["items"] = json!(items);
    }
    result["stdout"] = json!(out.stdout);
    result["stderr"] = json!(out.stderr);
    result
}

fn spawn_failed(command_line: &str, program: &str, e: &io::Error) -> Value {
    let message = if e.kind() == io::ErrorKind::NotFound {
        format!("ROS 2 CLI not found: '{program}' is not installed or not on PATH")
    } else {
        format!("Failed to run {program}: {e}")
    };
    json!({
        "status": "error",
        "command": command_line,
        "message": message,
    })
}

pub struct Ros2Tool(&'static Ros2Command);

#[async_trait]
impl Tool for Ros2Tool {
    fn name(&self) -> &str {
        self.0.name
    }

    fn description(&self) -> &str {
        self.0.description
    }

    fn parameters_schema(&self) -> Value {
        self.0.schema()
    }

    async fn execute(&self, params: Value, context: &mut ToolContext) -> anyhow::Result<Value> {
        let spec = self.0;
        let args = spec.argv(&params)?;
        let program = context.config.ros2.program.as_str();
        let command_line = format!("{program} {}", args.join(" "));
        debug!("Running: {command_line}");

        let mut cmd = Command::new(program);
        cmd.args(&args).current_dir(context.session.cwd());

        if let Some(secs) = spec.duration(&params) {
            return Ok(
                match sandbox::run_bounded(cmd, Duration::from_secs_f64(secs)).await {
                    Ok((out, true)) => {
                        let mut result = finished(&command_line, out, spec.lists);
                        result["status"] = json!("success");
                        result["message"] = json!(format!("Stopped after {secs}s"));
                        result
                    }
                    Ok((out, false)) => finished(&command_line, out, spec.lists),
                    Err(e) => spawn_failed(&command_line, program, &e),
                },
            );
        }

        let timeout = Duration::from_secs(context.config.ros2.timeout_secs);
        Ok(match sandbox::run(cmd, timeout).await {
            Ok(RunOutcome::Finished(out)) => finished(&command_line, out, spec.lists),
            Ok(RunOutcome::TimedOut) => json!({
                "status": "timeout",
                "command": command_line,
                "message": format!("Command timed out after {}s", timeout.as_secs()),
            }),
            Err(e) => spawn_failed(&command_line, program, &e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing;
    use std::collections::HashSet;

    fn command(name: &str) -> &'static Ros2Command {
        COMMANDS.iter().find(|c| c.name == name).unwrap()
    }

    fn context_with_program(program: &str) -> ToolContext {
        let mut config = Config::default();
        config.ros2.program = program.to_string();
        testing::context_with(config)
    }

    #[cfg(unix)]
    fn fake_ros2(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-ros2");
        std::fs::write(&path, "#!/bin/sh\necho \"$@\"\nexec sleep 5\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    // ── table ────────────────────────────────────────────

    #[test]
    fn test_table_has_all_commands() {
        assert_eq!(COMMANDS.len(), 26);
        let names: HashSet<_> = COMMANDS.iter().map(|c| c.name).collect();
        assert_eq!(names.len(), 26);
        assert!(COMMANDS.iter().all(|c| c.name.starts_with("ros2_")));
    }

    #[test]
    fn test_bounded_commands() {
        let bounded: Vec<_> = COMMANDS
            .iter()
            .filter(|c| c.bounded.is_some())
            .map(|c| c.name)
            .collect();
        assert_eq!(bounded, ["ros2_topic_hz", "ros2_bag_record", "ros2_bag_play"]);
    }

    #[test]
    fn test_schema_lists_required_params() {
        let schema = command("ros2_param_set").schema();
        assert_eq!(schema["required"], json!(["node_name", "param_name", "value"]));
        let schema = command("ros2_topic_hz").schema();
        assert_eq!(schema["properties"]["duration"]["default"], 5.0);
        assert_eq!(schema["properties"]["window"]["type"], "integer");
    }

    // ── argv ─────────────────────────────────────────────

    #[test]
    fn test_argv_simple_listing() {
        let args = command("ros2_topic_list").argv(&json!({})).unwrap();
        assert_eq!(args, ["topic", "list"]);
        let args = command("ros2_topic_list")
            .argv(&json!({"show_types": true}))
            .unwrap();
        assert_eq!(args, ["topic", "list", "-t"]);
    }

    #[test]
    fn test_argv_positionals() {
        let args = command("ros2_topic_echo")
            .argv(&json!({"topic_name": "/chatter"}))
            .unwrap();
        assert_eq!(args, ["topic", "echo", "--once", "/chatter"]);
    }

    #[test]
    fn test_argv_missing_required() {
        let err = command("ros2_topic_info").argv(&json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: topic_name");
        let err = command("ros2_param_get")
            .argv(&json!({"node_name": "/talker", "param_name": ""}))
            .unwrap_err();
        assert!(err.to_string().contains("param_name"));
    }

    #[test]
    fn test_argv_non_string_values() {
        let args = command("ros2_param_set")
            .argv(&json!({"node_name": "/talker", "param_name": "rate", "value": 5}))
            .unwrap();
        assert_eq!(args, ["param", "set", "/talker", "rate", "5"]);
    }

    #[test]
    fn test_argv_options_and_many() {
        let args = command("ros2_bag_record")
            .argv(&json!({"topics": ["/a", "/b"], "output": "run1"}))
            .unwrap();
        assert_eq!(args, ["bag", "record", "/a", "/b", "-o", "run1"]);

        let args = command("ros2_bag_play")
            .argv(&json!({"bag_path": "run1", "rate": 2.0, "loop": false}))
            .unwrap();
        assert_eq!(args, ["bag", "play", "run1", "-r", "2.0"]);
    }

    #[test]
    fn test_duration_defaults_and_cap() {
        let hz = command("ros2_topic_hz");
        assert_eq!(hz.duration(&json!({})), Some(5.0));
        assert_eq!(hz.duration(&json!({"duration": 1.5})), Some(1.5));
        assert_eq!(hz.duration(&json!({"duration": -3})), Some(5.0));
        assert_eq!(hz.duration(&json!({"duration": 9999})), Some(MAX_DURATION_SECS));
        assert_eq!(command("ros2_topic_type").duration(&json!({})), None);
    }

    // ── execute ──────────────────────────────────────────

    #[tokio::test]
    async fn test_listing_collects_items() {
        let mut ctx = context_with_program("echo");
        let result = Ros2Tool(command("ros2_node_list"))
            .execute(json!({}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result["status"], "success");
        assert_eq!(result["command"], "echo node list");
        assert_eq!(result["items"], json!(["node list"]));
        assert_eq!(result["count"], 1);
        assert_eq!(result["returncode"], 0);
    }

    #[tokio::test]
    async fn test_non_listing_has_no_items() {
        let mut ctx = context_with_program("echo");
        let result = Ros2Tool(command("ros2_topic_type"))
            .execute(json!({"topic_name": "/chatter"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result["status"], "success");
        assert_eq!(result["stdout"].as_str().unwrap().trim(), "topic type /chatter");
        assert!(result.get("items").is_none());
    }

    #[tokio::test]
    async fn test_failing_command_is_error() {
        let mut ctx = context_with_program("false");
        let result = Ros2Tool(command("ros2_pkg_list"))
            .execute(json!({}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result["status"], "error");
        assert!(result.get("items").is_none());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let mut ctx = context_with_program("/nonexistent/ros2-12345");
        let result = Ros2Tool(command("ros2_topic_list"))
            .execute(json!({}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result["status"], "error");
        assert!(result["message"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_missing_required_param_is_err() {
        let mut ctx = context_with_program("echo");
        let err = Ros2Tool(command("ros2_node_info"))
            .execute(json!({}), &mut ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("node_name"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bounded_command_stops_with_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_with_program(&fake_ros2(dir.path()));
        let result = Ros2Tool(command("ros2_topic_hz"))
            .execute(json!({"topic_name": "/chatter", "duration": 0.5}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result["status"], "success");
        assert_eq!(result["stdout"].as_str().unwrap().trim(), "topic hz /chatter");
        assert!(result["message"].as_str().unwrap().starts_with("Stopped after"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unbounded_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.ros2.program = fake_ros2(dir.path());
        config.ros2.timeout_secs = 1;
        let mut ctx = testing::context_with(config);
        let result = Ros2Tool(command("ros2_topic_echo"))
            .execute(json!({"topic_name": "/chatter"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result["status"], "timeout");
    }

    #[test]
    fn test_skill_exposes_every_command() {
        let skill = skill();
        assert_eq!(skill.name(), "ros2");
        assert_eq!(skill.tools().len(), COMMANDS.len());
    }
}
