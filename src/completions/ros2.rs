use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{matching, Completer, Completion};
use crate::sandbox::{self, RunOutcome};

/// Live lookups must not stall the prompt.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

const SUBCOMMANDS: &[&str] = &[
    "topic",
    "service",
    "action",
    "node",
    "param",
    "interface",
    "pkg",
    "run",
    "launch",
    "bag",
    "component",
    "daemon",
    "doctor",
    "extension_points",
    "lifecycle",
    "multicast",
    "security",
    "wtf",
];

fn verbs(subcommand: &str) -> &'static [&'static str] {
    match subcommand {
        "topic" => &["list", "echo", "info", "hz", "type", "pub", "bw"],
        "service" => &["list", "type", "call", "find"],
        "action" => &["list", "info", "send_goal"],
        "node" => &["list", "info"],
        "param" => &["list", "get", "set", "describe", "delete"],
        "interface" => &["list", "show", "package"],
        "pkg" => &["list", "prefix", "executables", "describe"],
        _ => &[],
    }
}

/// Kinds of live ROS 2 entities offered as arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ros2Kind {
    Topics,
    Services,
    Actions,
    Nodes,
}

impl Ros2Kind {
    fn subcommand(self) -> &'static str {
        match self {
            Ros2Kind::Topics => "topic",
            Ros2Kind::Services => "service",
            Ros2Kind::Actions => "action",
            Ros2Kind::Nodes => "node",
        }
    }

    /// Which names complete the argument of `ros2 <subcommand> <verb>`.
    fn for_argument(subcommand: &str, verb: &str) -> Option<Self> {
        match (subcommand, verb) {
            ("topic", "echo" | "info" | "hz" | "type" | "bw") => Some(Ros2Kind::Topics),
            ("service", "type" | "call" | "find") => Some(Ros2Kind::Services),
            ("action", "info" | "send_goal") => Some(Ros2Kind::Actions),
            ("node", "info") => Some(Ros2Kind::Nodes),
            ("param", "get" | "set" | "describe" | "delete" | "list") => Some(Ros2Kind::Nodes),
            _ => None,
        }
    }
}

/// Where live topic, service, action and node names come from.
#[async_trait]
pub trait Ros2Source: Send + Sync {
    /// Names of the given kind; empty when nothing can be listed.
    async fn list(&self, kind: Ros2Kind) -> Vec<String>;
}

/// [`Ros2Source`] backed by `<program> <subcommand> list`.
pub struct Ros2Cli {
    program: String,
}

impl Ros2Cli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Ros2Source for Ros2Cli {
    async fn list(&self, kind: Ros2Kind) -> Vec<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args([kind.subcommand(), "list"]);

        let out = match sandbox::run(cmd, LOOKUP_TIMEOUT).await {
            Ok(RunOutcome::Finished(out)) if out.success() => out,
            Ok(_) => return Vec::new(),
            Err(e) => {
                debug!("ros2 lookup failed: {e}");
                return Vec::new();
            }
        };

        out.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| match kind {
                Ros2Kind::Nodes => l.trim_start_matches('/').to_string(),
                _ => l.to_string(),
            })
            .collect()
    }
}

pub struct Ros2Completer {
    source: Box<dyn Ros2Source>,
}

impl Ros2Completer {
    pub fn new(source: impl Ros2Source + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl Completer for Ros2Completer {
    async fn complete(&self, words: &[String], index: usize) -> Vec<Completion> {
        let word = words.get(index).map(String::as_str).unwrap_or("");
        let subcommand = words.get(1).map(|w| w.to_lowercase()).unwrap_or_default();

        match index {
            1 => matching(SUBCOMMANDS.iter().copied(), word, true),
            2 => matching(verbs(&subcommand).iter().copied(), word, true),
            3 => {
                let verb = words.get(2).map(|w| w.to_lowercase()).unwrap_or_default();
                let Some(kind) = Ros2Kind::for_argument(&subcommand, &verb) else {
                    return Vec::new();
                };
                let names = self.source.list(kind).await;
                matching(names.iter().map(String::as_str), word, false)
            }
            _ => Vec::new(),
        }
    }
}
