//! Execution sandbox
//!
//! Two pieces used by the bash and ROS2 skills:
//!
//! 1. [`CommandPolicy`]: per-session allow/deny lists checked against a
//!    command line before it runs. Matching is plain string comparison on
//!    each segment of the line; it is not a security boundary.
//! 2. [`run`] spawns a subprocess with captured output and a hard
//!    timeout. The child is killed if the deadline passes.
//!    [`run_bounded`] is the variant for commands that never exit on their
//!    own (`ros2 topic hz`), keeping what they printed before the deadline.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// Outcome of checking a command line against a [`CommandPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run it.
    Allow,
    /// Run it, and record these programs in the allowlist.
    AllowAndRecord(Vec<String>),
    /// Refuse: the blacklist entry that matched.
    Block(String),
}

/// Allow/deny lists for shell commands.
///
/// The allowlist is informational: commands outside it are still run and
/// get added to it. Only the blacklist blocks anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPolicy {
    allowlist: Option<Vec<String>>,
    blacklist: Option<Vec<String>>,
}

impl CommandPolicy {
    pub fn new(allowlist: Option<Vec<String>>, blacklist: Option<Vec<String>>) -> Self {
        Self {
            allowlist,
            blacklist,
        }
    }

    pub fn allowlist(&self) -> &[String] {
        self.allowlist.as_deref().unwrap_or_default()
    }

    pub fn blacklist(&self) -> &[String] {
        self.blacklist.as_deref().unwrap_or_default()
    }

    pub fn in_allowlist(&self, command: &str) -> bool {
        self.allowlist().iter().any(|c| c == command.trim())
    }

    pub fn in_blacklist(&self, command: &str) -> bool {
        self.blacklist().iter().any(|c| c == command.trim())
    }

    /// Returns false if the entry was already present.
    pub fn add_to_allowlist(&mut self, command: &str) -> bool {
        add_entry(&mut self.allowlist, command)
    }

    /// Returns false if the entry was not present.
    pub fn remove_from_allowlist(&mut self, command: &str) -> bool {
        remove_entry(&mut self.allowlist, command)
    }

    pub fn add_to_blacklist(&mut self, command: &str) -> bool {
        add_entry(&mut self.blacklist, command)
    }

    pub fn remove_from_blacklist(&mut self, command: &str) -> bool {
        remove_entry(&mut self.blacklist, command)
    }

    /// Checks every segment of `command` (split on `;`, `&`, `|` and
    /// newlines). Single-word blacklist entries match a segment's program
    /// name; multi-word entries match anywhere in the normalized line.
    pub fn evaluate(&self, command: &str) -> Decision {
        let normalized = normalize(command);

        for entry in self.blacklist() {
            let entry_norm = normalize(entry);
            if entry_norm.is_empty() {
                continue;
            }
            let hit = if entry_norm.contains(' ') {
                normalized.contains(&entry_norm)
            } else {
                programs(command).any(|p| p == entry_norm)
            };
            if hit {
                debug!(entry = %entry, "Command matched blacklist");
                return Decision::Block(entry.clone());
            }
        }

        if self.allowlist.is_none() {
            return Decision::Allow;
        }

        let mut missing: Vec<String> = Vec::new();
        for program in programs(command) {
            if !self.in_allowlist(program) && !missing.iter().any(|m| m == program) {
                missing.push(program.to_string());
            }
        }
        if missing.is_empty() {
            Decision::Allow
        } else {
            Decision::AllowAndRecord(missing)
        }
    }
}

fn add_entry(list: &mut Option<Vec<String>>, command: &str) -> bool {
    let command = command.trim();
    let list = list.get_or_insert_with(Vec::new);
    if list.iter().any(|c| c == command) {
        return false;
    }
    list.push(command.to_string());
    true
}

fn remove_entry(list: &mut Option<Vec<String>>, command: &str) -> bool {
    let Some(list) = list.as_mut() else {
        return false;
    };
    let before = list.len();
    list.retain(|c| c != command.trim());
    list.len() != before
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits on `;`, `&`, `|` and newlines, leaving redirections such as
/// `2>&1`, `<&3`, `&>file` and `>|file` inside their segment.
fn segments(command: &str) -> Vec<&str> {
    let bytes = command.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let prev = i.checked_sub(1).map(|j| bytes[j]);
        let next = bytes.get(i + 1).copied();
        let separator = match b {
            b';' | b'\n' => true,
            b'&' => !matches!(prev, Some(b'>' | b'<')) && next != Some(b'>'),
            b'|' => prev != Some(b'>'),
            _ => false,
        };
        if separator {
            out.push(&command[start..i]);
            start = i + 1;
        }
    }
    out.push(&command[start..]);
    out
}

/// Program name of each segment, skipping leading `VAR=value` assignments.
fn programs(command: &str) -> impl Iterator<Item = &str> {
    segments(command).into_iter().filter_map(|segment| {
        segment
            .split_whitespace()
            .find(|word| !is_assignment(word))
    })
}

fn is_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Captured output of a finished subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` if killed by a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Finished(CommandOutput),
    TimedOut,
}

/// Runs `cmd` with piped output, no stdin, and a deadline.
///
/// Spawn failures (e.g. program not found) are returned as `Err`.
pub async fn run(mut cmd: Command, limit: Duration) -> std::io::Result<RunOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn()?;
    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(output) => {
            let output = output?;
            Ok(RunOutcome::Finished(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                code: output.status.code(),
            }))
        }
        // Dropping the future drops the child, which kills it
        Err(_) => Ok(RunOutcome::TimedOut),
    }
}

/// How long to keep draining pipes after a bounded child was killed.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs `cmd` for at most `limit`, then kills it and returns whatever it
/// printed so far. The flag is `true` when the deadline stopped it.
pub async fn run_bounded(
    mut cmd: Command,
    limit: Duration,
) -> std::io::Result<(CommandOutput, bool)> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let (status, stopped) = match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => (status?, false),
        Err(_) => {
            debug!("Stopping bounded command after {}s", limit.as_secs_f64());
            child.kill().await?;
            (child.wait().await?, true)
        }
    };

    Ok((
        CommandOutput {
            stdout: collect(stdout).await,
            stderr: collect(stderr).await,
            code: status.code(),
        },
        stopped,
    ))
}

fn drain<R: AsyncRead + Unpin + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        // Partial output is still useful if the pipe errors
        let _ = pipe.read_to_end(&mut buf).await;
        buf
    })
}

async fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(DRAIN_GRACE, handle).await {
        Ok(Ok(buf)) => String::from_utf8_lossy(&buf).into_owned(),
        _ => String::new(),
    }
}
