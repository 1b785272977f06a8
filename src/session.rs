use std::path::{Path, PathBuf};

use crate::sandbox::CommandPolicy;

/// Per-session mutable state shared by the bash and config skills.
///
/// Constructed once per agent session and carried inside the
/// [`crate::skills::ToolContext`]; two sessions never see each other's
/// working directory or lists.
#[derive(Debug, Clone)]
pub struct Session {
    cwd: PathBuf,
    pub policy: CommandPolicy,
}

impl Session {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            policy: CommandPolicy::default(),
        }
    }

    /// Session rooted at the process working directory.
    pub fn from_current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Changes the working directory. `path` may be relative to the current
    /// one and may start with `~`. Fails if it is not an existing directory.
    pub fn set_cwd(&mut self, path: &str) -> anyhow::Result<&Path> {
        let expanded = shellexpand::tilde(path);
        let candidate = self.cwd.join(expanded.as_ref());
        let resolved = candidate
            .canonicalize()
            .map_err(|e| anyhow::anyhow!("Directory does not exist: {path} ({e})"))?;
        if !resolved.is_dir() {
            anyhow::bail!("Not a directory: {path}");
        }
        self.cwd = resolved;
        Ok(&self.cwd)
    }

    /// Replaces both lists. `None` leaves a list unset (no restriction).
    pub fn set_allowlist_blacklist(
        &mut self,
        allowlist: Option<Vec<String>>,
        blacklist: Option<Vec<String>>,
    ) {
        self.policy = CommandPolicy::new(allowlist, blacklist);
    }
}
