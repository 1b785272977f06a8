//! Persisted enabled-skill set.
//!
//! The state file is a small TOML document:
//!
//! ```toml
//! enabled_skills = ["bash", "config", "history", "system", "tool_manager"]
//! ```
//!
//! A missing file means "defaults". Writes go to a sibling temporary file
//! which is then renamed over the original, so a failed write leaves the
//! previous state intact. There is no cross-process locking: a single
//! agent process is assumed to own the file.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Skills enabled when no state file exists yet. ROS2 is opt-in.
pub const DEFAULT_ENABLED_SKILLS: &[&str] = &["bash", "config", "history", "system", "tool_manager"];

/// Failures reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("permission denied accessing {path}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed state file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot serialize state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    fn io(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        if source.kind() == io::ErrorKind::PermissionDenied {
            ConfigError::PermissionDenied { path, source }
        } else {
            ConfigError::Io { path, source }
        }
    }

    /// Whether retrying the same operation could succeed.
    ///
    /// Permission problems and malformed files need a human; other I/O
    /// errors (full disk, interrupted write) may be transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConfigError::Io { .. })
    }
}

/// Source of truth for which skills are enabled.
///
/// All mutation from the tool manager goes through this trait.
pub trait SkillStore: Send + Sync {
    /// Persisted enabled-skill names. A missing backing file is not an
    /// error and yields the default set.
    fn get_enabled_skills(&self) -> Result<BTreeSet<String>, ConfigError>;

    /// Adds `name` to the enabled set. Adding an enabled skill is a no-op.
    fn add_skill(&self, name: &str) -> Result<(), ConfigError>;

    /// Removes `name` from the enabled set. Removing an absent skill is a no-op.
    fn remove_skill(&self, name: &str) -> Result<(), ConfigError>;
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct SkillState {
    #[serde(default)]
    enabled_skills: BTreeSet<String>,
}

/// File-backed [`SkillStore`].
pub struct ConfigManager {
    path: PathBuf,
    defaults: BTreeSet<String>,
}

impl ConfigManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_defaults(path, DEFAULT_ENABLED_SKILLS.iter().copied())
    }

    pub fn with_defaults<'a>(
        path: impl Into<PathBuf>,
        defaults: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            path: path.into(),
            defaults: defaults.into_iter().map(String::from).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<SkillState, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, using default skills");
                return Ok(SkillState {
                    enabled_skills: self.defaults.clone(),
                });
            }
            Err(e) => return Err(ConfigError::io(&self.path, e)),
        };

        toml::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, state: &SkillState) -> Result<(), ConfigError> {
        let content = toml::to_string(state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }

        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, content).map_err(|e| ConfigError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(ConfigError::io(&self.path, e));
        }
        Ok(())
    }

    /// Applies `change` to the persisted set; writes only if it changed.
    fn update(&self, change: impl FnOnce(&mut BTreeSet<String>) -> bool) -> Result<bool, ConfigError> {
        let mut state = self.load()?;
        if !change(&mut state.enabled_skills) {
            return Ok(false);
        }
        self.save(&state)?;
        Ok(true)
    }
}

impl SkillStore for ConfigManager {
    fn get_enabled_skills(&self) -> Result<BTreeSet<String>, ConfigError> {
        Ok(self.load()?.enabled_skills)
    }

    fn add_skill(&self, name: &str) -> Result<(), ConfigError> {
        if self.update(|set| set.insert(name.to_string()))? {
            info!(skill = %name, "Skill enabled");
        }
        Ok(())
    }

    fn remove_skill(&self, name: &str) -> Result<(), ConfigError> {
        if self.update(|set| set.remove(name))? {
            info!(skill = %name, "Skill disabled");
        }
        Ok(())
    }
}
