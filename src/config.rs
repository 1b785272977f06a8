use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub bash: BashConfig,
    #[serde(default)]
    pub ros2: Ros2Config,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Logger name on conversation log lines
    #[serde(default = "default_agent_name")]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Shell history, one command per line
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    /// Parent of the `session_*` conversation log directories
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    /// Persisted enabled-skill set
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BashConfig {
    #[serde(default = "default_bash_timeout")]
    pub timeout_secs: u64,
    /// Initial allowlist for new sessions (None = no allowlist)
    #[serde(default)]
    pub allowlist: Option<Vec<String>>,
    /// Initial blacklist for new sessions
    #[serde(default)]
    pub blacklist: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Ros2Config {
    /// Executable used by the ros2 skill and completions
    #[serde(default = "default_ros2_program")]
    pub program: String,
    #[serde(default = "default_ros2_timeout")]
    pub timeout_secs: u64,
}

fn default_agent_name() -> String {
    "flouri".to_string()
}

/// `~/.config/flouri`, or `./.flouri` when no home directory is known.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".config").join("flouri"))
        .unwrap_or_else(|| PathBuf::from(".flouri"))
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

fn default_history_file() -> PathBuf {
    default_config_dir().join("history")
}

fn default_logs_dir() -> PathBuf {
    default_config_dir().join("logs")
}

fn default_state_file() -> PathBuf {
    default_config_dir().join("skills.toml")
}

fn default_bash_timeout() -> u64 {
    30
}

fn default_ros2_program() -> String {
    "ros2".to_string()
}

fn default_ros2_timeout() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            history_file: default_history_file(),
            logs_dir: default_logs_dir(),
            state_file: default_state_file(),
        }
    }
}

impl PathsConfig {
    fn expand_home(&mut self) {
        for path in [
            &mut self.history_file,
            &mut self.logs_dir,
            &mut self.state_file,
        ] {
            let expanded = match path.to_str() {
                Some(raw) if raw.starts_with('~') => shellexpand::tilde(raw).into_owned(),
                _ => continue,
            };
            *path = PathBuf::from(expanded);
        }
    }
}

impl Default for BashConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_bash_timeout(),
            allowlist: None,
            blacklist: None,
        }
    }
}

impl Default for Ros2Config {
    fn default() -> Self {
        Self {
            program: default_ros2_program(),
            timeout_secs: default_ros2_timeout(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses TOML after expanding `${ENV_VAR}` references.
    /// Paths starting with `~` are resolved against the home directory.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let expanded = shellexpand::env(content)?;
        let mut config: Config = toml::from_str(&expanded)?;
        config.paths.expand_home();
        Ok(config)
    }

    /// Loads `path` if given; otherwise the default path, falling back to
    /// built-in defaults when that file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = default_config_path();
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.agent.name, "flouri");
        assert_eq!(config.bash.timeout_secs, 30);
        assert!(config.bash.allowlist.is_none());
        assert_eq!(config.ros2.program, "ros2");
        assert_eq!(config.ros2.timeout_secs, 10);
        assert!(config.paths.state_file.ends_with("skills.toml"));
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            [agent]
            name = "robot-shell"

            [paths]
            history_file = "/tmp/flouri/history"
            logs_dir = "/tmp/flouri/logs"
            state_file = "/tmp/flouri/skills.toml"

            [bash]
            timeout_secs = 5
            allowlist = ["ls", "cat"]
            blacklist = ["rm -rf /"]

            [ros2]
            program = "/opt/ros/humble/bin/ros2"
            timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.agent.name, "robot-shell");
        assert_eq!(config.paths.logs_dir, PathBuf::from("/tmp/flouri/logs"));
        assert_eq!(config.bash.timeout_secs, 5);
        assert_eq!(
            config.bash.allowlist,
            Some(vec!["ls".to_string(), "cat".to_string()])
        );
        assert_eq!(config.bash.blacklist, Some(vec!["rm -rf /".to_string()]));
        assert_eq!(config.ros2.program, "/opt/ros/humble/bin/ros2");
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("FLOURI_TEST_AGENT_NAME", "from-env");
        let config = Config::parse(
            r#"
            [agent]
            name = "${FLOURI_TEST_AGENT_NAME}"
            "#,
        )
        .unwrap();
        assert_eq!(config.agent.name, "from-env");
    }

    #[test]
    fn test_tilde_paths_expand_to_home() {
        let config = Config::parse(
            r#"
            [paths]
            logs_dir = "~/flouri-logs"
            "#,
        )
        .unwrap();
        assert!(!config.paths.logs_dir.starts_with("~"));
        assert!(config.paths.logs_dir.ends_with("flouri-logs"));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        assert!(Config::parse("[bash\ntimeout_secs = ").is_err());
        assert!(Config::parse("[bash]\ntimeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ros2]\nprogram = \"echo\"\n").unwrap();
        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.ros2.program, "echo");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_or_default(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
