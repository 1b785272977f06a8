//! flouri: the skills and tools layer of a conversational shell agent.
//!
//! Tools are grouped into [`skills::Skill`]s held by a read-only
//! [`skills::SkillRegistry`]. Which skills are active is persisted by a
//! [`config_manager::SkillStore`] and edited through the
//! [`manager::ToolManager`], which the agent itself can drive via the
//! `tool_manager` skill. [`agent::runtime::ToolRuntime`] ties one session
//! together: it exposes the enabled tools, runs calls and logs them.

pub mod agent;
pub mod completions;
pub mod config;
pub mod config_manager;
pub mod manager;
pub mod sandbox;
pub mod session;
pub mod skills;

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the unit tests.

    use std::collections::BTreeSet;
    use std::io;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};

    use crate::config::Config;
    use crate::config_manager::{ConfigError, SkillStore};
    use crate::manager::ToolManager;
    use crate::session::Session;
    use crate::skills::{FunctionTool, Skill, SkillRegistry, Tool, ToolContext};

    fn ok(_: &Value) -> anyhow::Result<Value> {
        Ok(json!({"status": "success"}))
    }

    /// Skill whose tools all answer `{"status": "success"}`.
    pub fn skill(name: &'static str, tools: &[&'static str]) -> Skill {
        let tools = tools
            .iter()
            .map(|&tool| {
                Arc::new(FunctionTool::new(tool, "Stub tool", json!({"type": "object"}), ok))
                    as Arc<dyn Tool>
            })
            .collect();
        Skill::new(name, format!("{name} skill"), tools)
    }

    /// Small registry: `bash` = [execute_bash, get_user], `ros2` = [ros2_topic_list].
    pub fn stub_registry() -> SkillRegistry {
        let bash = Skill::new(
            "bash",
            "bash skill",
            vec![
                Arc::new(FunctionTool::new(
                    "execute_bash",
                    "Run a bash command",
                    json!({"type": "object"}),
                    ok,
                )),
                Arc::new(FunctionTool::new(
                    "get_user",
                    "Get the current user",
                    json!({"type": "object"}),
                    ok,
                )),
            ],
        );
        SkillRegistry::new(vec![bash, skill("ros2", &["ros2_topic_list"])]).unwrap()
    }

    /// In-memory [`SkillStore`] that counts writes and can refuse them.
    pub struct MemoryStore {
        skills: Mutex<BTreeSet<String>>,
        read_only: bool,
        unreadable: bool,
        writes: AtomicUsize,
    }

    impl MemoryStore {
        pub fn new(skills: &[&str]) -> Self {
            Self {
                skills: Mutex::new(skills.iter().map(|s| s.to_string()).collect()),
                read_only: false,
                unreadable: false,
                writes: AtomicUsize::new(0),
            }
        }

        /// Mutations fail with a permission error.
        pub fn read_only(mut self) -> Self {
            self.read_only = true;
            self
        }

        /// Mutations still apply, but reading the set fails.
        pub fn unreadable(mut self) -> Self {
            self.unreadable = true;
            self
        }

        pub fn snapshot(&self) -> BTreeSet<String> {
            self.skills.lock().unwrap().clone()
        }

        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn update(&self, f: impl FnOnce(&mut BTreeSet<String>) -> bool) -> Result<(), ConfigError> {
            if self.read_only {
                return Err(ConfigError::PermissionDenied {
                    path: PathBuf::from("/memory/skills.toml"),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            let mut skills = self.skills.lock().unwrap();
            if f(&mut *skills) {
                self.writes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    impl SkillStore for MemoryStore {
        fn get_enabled_skills(&self) -> Result<BTreeSet<String>, ConfigError> {
            if self.unreadable {
                return Err(failure());
            }
            Ok(self.snapshot())
        }

        fn add_skill(&self, name: &str) -> Result<(), ConfigError> {
            self.update(|skills| skills.insert(name.to_string()))
        }

        fn remove_skill(&self, name: &str) -> Result<(), ConfigError> {
            self.update(|skills| skills.remove(name))
        }
    }

    /// Store whose every operation fails.
    pub struct FailingStore;

    fn failure() -> ConfigError {
        ConfigError::Io {
            path: PathBuf::from("/etc/flouri/skills.toml"),
            source: io::Error::new(io::ErrorKind::Other, "read-only config"),
        }
    }

    impl SkillStore for FailingStore {
        fn get_enabled_skills(&self) -> Result<BTreeSet<String>, ConfigError> {
            Err(failure())
        }

        fn add_skill(&self, _: &str) -> Result<(), ConfigError> {
            Err(failure())
        }

        fn remove_skill(&self, _: &str) -> Result<(), ConfigError> {
            Err(failure())
        }
    }

    pub fn context() -> ToolContext {
        context_with(Config::default())
    }

    /// Context over [`stub_registry`] with only `bash` enabled.
    pub fn context_with(config: Config) -> ToolContext {
        let manager = ToolManager::new(
            Arc::new(stub_registry()),
            Arc::new(MemoryStore::new(&["bash"])),
        );
        ToolContext::new(Session::new(std::env::temp_dir()), Arc::new(config), manager)
    }
}
