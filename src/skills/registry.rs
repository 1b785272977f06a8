//! Skill registry
//!
//! The registry is the catalog of every skill the agent knows about. It is
//! built once at startup from an explicit list (see [`super::builtin::all`])
//! and never changes afterwards; which skills are *enabled* lives in the
//! persisted state handled by [`crate::config_manager::ConfigManager`].
//!
//! Tool names share one namespace across all skills. Any duplicate (skill
//! or tool) is rejected while building, since it means two definitions
//! disagree and there is no sensible precedence.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::{Skill, Tool};

/// Fatal problems found while building the registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Skill '{0}' declares no tools")]
    EmptySkill(String),

    #[error("Skill '{0}' is registered more than once")]
    DuplicateSkill(String),

    #[error("Skill '{skill}' declares tool '{tool}' more than once")]
    DuplicateToolInSkill { skill: String, tool: String },

    #[error("Tool '{tool}' is declared by both '{first}' and '{second}'")]
    DuplicateTool {
        tool: String,
        first: String,
        second: String,
    },
}

/// Introspection entry returned by [`SkillRegistry::get_all_tools_info`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolInfo {
    pub description: String,
    pub skill: String,
}

pub struct SkillRegistry {
    /// Skills in registration order.
    skills: Vec<Skill>,
    /// tool name → (skill index, tool index)
    index: HashMap<String, (usize, usize)>,
}

impl SkillRegistry {
    /// Builds a registry, validating names in a single pass.
    pub fn new(skills: Vec<Skill>) -> Result<Self, RegistryError> {
        let mut index: HashMap<String, (usize, usize)> = HashMap::new();
        let mut skill_names: HashSet<&str> = HashSet::new();

        for (si, skill) in skills.iter().enumerate() {
            if !skill_names.insert(skill.name()) {
                return Err(RegistryError::DuplicateSkill(skill.name().to_string()));
            }
            if skill.tools().is_empty() {
                return Err(RegistryError::EmptySkill(skill.name().to_string()));
            }

            for (ti, tool) in skill.tools().iter().enumerate() {
                if let Some(&(owner, _)) = index.get(tool.name()) {
                    return Err(if owner == si {
                        RegistryError::DuplicateToolInSkill {
                            skill: skill.name().to_string(),
                            tool: tool.name().to_string(),
                        }
                    } else {
                        RegistryError::DuplicateTool {
                            tool: tool.name().to_string(),
                            first: skills[owner].name().to_string(),
                            second: skill.name().to_string(),
                        }
                    });
                }
                index.insert(tool.name().to_string(), (si, ti));
            }
        }

        debug!(
            skills = skills.len(),
            tools = index.len(),
            "Skill registry built"
        );
        Ok(Self { skills, index })
    }

    /// Builds the registry of builtin skills.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(super::builtin::all())
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn skill(&self, name: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.name() == name)
    }

    pub fn skill_names(&self) -> impl Iterator<Item = &str> {
        self.skills.iter().map(|s| s.name())
    }

    /// Number of registered tools across all skills.
    pub fn tool_count(&self) -> usize {
        self.index.len()
    }

    pub fn get_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        let &(si, ti) = self.index.get(name)?;
        Some(&self.skills[si].tools()[ti])
    }

    /// Every tool name: registration order of skills, then tool order.
    /// Used as the fallback when the enabled set cannot be derived.
    pub fn get_all_tool_names(&self) -> Vec<String> {
        self.skills
            .iter()
            .flat_map(|s| s.tool_names().map(String::from))
            .collect()
    }

    /// Tool names of the given skills, in registry order.
    ///
    /// Unknown skill names are skipped: a stale config may still list a
    /// skill that no longer exists.
    pub fn get_tool_names_for_skills(&self, skill_names: &BTreeSet<String>) -> Vec<String> {
        for name in skill_names {
            if self.skill(name).is_none() {
                debug!(skill = %name, "Ignoring unknown skill in enabled set");
            }
        }

        self.skills
            .iter()
            .filter(|s| skill_names.contains(s.name()))
            .flat_map(|s| s.tool_names().map(String::from))
            .collect()
    }

    /// Resolves tool names to tools, in request order.
    /// Names without a matching tool are dropped, as are repeats.
    pub fn get_enabled_tools(&self, tool_names: &[String]) -> Vec<Arc<dyn Tool>> {
        let mut seen = HashSet::new();
        tool_names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| {
                let tool = self.get_tool(name);
                if tool.is_none() {
                    debug!(tool = %name, "Dropping unknown tool name");
                }
                tool.cloned()
            })
            .collect()
    }

    /// Reverse lookup: the skill that declares `tool_name`.
    pub fn get_skill_for_tool(&self, tool_name: &str) -> Option<&str> {
        self.index
            .get(tool_name)
            .map(|&(si, _)| self.skills[si].name())
    }

    pub fn get_all_tools_info(&self) -> BTreeMap<String, ToolInfo> {
        self.skills
            .iter()
            .flat_map(|skill| {
                skill.tools().iter().map(move |tool| {
                    (
                        tool.name().to_string(),
                        ToolInfo {
                            description: tool.description().to_string(),
                            skill: skill.name().to_string(),
                        },
                    )
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.skill_names().collect::<Vec<_>>())
            .field("tools", &self.tool_count())
            .finish()
    }
}
