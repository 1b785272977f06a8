pub mod bash;
pub mod config;
pub mod history;
pub mod ros2;
pub mod system;
pub mod tool_manager;

use super::Skill;

/// Every builtin skill, in the order tools are presented to the agent.
pub fn all() -> Vec<Skill> {
    vec![
        bash::skill(),
        config::skill(),
        history::skill(),
        ros2::skill(),
        system::skill(),
        tool_manager::skill(),
    ]
}
