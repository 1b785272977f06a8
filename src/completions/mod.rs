//! Command-line completion for the interactive shell.
//!
//! The first word of a line is completed against the registered command
//! names; later words are handed to that command's [`Completer`].

pub mod ros2;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::Ros2Config;

pub use ros2::{Ros2Cli, Ros2Completer, Ros2Kind, Ros2Source};

/// One candidate replacement for the word under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Where the replacement starts, relative to the cursor. Never positive.
    pub start_position: isize,
    pub display: String,
}

impl Completion {
    /// Completion replacing the partially typed `word`.
    pub fn new(text: impl Into<String>, word: &str) -> Self {
        let text = text.into();
        Self {
            display: text.clone(),
            text,
            start_position: -(word.chars().count() as isize),
        }
    }
}

/// Completes the arguments of one command.
#[async_trait]
pub trait Completer: Send + Sync {
    /// `words` is the whole line split on whitespace, with an empty last
    /// word when the cursor follows a space; `index` points at the word
    /// being completed (always >= 1).
    async fn complete(&self, words: &[String], index: usize) -> Vec<Completion>;
}

/// Keeps only the candidates starting with `word`, in order.
pub(crate) fn matching<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    word: &str,
    ignore_case: bool,
) -> Vec<Completion> {
    let prefix = if ignore_case {
        word.to_lowercase()
    } else {
        word.to_string()
    };
    candidates
        .into_iter()
        .filter(|c| c.starts_with(prefix.as_str()))
        .map(|c| Completion::new(c, word))
        .collect()
}

/// Splits a line into words; a trailing space starts a new, empty word.
pub fn split_line(line: &str) -> Vec<String> {
    let mut words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if words.is_empty() || line.ends_with(char::is_whitespace) {
        words.push(String::new());
    }
    words
}

#[derive(Default)]
pub struct CompletionRegistry {
    completers: BTreeMap<String, Box<dyn Completer>>,
}

impl CompletionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every builtin completer.
    pub fn builtin(ros2: &Ros2Config) -> Self {
        let mut registry = Self::new();
        registry.register("ros2", Box::new(Ros2Completer::new(Ros2Cli::new(&ros2.program))));
        registry
    }

    pub fn register(&mut self, command: impl Into<String>, completer: Box<dyn Completer>) {
        self.completers.insert(command.into(), completer);
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.completers.keys().map(String::as_str)
    }

    pub async fn complete(&self, line: &str) -> Vec<Completion> {
        let words = split_line(line);
        let index = words.len() - 1;

        if index == 0 {
            return matching(self.commands(), &words[0], false);
        }
        match self.completers.get(&words[0]) {
            Some(completer) => completer.complete(&words, index).await,
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static [&'static str]);

    #[async_trait]
    impl Completer for Fixed {
        async fn complete(&self, words: &[String], index: usize) -> Vec<Completion> {
            matching(self.0.iter().copied(), &words[index], false)
        }
    }

    fn registry() -> CompletionRegistry {
        let mut registry = CompletionRegistry::new();
        registry.register("git", Box::new(Fixed(&["status", "stash", "commit"])));
        registry.register("ros2", Box::new(Fixed(&["topic"])));
        registry
    }

    fn texts(completions: &[Completion]) -> Vec<&str> {
        completions.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_split_line() {
        assert_eq!(split_line(""), [""]);
        assert_eq!(split_line("ros2"), ["ros2"]);
        assert_eq!(split_line("ros2 "), ["ros2", ""]);
        assert_eq!(split_line("ros2  topic li"), ["ros2", "topic", "li"]);
    }

    #[test]
    fn test_completion_start_position() {
        assert_eq!(Completion::new("topic", "to").start_position, -2);
        assert_eq!(Completion::new("topic", "").start_position, 0);
        assert_eq!(Completion::new("topic", "").display, "topic");
    }

    #[tokio::test]
    async fn test_completes_command_names() {
        let registry = registry();
        assert_eq!(texts(&registry.complete("").await), ["git", "ros2"]);
        assert_eq!(texts(&registry.complete("r").await), ["ros2"]);
        assert!(registry.complete("x").await.is_empty());
    }

    #[tokio::test]
    async fn test_delegates_to_command_completer() {
        let registry = registry();
        let completions = registry.complete("git st").await;
        assert_eq!(texts(&completions), ["status", "stash"]);
        assert_eq!(completions[0].start_position, -2);
        assert_eq!(texts(&registry.complete("git ").await).len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_command_has_no_completions() {
        assert!(registry().complete("cargo b").await.is_empty());
    }

    #[test]
    fn test_builtin_registers_ros2() {
        let registry = CompletionRegistry::builtin(&Ros2Config::default());
        assert_eq!(registry.commands().collect::<Vec<_>>(), ["ros2"]);
    }
}
