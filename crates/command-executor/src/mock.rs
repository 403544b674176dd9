//! Scripted launcher for tests
//!
//! Records every command it receives and answers from ordered substring
//! rules. Commands matching no rule succeed with empty output.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::command::Command;
use crate::error::Result;
use crate::launcher::Launcher;
use crate::process::ExitResult;

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    result: ExitResult,
    once: bool,
}

/// A launcher that never spawns anything
///
/// Clones share their rules and command log, so one instance can back both
/// the `run` and `sudo` side of a router.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    rules: Arc<Mutex<Vec<Rule>>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLauncher {
    /// A launcher where every command succeeds silently
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `pattern` with `code` and `stdout`
    pub fn respond(self, pattern: impl Into<String>, code: i32, stdout: impl Into<String>) -> Self {
        self.push(pattern.into(), ExitResult::new(code, stdout), false);
        self
    }

    /// Like [`respond`](Self::respond) but the rule is consumed by its first match
    pub fn respond_once(
        self,
        pattern: impl Into<String>,
        code: i32,
        stdout: impl Into<String>,
    ) -> Self {
        self.push(pattern.into(), ExitResult::new(code, stdout), true);
        self
    }

    /// Every command received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Whether any received command contains `needle`
    pub fn saw(&self, needle: &str) -> bool {
        self.commands().iter().any(|cmd| cmd.contains(needle))
    }

    fn push(&self, pattern: String, result: ExitResult, once: bool) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                pattern,
                result,
                once,
            });
        }
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    async fn execute(&self, command: Command) -> Result<ExitResult> {
        let shown = command.display();
        if let Ok(mut log) = self.log.lock() {
            log.push(shown.clone());
        }

        let mut rules = match self.rules.lock() {
            Ok(rules) => rules,
            Err(_) => return Ok(ExitResult::new(0, "")),
        };
        match rules.iter().position(|rule| shown.contains(&rule.pattern)) {
            Some(index) if rules[index].once => Ok(rules.remove(index).result),
            Some(index) => Ok(rules[index].result.clone()),
            None => Ok(ExitResult::new(0, "")),
        }
    }

    async fn stage_file(&self, local: &Path) -> Result<(String, bool)> {
        Ok((local.to_string_lossy().into_owned(), false))
    }

    fn description(&self) -> String {
        "scripted".to_string()
    }
}
