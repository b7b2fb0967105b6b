//! Scripted host for tests (testing only)
//!
//! `ScriptedRunner` satisfies the [`CommandRunner`] contract without spawning
//! anything: replies are matched by program and leading arguments, every
//! invocation is recorded, and a rule may carry a side effect (for example
//! creating the directory a `git clone` would have created).

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::HostError;
use crate::Result;

/// Canned response for a matched command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Process ran and exited with the given code and output.
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// Executable is not on PATH.
    NotFound,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Reply::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Reply::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

type SideEffect = Arc<dyn Fn(&CommandSpec) + Send + Sync>;

struct Rule {
    program: String,
    leading_args: Vec<String>,
    replies: Vec<Reply>,
    served: usize,
    effect: Option<SideEffect>,
}

impl Rule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        let leading: Vec<&str> = self.leading_args.iter().map(String::as_str).collect();
        spec.matches(&self.program, &leading)
    }

    /// Replies are served in order; the last one repeats.
    fn next_reply(&mut self) -> Reply {
        let idx = self.served.min(self.replies.len().saturating_sub(1));
        self.served += 1;
        self.replies.get(idx).cloned().unwrap_or(Reply::NotFound)
    }
}

/// In-memory [`CommandRunner`] driven by match rules.
///
/// Unmatched commands behave as if the executable were missing.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
    executables: Mutex<BTreeSet<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `program leading_args...` with `reply`, always.
    pub fn on(self, program: &str, leading_args: &[&str], reply: Reply) -> Self {
        self.push_rule(program, leading_args, vec![reply], None)
    }

    /// Reply with each entry of `replies` in turn, repeating the last.
    pub fn on_sequence(self, program: &str, leading_args: &[&str], replies: Vec<Reply>) -> Self {
        self.push_rule(program, leading_args, replies, None)
    }

    /// Like [`ScriptedRunner::on`], running `effect` before replying.
    pub fn on_with<F>(self, program: &str, leading_args: &[&str], reply: Reply, effect: F) -> Self
    where
        F: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.push_rule(program, leading_args, vec![reply], Some(Arc::new(effect)))
    }

    /// Make `program` discoverable through [`CommandRunner::locate`].
    pub fn with_executable(self, program: &str) -> Self {
        self.executables
            .lock()
            .unwrap()
            .insert(program.to_string());
        self
    }

    fn push_rule(
        self,
        program: &str,
        leading_args: &[&str],
        replies: Vec<Reply>,
        effect: Option<SideEffect>,
    ) -> Self {
        self.rules.lock().unwrap().push(Rule {
            program: program.to_string(),
            leading_args: leading_args.iter().map(|a| a.to_string()).collect(),
            replies,
            served: 0,
            effect,
        });
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching `program leading_args...`.
    pub fn count(&self, program: &str, leading_args: &[&str]) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.matches(program, leading_args))
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let (reply, effect) = {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|r| r.matches(spec)) {
                Some(rule) => (rule.next_reply(), rule.effect.clone()),
                None => (Reply::NotFound, None),
            }
        };

        if let Some(effect) = effect {
            effect(spec);
        }

        match reply {
            Reply::Exit {
                code,
                stdout,
                stderr,
            } => Ok(CommandOutput {
                exit_code: Some(code),
                stdout,
                stderr,
            }),
            Reply::NotFound => Err(HostError::NotFound {
                program: spec.program.clone(),
            }),
        }
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        let executables = self.executables.lock().unwrap();
        executables
            .contains(program)
            .then(|| PathBuf::from("/fake/bin").join(program))
    }
}
