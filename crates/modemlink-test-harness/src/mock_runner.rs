//! Scripted command runner for testing device profiles.
//!
//! Profiles and the bring-up sequencer are written against the
//! [`CommandRunner`] trait, so they can be exercised with a line-level
//! script and no engine or transport underneath.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use modemlink_core::command::{CommandResponse, CommandRunner};
use modemlink_core::error::{Error, Result};

/// How one scripted exchange should conclude.
#[derive(Debug, Clone)]
enum ScriptedResult {
    /// Terminal `OK` with these response lines.
    Ok(Vec<String>),
    /// Error terminal with this diagnostic text.
    Rejected(String),
    /// No terminal at all.
    Timeout,
}

#[derive(Debug, Clone)]
struct ScriptEntry {
    expected_line: String,
    result: ScriptedResult,
}

/// A scripted [`CommandRunner`] that checks commands in order.
///
/// Each `execute()` call is matched against the next script entry; a
/// mismatch or an exhausted script fails the call with a protocol error so
/// tests surface unexpected commands immediately.
#[derive(Debug, Default)]
pub struct MockCommandRunner {
    script: Mutex<VecDeque<ScriptEntry>>,
    executed: Mutex<Vec<String>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `line` and answer with `OK` after the given response lines.
    pub fn expect_ok(&self, line: &str, response_lines: &[&str]) {
        self.push(line, ScriptedResult::Ok(
            response_lines.iter().map(|s| s.to_string()).collect(),
        ));
    }

    /// Expect `line` and answer with an error terminal.
    pub fn expect_rejected(&self, line: &str, diagnostic: &str) {
        self.push(line, ScriptedResult::Rejected(diagnostic.to_string()));
    }

    /// Expect `line` and never produce a terminal.
    pub fn expect_timeout(&self, line: &str) {
        self.push(line, ScriptedResult::Timeout);
    }

    /// Every command line executed so far, in order.
    pub fn executed_lines(&self) -> Vec<String> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Script entries not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn push(&self, line: &str, result: ScriptedResult) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(ScriptEntry {
                expected_line: line.to_string(),
                result,
            });
        }
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn execute(&self, line: &str, timeout: Duration) -> Result<CommandResponse> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(line.to_string());
        }

        let entry = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .ok_or_else(|| Error::Protocol(format!("unscripted command: {line:?}")))?;

        if line != entry.expected_line {
            return Err(Error::Protocol(format!(
                "unexpected command: expected {:?}, got {:?}",
                entry.expected_line, line
            )));
        }

        match entry.result {
            ScriptedResult::Ok(lines) => Ok(CommandResponse { lines }),
            ScriptedResult::Rejected(diag) => Err(Error::CommandRejected(diag)),
            ScriptedResult::Timeout => Err(Error::Timeout { waited: timeout }),
        }
    }
}
