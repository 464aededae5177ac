//! Types describing one external auto-fix invocation and its settlement.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shell command line used to run the auto-fix tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixCommand {
    pub line: String,
}

pub const DEFAULT_FIX_COMMAND: &str = "npm run lint-fix";

impl Default for FixCommand {
    fn default() -> Self {
        Self {
            line: DEFAULT_FIX_COMMAND.to_string(),
        }
    }
}

impl FixCommand {
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }

    /// Package-manager script this command runs, if it is one of
    /// `npm run <s>`, `pnpm run <s>`, `yarn run <s>` or `yarn <s>`.
    pub fn script_name(&self) -> Option<&str> {
        let mut words = self.line.split_whitespace();
        let tool = words.next()?;
        let next = words.next()?;
        match (tool, next) {
            ("npm" | "pnpm" | "yarn", "run" | "run-script") => words.next(),
            ("yarn", s) if !s.starts_with('-') => Some(s),
            _ => None,
        }
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Correlation identity of one started execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionId(u64);

/// Identity of the terminal driving an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalId(u64);

impl ExecutionId {
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl TerminalId {
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exec-{}", self.0)
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "term-{}", self.0)
    }
}

/// Handle returned by a task runner for a started command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    pub id: ExecutionId,
    pub terminal: TerminalId,
}

impl Execution {
    pub fn new() -> Self {
        Self {
            id: ExecutionId::next(),
            terminal: TerminalId::next(),
        }
    }
}

impl Default for Execution {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion signal broadcast by a task runner. Listeners filter by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSignal {
    /// The process ended. `code` is `None` on abnormal termination.
    Exited {
        execution: ExecutionId,
        code: Option<i32>,
    },
    /// The terminal driving an execution was closed by the user.
    TerminalClosed { terminal: TerminalId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    Success,
    /// Exit code 1: the tool ran to completion but reported leftovers.
    FailedSettled,
    Cancelled,
    FailedToStart,
}

/// What resolved a fix invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleCause {
    Exited(Option<i32>),
    TerminalClosed,
    TimedOut,
    Aborted,
    SignalsLost,
    StartFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: FixOutcome,
    pub cause: SettleCause,
}

impl Settlement {
    /// Map an exit code to its settlement: 0 succeeds, 1 is a settled failure,
    /// anything else (or no code at all) counts as cancelled.
    pub fn from_exit(code: Option<i32>) -> Self {
        let outcome = match code {
            Some(0) => FixOutcome::Success,
            Some(1) => FixOutcome::FailedSettled,
            _ => FixOutcome::Cancelled,
        };
        Self {
            outcome,
            cause: SettleCause::Exited(code),
        }
    }

    pub fn cancelled(cause: SettleCause) -> Self {
        Self {
            outcome: FixOutcome::Cancelled,
            cause,
        }
    }

    pub fn start_failed(reason: impl Into<String>) -> Self {
        Self {
            outcome: FixOutcome::FailedToStart,
            cause: SettleCause::StartFailed(reason.into()),
        }
    }
}
