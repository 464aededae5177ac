//! Runs the external auto-fix command and settles it to one outcome.
//!
//! Each invocation subscribes two listeners to the runner's signal stream
//! before starting the command (so a fast exit cannot be missed): one for
//! exit signals, one for terminal-closed signals. The first signal that
//! matches the invocation's identity resolves its [`FixTaskHandle`]; both
//! listeners are then dropped, so later or duplicate signals have nowhere
//! to land. Cancellation and an optional timeout race alongside them.
//!
//! Invocations are serialized: the coordinator holds a FIFO lock, so
//! concurrent callers take turns on the single terminal. A run that is
//! stopped (timeout or abort) keeps the turn until its exit arrives, bounded
//! by [`TERMINATE_GRACE`].

use crate::host::{Notifier, TaskRunner};
use crate::models::fix::{Execution, FixCommand, FixOutcome, SettleCause, Settlement, TaskSignal};
use crate::models::Level;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a stopped execution may take to report its exit before the
/// next invocation is let through anyway.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Listeners registered for one invocation.
pub struct Listeners {
    exits: broadcast::Receiver<TaskSignal>,
    closes: broadcast::Receiver<TaskSignal>,
}

impl Listeners {
    pub fn subscribe(runner: &dyn TaskRunner) -> Self {
        Self {
            exits: runner.subscribe(),
            closes: runner.subscribe(),
        }
    }
}

enum Wake {
    Cancelled,
    TimedOut,
    Exit(Result<TaskSignal, RecvError>),
    Close(Result<TaskSignal, RecvError>),
}

/// One started invocation: its identity, the listeners still registered,
/// and the settlement once resolved.
pub struct FixTaskHandle {
    execution: Execution,
    listeners: Option<Listeners>,
    settled: Option<Settlement>,
}

impl FixTaskHandle {
    pub fn new(execution: Execution, listeners: Listeners) -> Self {
        Self {
            execution,
            listeners: Some(listeners),
            settled: None,
        }
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        self.settled.as_ref()
    }

    pub fn listener_count(&self) -> usize {
        if self.listeners.is_some() {
            2
        } else {
            0
        }
    }

    /// Resolve the handle unless it already is, and release the listeners.
    /// Returns the settlement that stands.
    pub fn settle(&mut self, settlement: Settlement) -> Settlement {
        if self.settled.is_none() {
            self.settled = Some(settlement);
            self.listeners = None;
        }
        self.settled.clone().unwrap_or_else(|| Settlement::cancelled(SettleCause::Aborted))
    }

    /// Offer a signal. Returns true when it resolved the handle; signals for
    /// other executions or terminals, and any signal after settlement, are
    /// ignored.
    pub fn accept(&mut self, signal: TaskSignal) -> bool {
        if self.settled.is_some() {
            return false;
        }
        let settlement = match signal {
            TaskSignal::Exited { execution, code } if execution == self.execution.id => {
                Settlement::from_exit(code)
            }
            TaskSignal::TerminalClosed { terminal } if terminal == self.execution.terminal => {
                Settlement::cancelled(SettleCause::TerminalClosed)
            }
            _ => return false,
        };
        self.settle(settlement);
        true
    }

    /// Wait for the first of: a matching exit, a matching terminal close,
    /// cancellation, or the deadline.
    pub async fn wait(
        &mut self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Settlement {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(s) = &self.settled {
                return s.clone();
            }
            let Some(listeners) = self.listeners.as_mut() else {
                return self.settle(Settlement::cancelled(SettleCause::SignalsLost));
            };
            let expiry = async {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                r = listeners.exits.recv() => Wake::Exit(r),
                r = listeners.closes.recv() => Wake::Close(r),
                _ = expiry => Wake::TimedOut,
            };
            match wake {
                Wake::Cancelled => return self.settle(Settlement::cancelled(SettleCause::Aborted)),
                Wake::TimedOut => return self.settle(Settlement::cancelled(SettleCause::TimedOut)),
                Wake::Exit(Ok(signal @ TaskSignal::Exited { .. }))
                | Wake::Close(Ok(signal @ TaskSignal::TerminalClosed { .. })) => {
                    self.accept(signal);
                }
                Wake::Exit(Ok(_)) | Wake::Close(Ok(_)) => {}
                Wake::Exit(Err(RecvError::Lagged(n))) | Wake::Close(Err(RecvError::Lagged(n))) => {
                    warn!(execution = %self.execution.id, skipped = n, "signal listener lagged");
                }
                Wake::Exit(Err(RecvError::Closed)) | Wake::Close(Err(RecvError::Closed)) => {
                    return self.settle(Settlement::cancelled(SettleCause::SignalsLost));
                }
            }
        }
    }
}

/// Owns the fix command for one scan and serializes its invocations.
pub struct FixTaskCoordinator {
    runner: Arc<dyn TaskRunner>,
    notifier: Arc<dyn Notifier>,
    command: FixCommand,
    timeout: Option<Duration>,
    turn: Mutex<()>,
}

impl FixTaskCoordinator {
    pub fn new(
        runner: Arc<dyn TaskRunner>,
        notifier: Arc<dyn Notifier>,
        command: FixCommand,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            runner,
            notifier,
            command,
            timeout,
            turn: Mutex::new(()),
        }
    }

    /// Run the fix command once and report how it settled. Never fails.
    pub async fn run_fix(&self, cancel: &CancellationToken) -> FixOutcome {
        self.run_fix_settled(cancel).await.outcome
    }

    pub async fn run_fix_settled(&self, cancel: &CancellationToken) -> Settlement {
        let _turn = self.turn.lock().await;
        let settlement = self.invoke(cancel).await;
        info!(
            command = %self.command.line,
            outcome = ?settlement.outcome,
            cause = ?settlement.cause,
            "auto-fix settled"
        );
        let (level, message) = status_message(&settlement, &self.command, self.timeout);
        self.notifier.show(level, &message);
        settlement
    }

    async fn invoke(&self, cancel: &CancellationToken) -> Settlement {
        if cancel.is_cancelled() {
            return Settlement::cancelled(SettleCause::Aborted);
        }
        let listeners = Listeners::subscribe(self.runner.as_ref());
        let execution = match self.runner.start(&self.command).await {
            Ok(Some(execution)) => execution,
            Ok(None) => {
                warn!(command = %self.command.line, "runner returned no execution");
                return Settlement::start_failed("no execution handle");
            }
            Err(e) => {
                warn!(command = %self.command.line, error = %e, "failed to start auto-fix");
                return Settlement::start_failed(e.to_string());
            }
        };
        debug!(execution = %execution.id, terminal = %execution.terminal, "auto-fix started");
        let mut handle = FixTaskHandle::new(execution, listeners);
        let settlement = handle.wait(self.timeout, cancel).await;
        if matches!(settlement.cause, SettleCause::TimedOut | SettleCause::Aborted) {
            self.stop(&execution).await;
        }
        settlement
    }

    /// Terminate a settled execution and wait for its exit signal.
    async fn stop(&self, execution: &Execution) {
        let mut exits = self.runner.subscribe();
        if !self.runner.terminate(execution).await {
            return;
        }
        let exited = async {
            loop {
                match exits.recv().await {
                    Ok(TaskSignal::Exited { execution: id, .. }) if id == execution.id => {
                        return true
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return false,
                }
            }
        };
        match tokio::time::timeout(TERMINATE_GRACE, exited).await {
            Ok(true) => debug!(execution = %execution.id, "stopped auto-fix exited"),
            Ok(false) => warn!(execution = %execution.id, "signals closed while stopping auto-fix"),
            Err(_) => warn!(
                execution = %execution.id,
                grace = ?TERMINATE_GRACE,
                "auto-fix did not exit after terminate; releasing turn"
            ),
        }
    }
}

/// User-facing status line for a settlement.
pub fn status_message(
    settlement: &Settlement,
    command: &FixCommand,
    timeout: Option<Duration>,
) -> (Level, String) {
    match &settlement.cause {
        SettleCause::Exited(Some(0)) => (
            Level::Info,
            "Auto-fix task completed successfully.".to_string(),
        ),
        SettleCause::Exited(Some(1)) => (
            Level::Warning,
            "Auto-fix task failed. Check the terminal for details.".to_string(),
        ),
        SettleCause::Exited(_) => (Level::Info, "Auto-fix task was canceled.".to_string()),
        SettleCause::TerminalClosed => (
            Level::Error,
            "Auto-fix task terminated. Please run the command again.".to_string(),
        ),
        SettleCause::TimedOut => (
            Level::Error,
            format!(
                "Auto-fix task timed out after {}s and was stopped.",
                timeout.map(|t| t.as_secs()).unwrap_or_default()
            ),
        ),
        SettleCause::Aborted => (Level::Warning, "Auto-fix task was aborted.".to_string()),
        SettleCause::SignalsLost => (
            Level::Error,
            "Lost track of the auto-fix task. Please run the command again.".to_string(),
        ),
        SettleCause::StartFailed(reason) => match command.script_name() {
            Some(script) => (
                Level::Error,
                format!(
                    "Failed to start the auto-fix task ({}). Check the \"{}\" script in package.json, e.g. \"{}\": \"eslint --fix .\"",
                    reason, script, script
                ),
            ),
            None => (
                Level::Error,
                format!(
                    "Failed to start the auto-fix task `{}`: {}",
                    command.line, reason
                ),
            ),
        },
    }
}
