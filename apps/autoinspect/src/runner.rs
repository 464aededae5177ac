//! Process-backed task runner.
//!
//! Each started command runs as `sh -c <line>` in the workspace root, in a
//! process group of its own, with stdout/stderr inherited. Stopping an
//! execution kills the whole group, so tools spawned by `npm`/`sh` go with
//! it. A watcher task broadcasts `TerminalClosed` when the user presses
//! Ctrl-C (and stops the group) and `Exited` once the child is gone; both can
//! fire for the same execution, and the coordinator keeps whichever comes
//! first.

use crate::error::{InspectError, Result};
use crate::host::TaskRunner;
use crate::models::fix::{Execution, ExecutionId, FixCommand, TaskSignal};
use async_trait::async_trait;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

const SIGNAL_CAPACITY: usize = 64;

type KillSwitches = Arc<Mutex<HashMap<ExecutionId, oneshot::Sender<()>>>>;

pub struct ProcessTaskRunner {
    root: PathBuf,
    signals: broadcast::Sender<TaskSignal>,
    kills: KillSwitches,
    watch_ctrl_c: bool,
}

impl ProcessTaskRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            root: root.into(),
            signals,
            kills: Arc::new(Mutex::new(HashMap::new())),
            watch_ctrl_c: true,
        }
    }

    /// Do not treat Ctrl-C as closing the terminal (used by tests).
    pub fn without_ctrl_c(mut self) -> Self {
        self.watch_ctrl_c = false;
        self
    }
}

/// Kill the child's process group, falling back to the child alone.
fn stop_group(pgid: Option<u32>, child: &mut Child) {
    if let Some(pgid) = pgid {
        if kill_group(pgid) {
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(unix)]
fn kill_group(pgid: u32) -> bool {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return false;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => true,
        Err(e) => {
            warn!(pgid, error = %e, "failed to kill process group");
            false
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> bool {
    false
}

/// Whether `package.json` under `root` defines `scripts.<name>`.
pub async fn package_has_script(root: &Path, name: &str) -> bool {
    let Ok(s) = tokio::fs::read_to_string(root.join("package.json")).await else {
        return false;
    };
    serde_json::from_str::<Json>(&s)
        .ok()
        .and_then(|pkg| pkg.get("scripts")?.get(name).map(Json::is_string))
        .unwrap_or(false)
}

#[async_trait]
impl TaskRunner for ProcessTaskRunner {
    fn subscribe(&self) -> broadcast::Receiver<TaskSignal> {
        self.signals.subscribe()
    }

    async fn start(&self, command: &FixCommand) -> Result<Option<Execution>> {
        if let Some(script) = command.script_name() {
            if !package_has_script(&self.root, script).await {
                warn!(script, root = %self.root.display(), "script missing from package.json");
                return Err(InspectError::MissingScript {
                    script: script.to_string(),
                });
            }
        }
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command.line)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd.spawn().map_err(|source| InspectError::Spawn {
            command: command.line.clone(),
            source,
        })?;
        // leader of its own group
        let pgid = child.id();

        let execution = Execution::new();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        if let Ok(mut kills) = self.kills.lock() {
            kills.insert(execution.id, kill_tx);
        }
        info!(execution = %execution.id, command = %command.line, "auto-fix spawned");

        let signals = self.signals.clone();
        let kills = self.kills.clone();
        let watch_ctrl_c = self.watch_ctrl_c;
        tokio::spawn(async move {
            let ctrl_c = async {
                if watch_ctrl_c {
                    tokio::signal::ctrl_c().await
                } else {
                    std::future::pending().await
                }
            };
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = ctrl_c => {
                    debug!(terminal = %execution.terminal, "terminal interrupted");
                    let _ = signals.send(TaskSignal::TerminalClosed {
                        terminal: execution.terminal,
                    });
                    stop_group(pgid, &mut child);
                    child.wait().await
                }
                _ = &mut kill_rx => {
                    stop_group(pgid, &mut child);
                    child.wait().await
                }
            };
            if let Ok(mut kills) = kills.lock() {
                kills.remove(&execution.id);
            }
            let code = status.ok().and_then(|s| s.code());
            debug!(execution = %execution.id, ?code, "auto-fix exited");
            let _ = signals.send(TaskSignal::Exited {
                execution: execution.id,
                code,
            });
        });
        Ok(Some(execution))
    }

    async fn terminate(&self, execution: &Execution) -> bool {
        let switch = self
            .kills
            .lock()
            .ok()
            .and_then(|mut kills| kills.remove(&execution.id));
        match switch {
            Some(tx) => {
                warn!(execution = %execution.id, "terminating auto-fix");
                tx.send(()).is_ok()
            }
            None => false,
        }
    }
}
