//! Collaborator traits the core talks to.
//!
//! The binary wires filesystem/process/console implementations
//! (`workspace`, `runner`, `output`); tests wire in-memory fakes.

use crate::error::Result;
use crate::models::fix::{Execution, FixCommand, TaskSignal};
use crate::models::{Diagnostic, Document, Level};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

#[async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Document>;

    /// Current diagnostics for `doc`. Only emptiness is consulted.
    async fn diagnostics(&self, doc: &Document) -> Result<Vec<Diagnostic>>;
}

#[async_trait]
pub trait Editor: Send + Sync {
    async fn focus(&self, doc: &Document) -> Result<()>;
    async fn close(&self, doc: &Document) -> Result<()>;
}

#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Register a listener for completion signals of every execution.
    fn subscribe(&self) -> broadcast::Receiver<TaskSignal>;

    /// Start `command`. `Ok(None)` means the runner could not produce an
    /// execution without knowing why; a known cause such as a missing
    /// package script is an error.
    async fn start(&self, command: &FixCommand) -> Result<Option<Execution>>;

    /// Ask a running execution to stop. Returns false when it had already
    /// finished. Otherwise its exit signal still follows.
    async fn terminate(&self, execution: &Execution) -> bool;
}

pub trait Notifier: Send + Sync {
    fn show(&self, level: Level, message: &str);
}

pub trait FileDiscovery: Send + Sync {
    /// Files under `root` whose extension is in `extensions`, skipping any
    /// directory named `exclude_dir`, at most `limit` entries.
    fn discover(
        &self,
        root: &Path,
        extensions: &[String],
        exclude_dir: &str,
        limit: usize,
    ) -> Result<Vec<PathBuf>>;
}

/// Bundle of collaborators handed to the scanner.
#[derive(Clone)]
pub struct Host {
    pub documents: Arc<dyn DocumentProvider>,
    pub editor: Arc<dyn Editor>,
    pub runner: Arc<dyn TaskRunner>,
    pub notifier: Arc<dyn Notifier>,
    pub discovery: Arc<dyn FileDiscovery>,
}
