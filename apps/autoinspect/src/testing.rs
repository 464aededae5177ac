//! In-memory fakes of the host traits for unit tests.

use crate::error::{InspectError, Result};
use crate::host::{DocumentProvider, Editor, FileDiscovery, Host, Notifier, TaskRunner};
use crate::models::fix::{Execution, ExecutionId, FixCommand, TaskSignal, TerminalId};
use crate::models::{Diagnostic, Document, Level};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// What the fake runner does on one `start` call.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Return no execution (script not configured).
    NoExecution,
    /// Fail to spawn.
    SpawnError,
    /// Emit these signals right away, in order.
    Signals(Vec<Emit>),
    /// Exit with `code` after `delay`.
    Delayed(Duration, Option<i32>),
    /// Never emit anything until terminated.
    Hang,
}

#[derive(Debug, Clone, Copy)]
pub enum Emit {
    Exit(Option<i32>),
    CloseTerminal,
    ForeignExit(i32),
    ForeignClose,
}

type Effect = Arc<dyn Fn() + Send + Sync>;

pub struct FakeRunner {
    tx: broadcast::Sender<TaskSignal>,
    plans: Mutex<VecDeque<Plan>>,
    effect: Mutex<Option<Effect>>,
    pub starts: AtomicUsize,
    pub terminated: Mutex<Vec<Execution>>,
    live: Arc<Mutex<HashSet<ExecutionId>>>,
    max_active: Arc<AtomicUsize>,
    /// Delay between `terminate` and the exit signal; `None` never exits.
    shutdown: Option<Duration>,
}

impl FakeRunner {
    pub fn new(plans: Vec<Plan>) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            plans: Mutex::new(plans.into()),
            effect: Mutex::new(None),
            starts: AtomicUsize::new(0),
            terminated: Mutex::new(Vec::new()),
            live: Arc::new(Mutex::new(HashSet::new())),
            max_active: Arc::new(AtomicUsize::new(0)),
            shutdown: Some(Duration::ZERO),
        }
    }

    pub fn with_shutdown(mut self, delay: Option<Duration>) -> Self {
        self.shutdown = delay;
        self
    }

    /// Run `f` every time an execution actually starts.
    pub fn with_effect(self, f: impl Fn() + Send + Sync + 'static) -> Self {
        *self.effect.lock().unwrap() = Some(Arc::new(f));
        self
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn enter(&self, id: ExecutionId) {
        let mut live = self.live.lock().unwrap();
        live.insert(id);
        self.max_active.fetch_max(live.len(), Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskRunner for FakeRunner {
    fn subscribe(&self) -> broadcast::Receiver<TaskSignal> {
        self.tx.subscribe()
    }

    async fn start(&self, command: &FixCommand) -> Result<Option<Execution>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let plan = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Plan::Signals(vec![Emit::Exit(Some(0))]));
        let execution = match plan {
            Plan::NoExecution => return Ok(None),
            Plan::SpawnError => {
                return Err(InspectError::Spawn {
                    command: command.line.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "sh"),
                })
            }
            Plan::Signals(emits) => {
                let execution = Execution::new();
                for e in emits {
                    let signal = match e {
                        Emit::Exit(code) => TaskSignal::Exited {
                            execution: execution.id,
                            code,
                        },
                        Emit::CloseTerminal => TaskSignal::TerminalClosed {
                            terminal: execution.terminal,
                        },
                        Emit::ForeignExit(code) => TaskSignal::Exited {
                            execution: Execution::new().id,
                            code: Some(code),
                        },
                        Emit::ForeignClose => TaskSignal::TerminalClosed {
                            terminal: TerminalId::next(),
                        },
                    };
                    let _ = self.tx.send(signal);
                }
                execution
            }
            Plan::Delayed(delay, code) => {
                let execution = Execution::new();
                self.enter(execution.id);
                let tx = self.tx.clone();
                let live = self.live.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    live.lock().unwrap().remove(&execution.id);
                    let _ = tx.send(TaskSignal::Exited {
                        execution: execution.id,
                        code,
                    });
                });
                execution
            }
            Plan::Hang => {
                let execution = Execution::new();
                self.enter(execution.id);
                execution
            }
        };
        let effect = self.effect.lock().unwrap().clone();
        if let Some(f) = effect {
            f();
        }
        Ok(Some(execution))
    }

    async fn terminate(&self, execution: &Execution) -> bool {
        self.terminated.lock().unwrap().push(*execution);
        let Some(delay) = self.shutdown else {
            return true;
        };
        let exited = TaskSignal::Exited {
            execution: execution.id,
            code: None,
        };
        if delay.is_zero() {
            self.live.lock().unwrap().remove(&execution.id);
            let _ = self.tx.send(exited);
            return true;
        }
        let tx = self.tx.clone();
        let live = self.live.clone();
        let id = execution.id;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            live.lock().unwrap().remove(&id);
            let _ = tx.send(exited);
        });
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeFile {
    pub text: String,
    pub diagnostics: Vec<String>,
    pub open_error: bool,
}

impl FakeFile {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn with_diagnostic(mut self, msg: &str) -> Self {
        self.diagnostics.push(msg.to_string());
        self
    }

    pub fn broken() -> Self {
        Self {
            open_error: true,
            ..Self::default()
        }
    }
}

/// Documents keyed by absolute path. `fixed` holds the state each file
/// takes after `apply_fixes`.
#[derive(Default)]
pub struct FakeDocuments {
    files: Mutex<HashMap<PathBuf, FakeFile>>,
    fixed: Mutex<HashMap<PathBuf, FakeFile>>,
    opens: AtomicUsize,
}

impl FakeDocuments {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn insert(&self, path: impl Into<PathBuf>, file: FakeFile) {
        self.files.lock().unwrap().insert(path.into(), file);
    }

    pub fn fixes_to(&self, path: impl Into<PathBuf>, file: FakeFile) {
        self.fixed.lock().unwrap().insert(path.into(), file);
    }

    pub fn apply_fixes(&self) {
        let fixed = self.fixed.lock().unwrap().clone();
        self.files.lock().unwrap().extend(fixed);
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut v: Vec<PathBuf> = self.files.lock().unwrap().keys().cloned().collect();
        v.sort();
        v
    }
}

#[async_trait]
impl DocumentProvider for FakeDocuments {
    async fn open(&self, path: &Path) -> Result<Document> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let file = self.files.lock().unwrap().get(path).cloned();
        match file {
            Some(f) if !f.open_error => Ok(Document {
                uri: path.to_path_buf(),
                text: f.text,
            }),
            _ => Err(InspectError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            }),
        }
    }

    async fn diagnostics(&self, doc: &Document) -> Result<Vec<Diagnostic>> {
        let files = self.files.lock().unwrap();
        Ok(files
            .get(&doc.uri)
            .map(|f| {
                f.diagnostics
                    .iter()
                    .map(|m| Diagnostic { message: m.clone() })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    Focus(PathBuf),
    Close(PathBuf),
}

#[derive(Default)]
pub struct FakeEditor {
    pub events: Mutex<Vec<EditorEvent>>,
}

impl FakeEditor {
    pub fn events(&self) -> Vec<EditorEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Editor for FakeEditor {
    async fn focus(&self, doc: &Document) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(EditorEvent::Focus(doc.uri.clone()));
        Ok(())
    }

    async fn close(&self, doc: &Document) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(EditorEvent::Close(doc.uri.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.messages()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, level: Level, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

/// Discovery over the paths registered in a [`FakeDocuments`].
pub struct FakeDiscovery {
    pub docs: Arc<FakeDocuments>,
}

impl FileDiscovery for FakeDiscovery {
    fn discover(
        &self,
        _root: &Path,
        extensions: &[String],
        exclude_dir: &str,
        limit: usize,
    ) -> Result<Vec<PathBuf>> {
        Ok(self
            .docs
            .paths()
            .into_iter()
            .filter(|p| {
                p.extension()
                    .map(|e| extensions.iter().any(|x| x.as_str() == e.to_string_lossy()))
                    .unwrap_or(false)
            })
            .filter(|p| !p.components().any(|c| c.as_os_str() == exclude_dir))
            .take(limit)
            .collect())
    }
}

pub struct Fakes {
    pub docs: Arc<FakeDocuments>,
    pub editor: Arc<FakeEditor>,
    pub runner: Arc<FakeRunner>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Fakes {
    pub fn new(runner: FakeRunner) -> Self {
        Self {
            docs: Arc::new(FakeDocuments::default()),
            editor: Arc::new(FakeEditor::default()),
            runner: Arc::new(runner),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    /// Like `new`, but every started fix applies the registered fixes.
    pub fn fixing(runner: FakeRunner) -> Self {
        let docs = Arc::new(FakeDocuments::default());
        let hook = docs.clone();
        let runner = runner.with_effect(move || hook.apply_fixes());
        Self {
            docs,
            editor: Arc::new(FakeEditor::default()),
            runner: Arc::new(runner),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn host(&self) -> Host {
        Host {
            documents: self.docs.clone(),
            editor: self.editor.clone(),
            runner: self.runner.clone(),
            notifier: self.notifier.clone(),
            discovery: Arc::new(FakeDiscovery {
                docs: self.docs.clone(),
            }),
        }
    }
}
