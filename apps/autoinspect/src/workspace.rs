//! Filesystem-backed documents, discovery, and a console editor.

use crate::error::{InspectError, Result};
use crate::host::{DocumentProvider, Editor, FileDiscovery, Notifier};
use crate::models::{Diagnostic, Document, Level};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

const CHECK_PERMITS: usize = 4;

/// Reads documents from disk. Diagnostics come from an optional check
/// command run per file as `sh -c '<cmd> "$1"' sh <file>`: a failing run
/// yields one diagnostic per non-empty stdout line (or a single generic one
/// when stdout is empty).
pub struct FsDocuments {
    root: PathBuf,
    check_command: Option<String>,
    permits: Semaphore,
}

impl FsDocuments {
    pub fn new(root: impl Into<PathBuf>, check_command: Option<String>) -> Self {
        Self {
            root: root.into(),
            check_command,
            permits: Semaphore::new(CHECK_PERMITS),
        }
    }
}

#[async_trait]
impl DocumentProvider for FsDocuments {
    async fn open(&self, path: &Path) -> Result<Document> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| InspectError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Document {
            uri: path.to_path_buf(),
            text,
        })
    }

    async fn diagnostics(&self, doc: &Document) -> Result<Vec<Diagnostic>> {
        let Some(cmd) = self.check_command.as_ref() else {
            return Ok(Vec::new());
        };
        let fail = |message: String| InspectError::Diagnostics {
            path: doc.uri.clone(),
            message,
        };
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let output = Command::new("sh")
            .arg("-c")
            .arg(format!("{} \"$1\"", cmd))
            .arg("sh")
            .arg(&doc.uri)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| fail(format!("check command failed to run: {}", e)))?;
        if output.status.success() {
            return Ok(Vec::new());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut diags: Vec<Diagnostic> = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| Diagnostic {
                message: l.to_string(),
            })
            .collect();
        if diags.is_empty() {
            diags.push(Diagnostic {
                message: format!(
                    "check exited with {}",
                    output
                        .status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "a signal".to_string())
                ),
            });
        }
        debug!(file = %doc.uri.display(), count = diags.len(), "diagnostics");
        Ok(diags)
    }
}

/// Tracks which documents are open and reports focus/close through the
/// notifier.
pub struct ConsoleEditor {
    notifier: Arc<dyn Notifier>,
    open: Mutex<BTreeSet<PathBuf>>,
}

impl ConsoleEditor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            open: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn open_documents(&self) -> Vec<PathBuf> {
        self.open
            .lock()
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn editor_error(doc: &Document) -> InspectError {
        InspectError::Editor {
            path: doc.uri.clone(),
            message: "editor state poisoned".into(),
        }
    }
}

#[async_trait]
impl Editor for ConsoleEditor {
    async fn focus(&self, doc: &Document) -> Result<()> {
        let newly = self
            .open
            .lock()
            .map_err(|_| Self::editor_error(doc))?
            .insert(doc.uri.clone());
        if newly {
            self.notifier
                .show(Level::Info, &format!("Opened {}", doc.uri.display()));
        }
        Ok(())
    }

    async fn close(&self, doc: &Document) -> Result<()> {
        self.open
            .lock()
            .map_err(|_| Self::editor_error(doc))?
            .remove(&doc.uri);
        self.notifier
            .show(Level::Info, &format!("Closed {}", doc.uri.display()));
        Ok(())
    }
}

/// Visit every file below `root` without descending into directories named
/// `exclude_dir`. Returns how many directories were read.
fn walk_files(
    root: &Path,
    exclude_dir: &str,
    on_file: &mut dyn FnMut(PathBuf),
) -> Result<usize> {
    let mut read = 0;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir == root => {
                return Err(InspectError::Discovery(format!(
                    "cannot read {}: {}",
                    root.display(),
                    e
                )))
            }
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        read += 1;
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if file_type.is_dir() {
                if entry.file_name() != exclude_dir {
                    pending.push(path);
                }
            } else if path.is_file() {
                on_file(path);
            }
        }
    }
    Ok(read)
}

/// Discovery by file-name pattern: one `*.<ext>` per extension, matched
/// while walking the tree so the dependency directory is never entered.
pub struct GlobDiscovery;

impl FileDiscovery for GlobDiscovery {
    fn discover(
        &self,
        root: &Path,
        extensions: &[String],
        exclude_dir: &str,
        limit: usize,
    ) -> Result<Vec<PathBuf>> {
        let patterns = extensions
            .iter()
            .map(|ext| glob::Pattern::new(&format!("*.{}", glob::Pattern::escape(ext))))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| InspectError::Discovery(e.to_string()))?;

        let mut found = Vec::new();
        let dirs = walk_files(root, exclude_dir, &mut |path| {
            let matched = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| patterns.iter().any(|p| p.matches(&n)));
            if matched {
                found.push(path);
            }
        })?;
        debug!(root = %root.display(), dirs, files = found.len(), "discovery walk done");
        found.sort();
        found.truncate(limit);
        Ok(found)
    }
}
