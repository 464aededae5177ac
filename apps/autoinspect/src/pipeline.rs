//! Per-file check → fix → re-check → close cycle.

use crate::coordinator::FixTaskCoordinator;
use crate::error::{InspectError, Result};
use crate::host::{DocumentProvider, Editor, Host, Notifier};
use crate::models::fix::FixOutcome;
use crate::models::{CandidateFile, DiagnosticState, Document, Level};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Custom error rules joined into one alternation. An empty rule list
/// never matches.
#[derive(Debug, Clone, Default)]
pub struct CustomErrorMatcher {
    regex: Option<Regex>,
}

impl CustomErrorMatcher {
    pub fn new(rules: &[String]) -> Result<Self> {
        let rules: Vec<&str> = rules
            .iter()
            .map(|r| r.as_str())
            .filter(|r| !r.is_empty())
            .collect();
        if rules.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            regex: Some(Regex::new(&rules.join("|"))?),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }
}

/// How one file left the pipeline.
#[derive(Debug)]
pub enum FileVerdict {
    /// Nothing was flagged; no fix attempted.
    Clean(Document),
    /// Still flagged after the fix attempt; left open for a human.
    StillFlagged {
        document: Document,
        outcome: FixOutcome,
    },
    /// Problems resolved and the document was closed.
    Fixed { outcome: FixOutcome },
    Failed(InspectError),
}

impl FileVerdict {
    /// The document handed back to the caller, if any.
    pub fn into_document(self) -> Option<Document> {
        match self {
            FileVerdict::Clean(d) => Some(d),
            FileVerdict::StillFlagged { document, .. } => Some(document),
            FileVerdict::Fixed { .. } | FileVerdict::Failed(_) => None,
        }
    }
}

pub struct FilePipeline<'a> {
    documents: &'a dyn DocumentProvider,
    editor: &'a dyn Editor,
    notifier: &'a dyn Notifier,
    coordinator: &'a FixTaskCoordinator,
}

impl<'a> FilePipeline<'a> {
    pub fn new(host: &'a Host, coordinator: &'a FixTaskCoordinator) -> Self {
        Self {
            documents: host.documents.as_ref(),
            editor: host.editor.as_ref(),
            notifier: host.notifier.as_ref(),
            coordinator,
        }
    }

    /// Check, fix, and re-check one file. Returns the document when it is
    /// clean or still needs attention, `None` when it was fixed and closed or
    /// could not be processed.
    pub async fn process_file(
        &self,
        file: &CandidateFile,
        matcher: &CustomErrorMatcher,
        cancel: &CancellationToken,
    ) -> Option<Document> {
        self.run(file, matcher, cancel).await.into_document()
    }

    pub async fn run(
        &self,
        file: &CandidateFile,
        matcher: &CustomErrorMatcher,
        cancel: &CancellationToken,
    ) -> FileVerdict {
        match self.try_run(file, matcher, cancel).await {
            Ok(v) => v,
            Err(e) => {
                error!(
                    file = %file.relative,
                    kind = ?e.kind(),
                    error = %e,
                    "file pipeline failed"
                );
                self.notifier.show(
                    Level::Error,
                    &format!("Auto-fix failed for {}: {}", file.relative, e),
                );
                FileVerdict::Failed(e)
            }
        }
    }

    async fn try_run(
        &self,
        file: &CandidateFile,
        matcher: &CustomErrorMatcher,
        cancel: &CancellationToken,
    ) -> Result<FileVerdict> {
        let document = self.documents.open(&file.absolute).await?;
        let before = self.inspect(&document, matcher).await?;
        debug!(file = %file.relative, ?before, "checked");
        if !before.needs_fix() {
            self.notifier
                .show(Level::Info, &format!("Nothing to fix in {}.", file.relative));
            return Ok(FileVerdict::Clean(document));
        }

        self.editor.focus(&document).await?;
        let outcome = self.coordinator.run_fix(cancel).await;

        let document = self.documents.open(&file.absolute).await?;
        let after = self.inspect(&document, matcher).await?;
        debug!(file = %file.relative, ?after, ?outcome, "re-checked");
        if after.needs_fix() {
            self.editor.focus(&document).await?;
            Ok(FileVerdict::StillFlagged { document, outcome })
        } else {
            self.editor.close(&document).await?;
            Ok(FileVerdict::Fixed { outcome })
        }
    }

    async fn inspect(
        &self,
        document: &Document,
        matcher: &CustomErrorMatcher,
    ) -> Result<DiagnosticState> {
        let has_custom_error = matcher.is_match(&document.text);
        let has_diagnostics = !self.documents.diagnostics(document).await?.is_empty();
        Ok(DiagnosticState {
            has_diagnostics,
            has_custom_error,
        })
    }
}
