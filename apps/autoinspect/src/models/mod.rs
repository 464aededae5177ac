//! Shared data models for documents, fix invocations, and scan reports.

pub mod fix;
pub mod report;

use std::path::PathBuf;

/// An opened source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub uri: PathBuf,
    pub text: String,
}

/// A problem reported against a document by the diagnostics provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
}

/// A workspace file that survived discovery and exclusion filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub absolute: PathBuf,
    /// Path relative to the workspace root, always `/`-separated.
    pub relative: String,
}

/// Problem flags computed for one document at check time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticState {
    pub has_diagnostics: bool,
    pub has_custom_error: bool,
}

impl DiagnosticState {
    pub fn needs_fix(&self) -> bool {
        self.has_diagnostics || self.has_custom_error
    }
}

/// Severity of a user-facing notification, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Error,
}
