//! Scan summary returned by the workspace scanner.

use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub root: PathBuf,
    /// Files returned by discovery before exclusion filtering.
    pub discovered: usize,
    pub excluded: usize,
    /// Files that went through the pipeline.
    pub processed: usize,
    /// Files still flagged after the fix attempt (left open for follow-up).
    pub open: Vec<PathBuf>,
    /// Files whose pipeline failed; not counted as open.
    pub failed: Vec<PathBuf>,
    /// Set when a configuration error stopped the scan before any file ran.
    pub aborted: Option<String>,
}

impl ScanReport {
    pub fn count(&self) -> usize {
        self.open.len()
    }

    pub fn aborted(root: PathBuf, reason: String) -> Self {
        Self {
            root,
            aborted: Some(reason),
            ..Self::default()
        }
    }
}
