//! Workspace scan: exclusions, discovery, and the per-file fan-out.
//!
//! One scan owns one [`FixTaskCoordinator`] and one child cancellation token.
//! The token is cancelled when the scan finishes or its future is dropped, so
//! an abandoned scan aborts any fix still in flight.

use crate::config::ScanConfig;
use crate::coordinator::FixTaskCoordinator;
use crate::error::{InspectError, Result};
use crate::filter::{self, ExclusionSet};
use crate::host::Host;
use crate::models::report::ScanReport;
use crate::models::{CandidateFile, Level};
use crate::pipeline::{FilePipeline, FileVerdict};
use futures::future::join_all;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Directory skipped during discovery regardless of exclusion rules.
pub const DEPENDENCY_DIR: &str = "node_modules";

/// Read `.gitignore` at `root` and merge it with the configured patterns and
/// the dependency directory rule.
pub async fn build_exclusions(root: &Path, config: &ScanConfig) -> Result<ExclusionSet> {
    let path = root.join(".gitignore");
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(InspectError::MissingGitignore { path })
        }
        Err(source) => return Err(InspectError::ReadConfig { path, source }),
    };
    Ok(ExclusionSet::builder(root)
        .gitignore(&content)
        .patterns(config.excluded_patterns.iter().cloned())
        .dependency_dir()
        .build())
}

/// Split discovered paths into candidates and the number excluded.
pub fn filter_candidates(
    root: &Path,
    paths: &[PathBuf],
    exclusions: &ExclusionSet,
) -> (Vec<CandidateFile>, usize) {
    let candidates: Vec<CandidateFile> = paths
        .par_iter()
        .filter_map(|abs| {
            let rel = pathdiff::diff_paths(abs, root)?;
            let relative = filter::to_slash(&rel);
            if exclusions.is_excluded(&relative) {
                None
            } else {
                Some(CandidateFile {
                    absolute: abs.clone(),
                    relative,
                })
            }
        })
        .collect();
    let excluded = paths.len() - candidates.len();
    (candidates, excluded)
}

pub struct WorkspaceScanner {
    host: Host,
}

impl WorkspaceScanner {
    pub fn new(host: Host) -> Self {
        Self { host }
    }

    /// Scan `root` and drive every flagged file through the fix cycle.
    /// Configuration errors are reported and yield an aborted report.
    pub async fn scan(
        &self,
        root: &Path,
        config: &ScanConfig,
        cancel: &CancellationToken,
    ) -> ScanReport {
        match self.try_scan(root, config, cancel).await {
            Ok(report) => report,
            Err(e) => {
                error!(
                    root = %root.display(),
                    kind = ?e.kind(),
                    error = %e,
                    "scan aborted"
                );
                let message = match &e {
                    InspectError::MissingGitignore { .. } | InspectError::ReadConfig { .. } => {
                        format!("Error reading .gitignore: {}", e)
                    }
                    _ => format!("Scan aborted: {}", e),
                };
                self.host.notifier.show(Level::Error, &message);
                ScanReport::aborted(root.to_path_buf(), e.to_string())
            }
        }
    }

    async fn try_scan(
        &self,
        root: &Path,
        config: &ScanConfig,
        cancel: &CancellationToken,
    ) -> Result<ScanReport> {
        let exclusions = build_exclusions(root, config).await?;
        info!(root = %root.display(), rules = exclusions.len(), "exclusions built");

        let discovered = self.host.discovery.discover(
            root,
            &config.extensions,
            DEPENDENCY_DIR,
            config.limit,
        )?;
        let (candidates, excluded) = filter_candidates(root, &discovered, &exclusions);
        info!(
            discovered = discovered.len(),
            excluded,
            candidates = candidates.len(),
            "candidates filtered"
        );

        let coordinator = FixTaskCoordinator::new(
            self.host.runner.clone(),
            self.host.notifier.clone(),
            config.fix_command.clone(),
            config.fix_timeout,
        );
        let scan_cancel = cancel.child_token();
        let _teardown = scan_cancel.clone().drop_guard();
        let pipeline = FilePipeline::new(&self.host, &coordinator);

        let verdicts = join_all(
            candidates
                .iter()
                .map(|c| pipeline.run(c, &config.matcher, &scan_cancel)),
        )
        .await;

        let mut report = ScanReport {
            root: root.to_path_buf(),
            discovered: discovered.len(),
            excluded,
            processed: candidates.len(),
            ..ScanReport::default()
        };
        for (file, verdict) in candidates.into_iter().zip(verdicts) {
            match verdict {
                FileVerdict::StillFlagged { .. } => report.open.push(file.absolute),
                FileVerdict::Failed(_) => report.failed.push(file.absolute),
                FileVerdict::Clean(_) | FileVerdict::Fixed { .. } => {}
            }
        }
        info!(open = report.count(), failed = report.failed.len(), "scan finished");
        self.host.notifier.show(
            Level::Info,
            &format!("Found {} problematic file(s).", report.count()),
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::pipeline::CustomErrorMatcher;
    use crate::testing::{EditorEvent, Emit, FakeFile, FakeRunner, Fakes, Plan};
    use tempfile::tempdir;

    fn config() -> ScanConfig {
        ScanConfig {
            excluded_patterns: vec!["*.generated.ts".into()],
            ..ScanConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_gitignore_aborts_scan() {
        let dir = tempdir().unwrap();
        let fakes = Fakes::new(FakeRunner::new(vec![]));
        fakes
            .docs
            .insert(dir.path().join("src/a.ts"), FakeFile::text("x").with_diagnostic("e"));
        let report = WorkspaceScanner::new(fakes.host())
            .scan(dir.path(), &config(), &CancellationToken::new())
            .await;
        assert!(report.aborted.is_some());
        assert_eq!(report.count(), 0);
        assert_eq!(fakes.runner.starts(), 0);
        assert!(fakes
            .notifier
            .contains(Level::Error, "Error reading .gitignore"));
    }

    #[tokio::test]
    async fn test_scenario_excludes_and_fixes() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(".gitignore"), "dist\n#comment\n\nbuild/").unwrap();
        let fakes = Fakes::fixing(FakeRunner::new(vec![Plan::Signals(vec![Emit::Exit(
            Some(0),
        )])]));
        fakes
            .docs
            .insert(root.join("dist/app.js"), FakeFile::text("x").with_diagnostic("e"));
        fakes
            .docs
            .insert(root.join("src/app.ts"), FakeFile::text("x").with_diagnostic("e"));
        fakes.docs.fixes_to(root.join("src/app.ts"), FakeFile::text("x;"));

        let report = WorkspaceScanner::new(fakes.host())
            .scan(root, &config(), &CancellationToken::new())
            .await;
        assert!(report.aborted.is_none());
        assert_eq!(report.discovered, 2);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(fakes.runner.starts(), 1);
        assert_eq!(report.count(), 0);
        assert!(fakes
            .editor
            .events()
            .contains(&EditorEvent::Close(root.join("src/app.ts"))));
        assert!(fakes.notifier.contains(Level::Info, "Found 0 problematic file(s)."));
    }

    #[tokio::test]
    async fn test_missing_script_leaves_file_open_and_counted() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(".gitignore"), "").unwrap();
        let fakes = Fakes::new(FakeRunner::new(vec![Plan::NoExecution]));
        fakes
            .docs
            .insert(root.join("src/app.ts"), FakeFile::text("x").with_diagnostic("e"));
        let report = WorkspaceScanner::new(fakes.host())
            .scan(root, &config(), &CancellationToken::new())
            .await;
        assert_eq!(report.open, vec![root.join("src/app.ts")]);
        assert_eq!(report.count(), 1);
        let last = fakes.editor.events().last().cloned();
        assert_eq!(last, Some(EditorEvent::Focus(root.join("src/app.ts"))));
    }

    #[tokio::test]
    async fn test_failing_file_does_not_stop_batch() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(".gitignore"), "node_modules\n").unwrap();
        let fakes = Fakes::new(FakeRunner::new(vec![
            Plan::Signals(vec![Emit::Exit(Some(1))]),
            Plan::Signals(vec![Emit::Exit(Some(1))]),
        ]));
        fakes.docs.insert(root.join("src/broken.ts"), FakeFile::broken());
        fakes
            .docs
            .insert(root.join("src/a.ts"), FakeFile::text("x").with_diagnostic("e"));
        fakes
            .docs
            .insert(root.join("src/b.vue"), FakeFile::text("x").with_diagnostic("e"));
        fakes.docs.insert(root.join("src/clean.css"), FakeFile::text("a{}"));
        fakes.docs.insert(root.join("README.md"), FakeFile::text("# hi"));

        let report = WorkspaceScanner::new(fakes.host())
            .scan(root, &config(), &CancellationToken::new())
            .await;
        assert_eq!(report.discovered, 4);
        assert_eq!(report.processed, 4);
        assert_eq!(report.failed, vec![root.join("src/broken.ts")]);
        assert_eq!(report.count(), 2);
        assert_eq!(fakes.runner.starts(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_scan_starts_nothing() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(".gitignore"), "").unwrap();
        let fakes = Fakes::new(FakeRunner::new(vec![]));
        fakes
            .docs
            .insert(root.join("src/a.ts"), FakeFile::text("x").with_diagnostic("e"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = WorkspaceScanner::new(fakes.host())
            .scan(root, &config(), &cancel)
            .await;
        assert_eq!(fakes.runner.starts(), 0);
        // nothing was fixed, so the file is still flagged
        assert_eq!(report.count(), 1);
    }

    #[tokio::test]
    async fn test_custom_rules_flag_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(".gitignore"), "").unwrap();
        let fakes = Fakes::new(FakeRunner::new(vec![Plan::Signals(vec![Emit::Exit(
            Some(0),
        )])]));
        fakes.docs.insert(root.join("src/a.ts"), FakeFile::text("debugger;"));
        fakes.docs.insert(root.join("src/b.ts"), FakeFile::text("ok"));
        let cfg = ScanConfig {
            matcher: CustomErrorMatcher::new(&["debugger".into()]).unwrap(),
            ..ScanConfig::default()
        };
        let report = WorkspaceScanner::new(fakes.host())
            .scan(root, &cfg, &CancellationToken::new())
            .await;
        assert_eq!(fakes.runner.starts(), 1);
        assert_eq!(report.open, vec![root.join("src/a.ts")]);
    }

    #[test]
    fn test_filter_candidates_relative_paths() {
        let root = PathBuf::from("/w");
        let set = ExclusionSet::builder(&root).patterns(["dist"]).build();
        let paths = vec![
            root.join("dist/a.js"),
            root.join("src/b.ts"),
            root.join("src/deep/c.tsx"),
        ];
        let (candidates, excluded) = filter_candidates(&root, &paths, &set);
        assert_eq!(excluded, 1);
        let rels: Vec<&str> = candidates.iter().map(|c| c.relative.as_str()).collect();
        assert_eq!(rels, vec!["src/b.ts", "src/deep/c.tsx"]);
    }
}
