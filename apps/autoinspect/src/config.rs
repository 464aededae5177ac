//! Configuration discovery and effective settings resolution.
//!
//! autoinspect reads `autoinspect.toml|yaml|yml` from the repository root
//! (or closest ancestor) and merges it with CLI flags into an `Effective`
//! config, which is then validated into a [`ScanConfig`] once per scan.
//! Defaults:
//! - `excludedPatterns`: `[]`
//! - `customErrorRules`: `[]` (matches nothing)
//! - `output`: `human`
//! - `fix.command`: `npm run lint-fix`
//! - `fix.timeoutSecs`: none (wait for the tool indefinitely)
//! - `check.command`: none (no diagnostics besides custom rules)
//! - `scan.extensions`: `ts, tsx, vue, js, css`
//! - `scan.limit`: `1000`
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::{InspectError, Result};
use crate::models::fix::{FixCommand, DEFAULT_FIX_COMMAND};
use crate::pipeline::CustomErrorMatcher;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILES: [&str; 3] = ["autoinspect.toml", "autoinspect.yaml", "autoinspect.yml"];
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["ts", "tsx", "vue", "js", "css"];
pub const DEFAULT_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize, Clone)]
/// `[fix]` section: the external auto-fix command.
pub struct FixCfg {
    pub command: Option<String>,
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// `[check]` section: command producing per-file diagnostics.
pub struct CheckCfg {
    pub command: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// `[scan]` section: discovery settings.
pub struct ScanCfg {
    pub extensions: Option<Vec<String>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `autoinspect.toml|yaml`.
pub struct InspectConfig {
    #[serde(rename = "excludedPatterns")]
    pub excluded_patterns: Option<Vec<String>>,
    #[serde(rename = "customErrorRules")]
    pub custom_error_rules: Option<Vec<String>>,
    pub output: Option<String>,
    #[serde(default)]
    pub fix: Option<FixCfg>,
    #[serde(default)]
    pub check: Option<CheckCfg>,
    #[serde(default)]
    pub scan: Option<ScanCfg>,
}

/// Values passed on the command line; `None`/empty means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub repo_root: Option<String>,
    pub output: Option<String>,
    pub fix_command: Option<String>,
    pub check_command: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Appended to the configured `excludedPatterns`.
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub config_found: bool,
    pub output: String,
    pub excluded_patterns: Vec<String>,
    pub custom_error_rules: Vec<String>,
    pub fix_command: String,
    pub fix_timeout_secs: Option<u64>,
    pub check_command: Option<String>,
    pub extensions: Vec<String>,
    pub limit: usize,
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when an `autoinspect.toml|yaml|yml` or a `.git` directory is found.
/// A relative `start` is taken from the current directory.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_default();
    detect_repo_root_from(&cwd, start)
}

/// Like [`detect_repo_root`], resolving a relative `start` against `cwd`.
pub fn detect_repo_root_from(cwd: &Path, start: &Path) -> PathBuf {
    let joined = cwd.join(start);
    let start = fs::canonicalize(&joined).unwrap_or(joined);
    let mut cur = start.as_path();
    loop {
        if CONFIG_FILES.iter().any(|f| cur.join(f).exists()) || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start,
        }
    }
}

/// Load `InspectConfig` from the first config file present under `root`.
pub fn load_config(root: &Path) -> Result<Option<InspectConfig>> {
    for name in CONFIG_FILES {
        let path = root.join(name);
        if !path.exists() {
            continue;
        }
        let s = fs::read_to_string(&path).map_err(|source| InspectError::ReadConfig {
            path: path.clone(),
            source,
        })?;
        let parsed = if name.ends_with(".toml") {
            toml::from_str::<InspectConfig>(&s).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str::<InspectConfig>(&s).map_err(|e| e.to_string())
        };
        return parsed
            .map(Some)
            .map_err(|message| InspectError::ParseConfig { path, message });
    }
    Ok(None)
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &CliOverrides) -> Result<Effective> {
    let start = PathBuf::from(cli.repo_root.as_deref().unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let loaded = load_config(&repo_root)?;
    let config_found = loaded.is_some();
    let cfg = loaded.unwrap_or_default();

    let output = cli
        .output
        .clone()
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());

    let mut excluded_patterns = cfg.excluded_patterns.unwrap_or_default();
    excluded_patterns.extend(cli.exclude.iter().cloned());

    let fix_command = cli
        .fix_command
        .clone()
        .or_else(|| cfg.fix.as_ref().and_then(|f| f.command.clone()))
        .unwrap_or_else(|| DEFAULT_FIX_COMMAND.to_string());
    let fix_timeout_secs = cli
        .timeout_secs
        .or_else(|| cfg.fix.as_ref().and_then(|f| f.timeout_secs));
    let check_command = cli
        .check_command
        .clone()
        .or_else(|| cfg.check.as_ref().and_then(|c| c.command.clone()))
        .filter(|c| !c.trim().is_empty());

    let extensions = cfg
        .scan
        .as_ref()
        .and_then(|s| s.extensions.clone())
        .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect());
    let limit = cfg
        .scan
        .as_ref()
        .and_then(|s| s.limit)
        .unwrap_or(DEFAULT_LIMIT);

    Ok(Effective {
        repo_root,
        config_found,
        output,
        excluded_patterns,
        custom_error_rules: cfg.custom_error_rules.unwrap_or_default(),
        fix_command,
        fix_timeout_secs,
        check_command,
        extensions,
        limit,
    })
}

/// Validated settings consumed by one scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub excluded_patterns: Vec<String>,
    pub matcher: CustomErrorMatcher,
    pub fix_command: FixCommand,
    pub fix_timeout: Option<Duration>,
    pub extensions: Vec<String>,
    pub limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            excluded_patterns: Vec::new(),
            matcher: CustomErrorMatcher::default(),
            fix_command: FixCommand::default(),
            fix_timeout: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ScanConfig {
    pub fn from_effective(eff: &Effective) -> Result<Self> {
        let command = eff.fix_command.trim();
        if command.is_empty() {
            return Err(InspectError::InvalidConfig("fix.command is empty".into()));
        }
        let extensions: Vec<String> = eff
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if extensions.is_empty() {
            return Err(InspectError::InvalidConfig(
                "scan.extensions must list at least one extension".into(),
            ));
        }
        if eff.limit == 0 {
            return Err(InspectError::InvalidConfig("scan.limit must be positive".into()));
        }
        Ok(Self {
            excluded_patterns: eff.excluded_patterns.clone(),
            matcher: CustomErrorMatcher::new(&eff.custom_error_rules)?,
            fix_command: FixCommand::new(command),
            fix_timeout: eff
                .fix_timeout_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            extensions,
            limit: eff.limit,
        })
    }
}
