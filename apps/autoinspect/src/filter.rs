//! Path exclusion from `.gitignore` content and configured patterns.
//!
//! Rules are path prefixes, not globs: a rule's base directory (relative to
//! the workspace root) joined with its pattern yields a prefix, and a path is
//! excluded when it starts with the prefix of any rule. Adjustments applied
//! to each pattern:
//! - a leading `/` or `./` is dropped;
//! - a trailing `/**` becomes the directory prefix `dir/`, and a bare `**`
//!   matches everything;
//! - anything else (including `*` inside the pattern) is taken literally.
//!
//! There is no negation. Matching is a plain string prefix test, so `dist`
//! also excludes `distant.ts`; `dist/` does not.

use std::path::{Path, PathBuf};

/// Exclusion added to every scan for installed dependencies.
pub const DEPENDENCY_DIR_PATTERN: &str = "node_modules/**";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    pub base: PathBuf,
    pub pattern: String,
}

impl IgnoreRule {
    pub fn new(base: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            pattern: pattern.into(),
        }
    }

    /// Root-relative prefix this rule excludes.
    pub fn prefix(&self, root: &Path) -> String {
        let rel_base = pathdiff::diff_paths(&self.base, root).unwrap_or_default();
        let base = to_slash(&rel_base);
        let base = base.trim_start_matches("./").trim_end_matches('/');
        let pat = normalize_pattern(&self.pattern);
        if base.is_empty() || base == "." {
            pat
        } else {
            format!("{}/{}", base, pat)
        }
    }
}

fn normalize_pattern(pattern: &str) -> String {
    let p = pattern.trim();
    let p = p.strip_prefix("./").unwrap_or(p);
    let p = p.strip_prefix('/').unwrap_or(p);
    if p == "**" {
        String::new()
    } else if let Some(dir) = p.strip_suffix("/**") {
        format!("{}/", dir)
    } else {
        p.to_string()
    }
}

/// Convert a path to a `/`-separated string.
pub fn to_slash(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}

/// Lines of `.gitignore` content that carry a pattern: trimmed, non-blank,
/// and not starting with `#`.
pub fn parse_gitignore(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Immutable set of ignore rules for one scan.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    rules: Vec<IgnoreRule>,
    prefixes: Vec<String>,
}

impl ExclusionSet {
    pub fn builder(root: impl Into<PathBuf>) -> ExclusionSetBuilder {
        ExclusionSetBuilder {
            root: root.into(),
            rules: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Whether `relative_path` (relative to the workspace root) is excluded.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.matching_rule(relative_path).is_some()
    }

    /// First rule whose prefix covers `relative_path`, with that prefix.
    pub fn matching_rule(&self, relative_path: &str) -> Option<(&IgnoreRule, &str)> {
        let path = relative_path.replace('\\', "/");
        let path = path.strip_prefix("./").unwrap_or(&path);
        self.rules
            .iter()
            .zip(self.prefixes.iter())
            .find(|(_, prefix)| path.starts_with(prefix.as_str()))
            .map(|(rule, prefix)| (rule, prefix.as_str()))
    }
}

/// Collects rules before freezing them into an [`ExclusionSet`].
#[derive(Debug)]
pub struct ExclusionSetBuilder {
    root: PathBuf,
    rules: Vec<IgnoreRule>,
}

impl ExclusionSetBuilder {
    pub fn rule(mut self, rule: IgnoreRule) -> Self {
        if !rule.pattern.trim().trim_start_matches('/').is_empty() {
            self.rules.push(rule);
        }
        self
    }

    /// Add a root-based rule per pattern.
    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for p in patterns {
            let rule = IgnoreRule::new(self.root.clone(), p);
            self = self.rule(rule);
        }
        self
    }

    pub fn gitignore(self, content: &str) -> Self {
        self.patterns(parse_gitignore(content))
    }

    pub fn dependency_dir(self) -> Self {
        self.patterns([DEPENDENCY_DIR_PATTERN])
    }

    pub fn build(self) -> ExclusionSet {
        let prefixes = self.rules.iter().map(|r| r.prefix(&self.root)).collect();
        ExclusionSet {
            rules: self.rules,
            prefixes,
        }
    }
}
