//! CLI argument parsing via `clap`.

use crate::config::CliOverrides;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "autoinspect",
    version,
    about = "Find files with problems and run the project's auto-fix on them",
    long_about = "autoinspect scans a workspace for source files that carry diagnostics or match custom error rules, runs the project's lint-fix command once per flagged file, and reports what is still broken.\n\nConfiguration precedence: CLI > autoinspect.toml > defaults.",
    after_help = "Examples:\n  autoinspect scan\n  autoinspect scan --check-command 'npx eslint' --output json\n  autoinspect check-ignore dist/app.js src/app.ts",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[arg(long, short, global = true, action = clap::ArgAction::SetTrue, help = "Log progress (info level)")]
    pub verbose: bool,
    #[arg(long, global = true, action = clap::ArgAction::SetTrue, help = "Emit logs as JSON lines on stderr")]
    pub log_json: bool,
    #[arg(long, short, global = true, action = clap::ArgAction::SetTrue, help = "Only show warnings and errors")]
    pub quiet: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current autoinspect version.")]
    Version,
    /// Scan the workspace and auto-fix flagged files
    #[command(
        about = "Scan and auto-fix",
        long_about = "Discover candidate files, skip excluded ones, and run the fix command for each file with diagnostics or custom-rule hits. Fix runs never overlap.",
        after_help = "Examples:\n  autoinspect scan --timeout 120\n  autoinspect scan --fix-command 'pnpm run lint-fix' --exclude '*.gen.ts'"
    )]
    Scan {
        #[arg(long, help = "Repository root (default: detected from current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Fix command (default: npm run lint-fix)")]
        fix_command: Option<String>,
        #[arg(long, help = "Per-file check command producing diagnostics")]
        check_command: Option<String>,
        #[arg(long, value_name = "SECS", help = "Stop a fix run after SECS seconds (0 = no limit)")]
        timeout: Option<u64>,
        #[arg(long, value_name = "PATTERN", help = "Extra exclusion pattern (repeatable)")]
        exclude: Vec<String>,
    },
    /// Explain whether paths are excluded
    #[command(
        about = "Show which paths are excluded",
        long_about = "For each PATH (relative to the repository root) print whether it is excluded and which prefix excludes it."
    )]
    CheckIgnore {
        #[arg(required = true)]
        paths: Vec<String>,
        #[arg(long, help = "Repository root (default: detected from current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, value_name = "PATTERN", help = "Extra exclusion pattern (repeatable)")]
        exclude: Vec<String>,
    },
}

impl Commands {
    /// Flags that override configuration file values.
    pub fn overrides(&self) -> CliOverrides {
        match self {
            Commands::Version => CliOverrides::default(),
            Commands::Scan {
                repo_root,
                output,
                fix_command,
                check_command,
                timeout,
                exclude,
            } => CliOverrides {
                repo_root: repo_root.clone(),
                output: output.clone(),
                fix_command: fix_command.clone(),
                check_command: check_command.clone(),
                timeout_secs: *timeout,
                exclude: exclude.clone(),
            },
            Commands::CheckIgnore {
                repo_root,
                output,
                exclude,
                ..
            } => CliOverrides {
                repo_root: repo_root.clone(),
                output: output.clone(),
                exclude: exclude.clone(),
                ..CliOverrides::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_flags_map_to_overrides() {
        let cli = Cli::try_parse_from([
            "autoinspect",
            "scan",
            "--timeout",
            "30",
            "--exclude",
            "dist",
            "--exclude",
            "*.gen.ts",
            "--fix-command",
            "yarn lint-fix",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let o = cli.cmd.overrides();
        assert_eq!(o.timeout_secs, Some(30));
        assert_eq!(o.exclude, vec!["dist", "*.gen.ts"]);
        assert_eq!(o.fix_command.as_deref(), Some("yarn lint-fix"));
        assert!(o.check_command.is_none());
    }

    #[test]
    fn test_check_ignore_requires_paths() {
        assert!(Cli::try_parse_from(["autoinspect", "check-ignore"]).is_err());
        let cli = Cli::try_parse_from(["autoinspect", "check-ignore", "a.ts", "b/c.ts"]).unwrap();
        match cli.cmd {
            Commands::CheckIgnore { paths, .. } => assert_eq!(paths, vec!["a.ts", "b/c.ts"]),
            _ => panic!("expected check-ignore"),
        }
    }
}
