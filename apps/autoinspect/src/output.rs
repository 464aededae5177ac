//! Console rendering for notifications and scan results.
//!
//! Supports `human` (default) and `json` outputs. Notifications always go to
//! stderr so JSON on stdout stays machine-readable.

use crate::host::Notifier;
use crate::models::report::ScanReport;
use crate::models::Level;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

pub fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

pub fn level_prefix(level: Level, color: bool) -> String {
    let (icon, tag) = match level {
        Level::Error => ("✖", "⟦error⟧"),
        Level::Warning => ("▲", "⟦warn⟧"),
        Level::Info => ("◆", "⟦info⟧"),
    };
    if !color {
        return format!("{} {}", icon, tag);
    }
    match level {
        Level::Error => format!("{} {}", icon.red(), tag.red().bold()),
        Level::Warning => format!("{} {}", icon.yellow(), tag.yellow().bold()),
        Level::Info => format!("{} {}", icon.blue(), tag.blue().bold()),
    }
}

/// Prints notifications at or above `min_level` to stderr.
pub struct ConsoleNotifier {
    color: bool,
    min_level: Level,
}

impl ConsoleNotifier {
    pub fn new(color: bool, min_level: Level) -> Self {
        Self { color, min_level }
    }
}

impl Notifier for ConsoleNotifier {
    fn show(&self, level: Level, message: &str) {
        tracing::debug!(?level, message, "notification");
        if level >= self.min_level {
            eprintln!("{} {}", level_prefix(level, self.color), message);
        }
    }
}

/// Print the scan report in the requested format.
pub fn print_report(report: &ScanReport, output: &str) {
    match output {
        "json" => match serde_json::to_string_pretty(&compose_report_json(report)) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("{} {}", level_prefix(Level::Error, false), e),
        },
        _ => {
            let color = use_colors(output);
            if let Some(reason) = &report.aborted {
                println!("{} scan aborted: {}", level_prefix(Level::Error, color), reason);
                return;
            }
            for p in &report.open {
                let shown = display_path(report, p);
                if color {
                    println!("{} {}", "📝 needs attention:".yellow().bold(), shown.bold());
                } else {
                    println!("📝 needs attention: {}", shown);
                }
            }
            for p in &report.failed {
                let shown = display_path(report, p);
                if color {
                    println!("{} {}", "✖ failed:".red().bold(), shown);
                } else {
                    println!("✖ failed: {}", shown);
                }
            }
            let summary = format!(
                "— Summary — open={} failed={} processed={} excluded={} discovered={}",
                report.count(),
                report.failed.len(),
                report.processed,
                report.excluded,
                report.discovered
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

fn display_path(report: &ScanReport, p: &std::path::Path) -> String {
    p.strip_prefix(&report.root)
        .unwrap_or(p)
        .to_string_lossy()
        .to_string()
}

/// Compose the report JSON object (pure) for testing purposes.
pub fn compose_report_json(report: &ScanReport) -> JsonVal {
    let rel = |ps: &[std::path::PathBuf]| -> Vec<String> {
        ps.iter().map(|p| display_path(report, p)).collect()
    };
    json!({
        "root": report.root.to_string_lossy(),
        "open": rel(&report.open),
        "failed": rel(&report.failed),
        "aborted": report.aborted,
        "summary": {
            "count": report.count(),
            "failed": report.failed.len(),
            "processed": report.processed,
            "excluded": report.excluded,
            "discovered": report.discovered,
        },
    })
}

/// Print one `check-ignore` result line.
pub fn print_ignore_match(path: &str, matched: Option<&str>, output: &str) {
    match output {
        "json" => println!(
            "{}",
            json!({ "path": path, "excluded": matched.is_some(), "prefix": matched })
        ),
        _ => {
            let color = use_colors(output);
            match matched {
                Some(prefix) if color => {
                    println!("{} {} (prefix {})", "excluded".red().bold(), path, prefix)
                }
                Some(prefix) => println!("excluded {} (prefix {})", path, prefix),
                None if color => println!("{} {}", "included".green().bold(), path),
                None => println!("included {}", path),
            }
        }
    }
}
