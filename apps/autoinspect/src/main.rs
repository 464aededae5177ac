//! autoinspect CLI binary entry point.
//! Wires the process/filesystem host into the scanner and prints results.

use anyhow::Context;
use autoinspect::cli::{Cli, Commands};
use autoinspect::config::{self, ScanConfig};
use autoinspect::host::{Host, Notifier};
use autoinspect::models::Level;
use autoinspect::output::{self, ConsoleNotifier};
use autoinspect::runner::ProcessTaskRunner;
use autoinspect::scan::{self, WorkspaceScanner};
use autoinspect::telemetry;
use autoinspect::workspace::{ConsoleEditor, FsDocuments, GlobDiscovery};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const EXIT_OPEN: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json, telemetry::default_level(cli.verbose));

    if let Commands::Version = cli.cmd {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!(
                "{} {:#}",
                output::level_prefix(Level::Error, output::use_colors("human")),
                e
            );
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let eff = config::resolve_effective(&cli.cmd.overrides())
        .context("failed to resolve configuration")?;
    let scan_config = ScanConfig::from_effective(&eff).context("invalid configuration")?;
    let color = output::use_colors(&eff.output);
    if !eff.config_found && eff.output != "json" {
        eprintln!(
            "{} No autoinspect.toml found; using defaults.",
            output::level_prefix(Level::Info, color)
        );
    }

    match &cli.cmd {
        Commands::Version => Ok(ExitCode::SUCCESS),
        Commands::CheckIgnore { paths, .. } => {
            let exclusions = scan::build_exclusions(&eff.repo_root, &scan_config).await?;
            for p in paths {
                let matched = exclusions.matching_rule(p).map(|(_, prefix)| prefix);
                output::print_ignore_match(p, matched, &eff.output);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Scan { .. } => {
            let min_level = if cli.quiet { Level::Warning } else { Level::Info };
            let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new(color, min_level));
            let host = Host {
                documents: Arc::new(FsDocuments::new(
                    &eff.repo_root,
                    eff.check_command.clone(),
                )),
                editor: Arc::new(ConsoleEditor::new(notifier.clone())),
                runner: Arc::new(ProcessTaskRunner::new(&eff.repo_root)),
                notifier,
                discovery: Arc::new(GlobDiscovery),
            };

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted; no further fixes will start");
                    on_interrupt.cancel();
                }
            });

            let report = WorkspaceScanner::new(host)
                .scan(&eff.repo_root, &scan_config, &cancel)
                .await;
            output::print_report(&report, &eff.output);
            if report.aborted.is_some() {
                Ok(ExitCode::from(EXIT_CONFIG))
            } else if report.count() > 0 {
                Ok(ExitCode::from(EXIT_OPEN))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}
