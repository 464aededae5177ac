//! autoinspect core library.
//!
//! Scans a workspace for source files that carry diagnostics or match custom
//! error rules, and drives each one through an external auto-fix command.
//!
//! High-level modules:
//! - `filter`: `.gitignore`-style exclusion rules and prefix matching.
//! - `coordinator`: serialized fix runs settled by the first of exit or
//!   terminal-closed.
//! - `pipeline`: per-file check, fix, re-check, close.
//! - `scan`: discovery, filtering, and the concurrent per-file fan-out.
//! - `host`: traits for documents, editor, task runner, notifier, discovery.
//! - `runner`, `workspace`: process and filesystem implementations of `host`.
//! - `config`, `cli`, `output`, `telemetry`: the command-line surface.
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod filter;
pub mod host;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod runner;
pub mod scan;
pub mod telemetry;
pub mod workspace;

#[cfg(test)]
mod testing;
