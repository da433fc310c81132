//! One-shot legacy migration entrypoint.
//!
//! `sloth-state-migrate <source-legacy-db> <target-db>`
//!
//! No flag parsing, prompts, or tables — just the two positional paths
//! the migrator needs. The interactive CLI itself is out of scope.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use sloth_state::backend::StateBackend;
use sloth_state::config::StateConfig;
use sloth_state::migrator::Migrator;
use sloth_state::repository::StackRepository;
use sloth_state::store::Store;

fn main() -> ExitCode {
    sloth_state::telemetry::init();

    let mut args = std::env::args_os().skip(1);
    let (source, target) = match (args.next(), args.next()) {
        (Some(source), Some(target)) => (PathBuf::from(source), PathBuf::from(target)),
        _ => {
            eprintln!("usage: sloth-state-migrate <source-legacy-db> <target-db>");
            return ExitCode::FAILURE;
        }
    };

    let config = StateConfig::default().db_path(&target);
    let store = match Store::open(&config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "failed to open target database");
            return ExitCode::FAILURE;
        }
    };
    let repo = Arc::new(StackRepository::new(store));
    let backend = StateBackend::new(repo);

    let report = match Migrator::run(&source, &backend) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "migration failed");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = report.write_next_to(&target) {
        tracing::error!(error = %e, "failed to write migration report");
    }

    println!(
        "migrated {} stacks, {} resources, {} outputs ({} skipped, {} errors) in {}ms",
        report.stacks_migrated,
        report.resources_migrated,
        report.outputs_migrated,
        report.skipped,
        report.errors.len(),
        report.duration_ms,
    );

    if report.errors.is_empty() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
