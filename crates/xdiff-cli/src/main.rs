//! `xdiff` command line driver

mod args;
mod logging;
mod snapshot;

use anyhow::Context;
use clap::ArgMatches;
use std::sync::Arc;
use xdiff_core::{DifferConfig, MutationDiffer, RunSummary};

use crate::logging::Verbosity;
use crate::snapshot::SnapshotConnector;

#[tokio::main]
async fn main() {
    let matches = args::command().get_matches();
    logging::init(
        Verbosity::from_flags(matches.get_flag("verbose"), matches.get_flag("quiet")),
        matches.get_flag("log-json"),
    );

    let outcome = match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("check-config", args)) => check_config(args),
        _ => Ok(()),
    };

    if let Err(e) = outcome {
        tracing::error!(error = %e, "xdiff failed");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: &ArgMatches) -> anyhow::Result<()> {
    let config = args::resolve_config(args)?;
    let differ = MutationDiffer::new(config, Arc::new(SnapshotConnector))?;
    let summary = differ.run().await.context("mutation differ run failed")?;
    print_summary(&summary);
    Ok(())
}

fn check_config(args: &ArgMatches) -> anyhow::Result<()> {
    let config = args::resolve_config(args)?;
    config.validate()?;
    println!("{}", render_config(&config)?);
    Ok(())
}

fn render_config(config: &DifferConfig) -> anyhow::Result<String> {
    let mut shown = config.clone();
    for endpoint in [&mut shown.source, &mut shown.target] {
        if !endpoint.password.is_empty() {
            endpoint.password = "<redacted>".to_string();
        }
    }
    toml::to_string_pretty(&shown).context("failed to render configuration")
}

fn print_summary(summary: &RunSummary) {
    println!("Mutation Diff Summary:");
    println!("  Keys: {}", summary.total_keys);
    println!("  Processed: {}", summary.keys_processed);
    println!("  Missing From Source: {}", summary.missing_from_source());
    println!("  Missing From Target: {}", summary.missing_from_target());
    println!("  Mismatched: {}", summary.mismatched());
    println!("  Keys With Errors: {}", summary.keys_with_errors);
    for path in &summary.output.written {
        println!("  Wrote: {}", path.display());
    }
    for (artifact, error) in &summary.output.failures {
        println!("  Failed to write {artifact}: {error}");
    }
}
