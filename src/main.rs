//! Integration Trends - command-line entry point

use anyhow::{Context, Result};
use clap::Parser;
use integration_trends::cli::Cli;
use integration_trends::{report, Pipeline};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still wins over the flags
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = cli.analysis_config();
    log::debug!("Configuration: {:?}", config);

    let pipeline = Pipeline::new(config).context("Invalid configuration")?;
    let analysis = pipeline.run().context("Analysis failed")?;

    if cli.json {
        println!("{}", report::render_json(&analysis).context("Failed to serialise report")?);
    } else {
        report::configure_table_format();
        print!("{}", report::render_text(&analysis).context("Failed to render report")?);
    }
    Ok(())
}
