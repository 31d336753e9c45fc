//! Helios Slice Checker (hsc)
//!
//! Loads a slice property file, builds the distributed configuration,
//! verifies every slice and prints a report.

mod config;
mod report;

use clap::Parser;
use helios_slice::DistributedConfiguration;
use tracing::info;

use crate::config::{CliConfig, OutputFormat};
use crate::report::Report;

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the level given on the command line.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_slice={},hsc={}", level, level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    init_logging(&cli.log_level);

    if let Err(errors) = cli.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(2);
    }

    let properties = cli.load_properties()?;
    info!(
        source = ?cli.properties,
        root = %cli.root,
        properties = properties.len(),
        "Loaded slice properties"
    );

    let config = DistributedConfiguration::builder(properties)
        .root(cli.root.as_str())
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid slice configuration: {}", e))?;

    let report = Report::collect(&config, !cli.no_verify);
    match cli.format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    if report.is_failure() {
        anyhow::bail!("Slice verification failed");
    }
    Ok(())
}
