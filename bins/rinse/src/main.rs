use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncReadExt;

use rinse_config_hcl::HclParser;
use rinse_engine::config::{RinseConfig, TomlParser};
use rinse_engine::driver::ResultSet;
use rinse_engine::error::EngineError;
use rinse_engine::{CollectionOptions, Engine};

#[derive(Parser)]
#[command(name = "rinse", about = "Sanitize driver result sets into plain JSON records")]
struct Cli {
    /// Path to configuration file (.toml or .hcl). Built-in defaults when omitted.
    #[arg(long, env = "RINSE_CONFIG")]
    config: Option<String>,

    /// JSON result set to sanitize, `-` for stdin.
    #[arg(long, default_value = "-")]
    input: String,

    /// Input is an array of positional rows rather than named records.
    #[arg(long)]
    positional: bool,

    /// Records per batch (overrides config).
    #[arg(long)]
    batch_size: Option<usize>,

    /// Process batches concurrently: `--parallel true|false` (overrides config).
    #[arg(long)]
    parallel: Option<bool>,

    /// Log the metrics snapshot when done.
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let engine = match Engine::new(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "failed to start engine");
            std::process::exit(1);
        }
    };

    let result_set = match read_input(&cli.input).await {
        Ok(rs) => rs,
        Err(e) => {
            tracing::error!(input = %cli.input, error = %e, "failed to read input");
            std::process::exit(1);
        }
    };
    let (graph, root) = result_set.into_parts();

    let records = if cli.positional {
        engine.positional_to_records(&graph, &root, None)
    } else {
        engine.sanitize_collection(Arc::new(graph), &root, None, collection_options(&cli)).await
    };

    match serde_json::to_string_pretty(&records) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize output");
            std::process::exit(1);
        }
    }

    if cli.metrics {
        let snapshot = engine.metrics();
        match serde_json::to_string(&snapshot) {
            Ok(json) => tracing::info!(metrics = %json, "run complete"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize metrics"),
        }
    }
}

/// Overrides taken from the command line; unset flags defer to the config.
fn collection_options(cli: &Cli) -> CollectionOptions {
    CollectionOptions {
        batch_size: cli.batch_size,
        parallel: cli.parallel,
    }
}

fn load_config(path: Option<&str>) -> Result<RinseConfig, EngineError> {
    let Some(path) = path else {
        tracing::info!("no config given, using built-in article mapping");
        return Ok(RinseConfig::default());
    };
    tracing::info!(config = %path, "loading configuration");
    RinseConfig::load_with(path, &[&TomlParser, &HclParser])
}

async fn read_input(input: &str) -> Result<ResultSet, EngineError> {
    let content = if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(input).await?
    };
    ResultSet::parse_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(args: &[&str]) -> CollectionOptions {
        let cli = Cli::try_parse_from(std::iter::once("rinse").chain(args.iter().copied())).unwrap();
        collection_options(&cli)
    }

    #[test]
    fn parallel_flag_overrides_config_both_ways() {
        assert_eq!(options(&["--parallel", "true"]).parallel, Some(true));
        assert_eq!(options(&["--parallel", "false"]).parallel, Some(false));
        assert_eq!(options(&[]).parallel, None);
    }

    #[test]
    fn batch_size_passes_through() {
        assert_eq!(options(&["--batch-size", "25"]).batch_size, Some(25));
        assert_eq!(options(&[]).batch_size, None);
    }

    #[test]
    fn parallel_needs_a_value() {
        assert!(Cli::try_parse_from(["rinse", "--parallel", "maybe"]).is_err());
    }
}
