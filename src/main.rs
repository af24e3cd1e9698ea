use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use presswire::{Config, Pipeline};

/// Get the config directory path (~/.config/presswire/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("presswire"))
}

#[derive(Parser, Debug)]
#[command(
    name = "presswire",
    about = "Fetch car-maker newsroom feeds and print localized news records as JSON"
)]
struct Args {
    /// Config file (default: ~/.config/presswire/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum published records per source
    #[arg(long, value_name = "N")]
    per_source_limit: Option<usize>,

    /// Maximum records in the output
    #[arg(long, value_name = "N")]
    total_limit: Option<usize>,

    /// Sources processed concurrently
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Also write the cycle report to stderr as JSON
    #[arg(long)]
    report: bool,

    /// Print the resolved source registry and exit without fetching
    #[arg(long)]
    list_sources: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(n) = self.per_source_limit {
            config.per_source_limit = n;
        }
        if let Some(n) = self.total_limit {
            config.total_limit = n;
        }
        if let Some(n) = self.workers {
            config.workers = n;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = secs;
        }
    }
}

fn write_json<T: serde::Serialize>(mut out: impl Write, value: &T, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut out, value)?;
    } else {
        serde_json::to_writer(&mut out, value)?;
    }
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    args.apply(&mut config);

    let pipeline = Pipeline::new(&config).context("Failed to build HTTP client")?;

    if args.list_sources {
        return write_json(std::io::stdout().lock(), &pipeline.sources(), args.pretty);
    }

    let output = pipeline.run().await;

    if args.report {
        write_json(std::io::stderr().lock(), &output.report, args.pretty)
            .context("Failed to write cycle report")?;
    }
    write_json(std::io::stdout().lock(), &output.records, args.pretty)
        .context("Failed to write records")?;

    Ok(())
}
