//! Retrieve a log from a simulated utility service.
//!
//! Exercises the full job/driver stack without hardware:
//! `utility-sim --length 1000 --format csv --out log.csv`

use anyhow::{Context, Result};
use calliope_utility::utility::{ChannelSink, Format, JobDriver, LogJob, SimulatedDevice};
use calliope_utility::UtilityConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    HeaderedHtml,
    Html,
    Csv,
}

impl From<FormatArg> for Format {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::HeaderedHtml => Format::HeaderedHtml,
            FormatArg::Html => Format::PlainHtml,
            FormatArg::Csv => Format::Csv,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "utility-sim", version, about = "Retrieve a log from a simulated device")]
struct Cli {
    /// Size of the simulated log in bytes
    #[arg(long, default_value_t = 1000)]
    length: u32,

    /// Output format requested from the device
    #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
    format: FormatArg,

    /// Job identifier written into every request
    #[arg(long, default_value_t = 0x10)]
    job_id: u8,

    /// TOML file with engine settings
    #[arg(long, env = "UTILITY_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Write the retrieved log here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Log every request and response
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => UtilityConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => UtilityConfig::default(),
    };

    // Deterministic printable content so the output is easy to eyeball
    let log: Vec<u8> = (0..cli.length)
        .map(|i| b"0123456789abcdef\n"[(i % 17) as usize])
        .collect();

    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (resp_tx, resp_rx) = mpsc::channel(64);
    let device = SimulatedDevice::with_config(log, &config);
    let device = tokio::spawn(device.serve(req_rx, resp_tx));

    let job = Box::new(LogJob::with_config(cli.job_id, cli.format.into(), &config));
    let mut driver = JobDriver::new(job, ChannelSink::new(req_tx), resp_rx, &config);
    let result = driver.run().await.context("Log retrieval failed")?;
    drop(driver);

    let device = device.await.context("Simulated device task failed")?;
    tracing::info!(
        "Retrieved {} bytes in {} requests",
        result.len(),
        device.requests().len()
    );

    match &cli.out {
        Some(path) => tokio::fs::write(path, &result)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&result).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}
