//! pagerun CLI - Main Entry Point
//!
//! Serves the test tree, fetches the test page once and exits 0 only when
//! every reported test passed.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use pagerun_harness::{report, HarnessConfig, Orchestrator, ServerConfig};

/// Run a browser test page and gate on the results it reports
#[derive(Parser, Debug)]
#[command(name = "pagerun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory served as the HTTP root
    #[arg(long, env = "PAGERUN_ROOT", default_value = "..")]
    root: PathBuf,

    /// Address to listen on
    #[arg(long, env = "PAGERUN_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Preferred port; the next free port above it is used on conflict
    #[arg(long, env = "PAGERUN_PORT", default_value = "8000")]
    port: u16,

    /// Path of the test page under the root (may carry a query string)
    #[arg(long, env = "PAGERUN_TARGET", default_value = "/testsuite/test-minimal.html")]
    target: String,

    /// Files that must exist in the working directory before starting
    #[arg(
        long = "fixture",
        env = "PAGERUN_FIXTURES",
        value_delimiter = ',',
        default_value = "test-minimal.html"
    )]
    fixtures: Vec<PathBuf>,

    /// Timeout for fetching the test page
    #[arg(long, env = "PAGERUN_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Pause after the server starts listening
    #[arg(long, env = "PAGERUN_SETTLE_MS", default_value = "1000")]
    settle_ms: u64,

    /// Pause after teardown so the port is released
    #[arg(long, env = "PAGERUN_RELEASE_MS", default_value = "500")]
    release_ms: u64,

    /// Write a JSON report of the run to this path
    #[arg(long, env = "PAGERUN_REPORT")]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> HarnessConfig {
        HarnessConfig {
            server: ServerConfig {
                root_dir: self.root,
                host: self.host,
                preferred_port: self.port,
                settle_delay: Duration::from_millis(self.settle_ms),
            },
            target_path: self.target,
            fetch_timeout: Duration::from_secs(self.timeout_secs),
            release_delay: Duration::from_millis(self.release_ms),
            fixtures: self.fixtures,
            report_path: self.report,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the test transcript.
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.into_config()).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            report::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

async fn run(config: HarnessConfig) -> anyhow::Result<bool> {
    debug!("Configuration: {:?}", config);

    if let Err(e) = config.verify_fixtures() {
        report::print_error("Test files not found. Please run from the testsuite directory.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(config);
    let run_report = orchestrator.run_report().await;

    if let Some(path) = &orchestrator.config().report_path {
        report::write_report(path, &run_report)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    Ok(run_report.success)
}
