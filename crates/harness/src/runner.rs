//! Run orchestration: serve, fetch, scrape, summarize, tear down

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::report;
use crate::scraper::{ResultLine, ResultScraper, RunSummary, TestOutcome};
use crate::server::{ServerHandle, StaticFileServer};

/// Where a run is in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    ServerStarting,
    Fetching,
    Parsing,
    Summarizing,
    Stopped,
}

/// A harness error, tagged with the state it interrupted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub stage: RunState,
    pub message: String,
}

/// Everything one run produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub success: bool,
    pub summary: Option<RunSummary>,
    pub outcomes: Vec<TestOutcome>,
    pub failure: Option<RunFailure>,
    pub bound_port: Option<u16>,
}

impl RunReport {
    fn finish(mut self) -> Self {
        self.success =
            self.failure.is_none() && self.summary.is_some_and(|summary| summary.is_success());
        self
    }
}

/// Drives one end-to-end run against a freshly started server
pub struct Orchestrator {
    config: HarnessConfig,
    server: StaticFileServer,
    scraper: ResultScraper,
}

impl Orchestrator {
    pub fn new(config: HarnessConfig) -> Self {
        let server = StaticFileServer::new(config.server.clone());
        Self {
            config,
            server,
            scraper: ResultScraper::new(),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run once; `true` only when results were read and nothing failed.
    pub async fn run(&self) -> bool {
        self.run_report().await.success
    }

    /// Run once and keep the details.
    pub async fn run_report(&self) -> RunReport {
        let mut report = RunReport::default();
        let mut state = RunState::Idle;

        report::print_run_banner();

        transition(&mut state, RunState::ServerStarting);
        match self.server.start(self.server.config().preferred_port).await {
            Ok(mut handle) => {
                report.bound_port = Some(handle.bound_port());

                if let Err(e) = self.drive(&handle, &mut state, &mut report).await {
                    report.failure = Some(fail(state, &e));
                }

                handle.stop().await;
            }
            Err(e) => {
                report.failure = Some(fail(state, &e));
            }
        }
        transition(&mut state, RunState::Stopped);

        if !self.config.release_delay.is_zero() {
            tokio::time::sleep(self.config.release_delay).await;
        }

        let report = report.finish();
        info!(
            "Run finished: success={} summary={:?}",
            report.success, report.summary
        );
        report
    }

    async fn drive(
        &self,
        handle: &ServerHandle,
        state: &mut RunState,
        report: &mut RunReport,
    ) -> HarnessResult<()> {
        transition(state, RunState::Fetching);
        let url = target_url(&handle.base_url(), &self.config.target_path);
        report::print_info(&format!("Fetching {}", url));
        let html = fetch_page(&url, self.config.fetch_timeout).await?;

        transition(state, RunState::Parsing);
        let lines = self.scraper.scrape(&html)?;

        transition(state, RunState::Summarizing);
        for line in &lines {
            report::echo_line(line);
        }
        let summary = RunSummary::from_lines(&lines);
        report::print_summary(&summary);

        report.outcomes = lines
            .into_iter()
            .filter_map(|line| match line {
                ResultLine::Outcome(outcome) => Some(outcome),
                ResultLine::Progress(_) => None,
            })
            .collect();
        report.summary = Some(summary);

        Ok(())
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!("Run state: {:?} -> {:?}", state, next);
    *state = next;
}

/// Record and print a harness error so it reads differently from failed tests.
fn fail(stage: RunState, e: &HarnessError) -> RunFailure {
    error!("Run failed while {:?}: {}", stage, e);

    match (stage, e) {
        (RunState::Parsing, HarnessError::MalformedResults(_)) => {
            report::print_error("Could not find test results in HTML");
        }
        (RunState::Fetching, e) if e.is_timeout() => {
            report::print_error(&format!("Timed out fetching test results: {}", e));
        }
        (RunState::Fetching, e) => {
            report::print_error(&format!("Error fetching test results: {}", e));
        }
        (_, e) => {
            println!("💥 Test runner failed: {}", e);
        }
    }

    RunFailure {
        stage,
        message: e.to_string(),
    }
}

fn target_url(base_url: &str, target_path: &str) -> String {
    format!("{}/{}", base_url, target_path.trim_start_matches('/'))
}

/// GET `url` once. Transport errors, timeouts and non-2xx statuses all fail.
pub async fn fetch_page(url: &str, timeout: Duration) -> HarnessResult<String> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(HarnessError::FetchStatus {
            url: url.to_string(),
            status,
        });
    }

    Ok(response.text().await?)
}
