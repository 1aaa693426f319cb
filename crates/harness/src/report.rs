//! Transcript and report output
//!
//! The transcript goes to stdout so CI logs show it verbatim; diagnostics from
//! `tracing` go to stderr.

use std::path::Path;

use tracing::info;

use crate::error::HarnessResult;
use crate::runner::RunReport;
use crate::scraper::{ResultLine, RunSummary};

const RULE_WIDTH: usize = 50;

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    println!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

pub fn print_run_banner() {
    println!("🧪 Running test suite...");
}

pub fn print_server_started(port: u16) {
    println!("🚀 Test server started on port {}", port);
}

pub fn print_server_stopped() {
    println!("🛑 Test server stopped");
}

/// Echo a classified line exactly as the page reported it
pub fn echo_line(line: &ResultLine) {
    println!("{}", line.text());
}

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "📊 Summary: {} passed, {} failed",
        summary.passed, summary.failed
    );
    if summary.is_success() {
        print_success("All tests passed!");
    } else {
        print_error("Some tests failed");
    }

    let rule = "=".repeat(RULE_WIDTH);
    println!();
    println!("{}", rule);
    println!("📊 FINAL TEST SUMMARY");
    println!("{}", rule);
    println!("Total Tests: {}", summary.total());
    println!("Passed: {}", summary.passed);
    println!("Failed: {}", summary.failed);
    println!("{}", rule);
    println!();
    if summary.is_success() {
        println!("🎉 ALL TESTS PASSED!");
    } else {
        println!("⚠️  {} tests failed", summary.failed);
    }
}

/// Write the run as pretty JSON, creating parent directories as needed.
pub fn write_report(path: &Path, report: &RunReport) -> HarnessResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;

    info!("Report written to: {}", path.display());
    Ok(())
}
