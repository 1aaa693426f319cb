//! End-to-end runs of the orchestrator against a temporary test tree

use std::path::{Path, PathBuf};
use std::time::Duration;

use pagerun_harness::{
    report, HarnessConfig, Orchestrator, OutcomeStatus, RunState, RunSummary, ServerConfig,
};
use tempfile::TempDir;

const TARGET: &str = "/testsuite/test-minimal.html";

/// A root with the test page at `TARGET` containing `body`
fn create_tree(body: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("testsuite")).unwrap();
    std::fs::write(dir.path().join("testsuite/test-minimal.html"), body).unwrap();
    dir
}

fn config_for(root: &Path) -> HarnessConfig {
    HarnessConfig {
        server: ServerConfig {
            root_dir: root.to_path_buf(),
            preferred_port: 0,
            settle_delay: Duration::ZERO,
            ..Default::default()
        },
        target_path: TARGET.to_string(),
        fetch_timeout: Duration::from_secs(5),
        release_delay: Duration::ZERO,
        fixtures: vec![],
        report_path: None,
    }
}

/// Occupy a loopback port whose successor is currently free
fn occupy_port_before_free_one() -> (std::net::TcpListener, u16) {
    for _ in 0..32 {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = occupied.local_addr().unwrap().port();
        let Some(next) = taken.checked_add(1) else {
            continue;
        };
        if std::net::TcpListener::bind(("127.0.0.1", next)).is_ok() {
            return (occupied, taken);
        }
    }
    panic!("no loopback port with a free successor");
}

fn assert_port_closed(port: Option<u16>) {
    let port = port.expect("server was started");
    assert!(
        std::net::TcpStream::connect(("127.0.0.1", port)).is_err(),
        "port {} still accepting after the run",
        port
    );
}

#[tokio::test]
async fn failing_test_fails_run() {
    let dir = create_tree(
        r#"<div id="results"><div>✅ PASS: a</div><div>✅ PASS: b</div><div>❌ FAIL: c</div></div>"#,
    );
    let orchestrator = Orchestrator::new(config_for(dir.path()));

    let report = orchestrator.run_report().await;
    assert_eq!(report.summary, Some(RunSummary { passed: 2, failed: 1 }));
    assert!(report.failure.is_none());
    assert!(!report.success);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.outcomes[2].status, OutcomeStatus::Fail);
    assert_eq!(report.outcomes[2].message, "❌ FAIL: c");
    assert_port_closed(report.bound_port);

    assert!(!orchestrator.run().await);
}

#[tokio::test]
async fn empty_results_pass() {
    let dir = create_tree(r#"<html><body><div id="results"></div></body></html>"#);
    let orchestrator = Orchestrator::new(config_for(dir.path()));

    let report = orchestrator.run_report().await;
    assert_eq!(report.summary, Some(RunSummary::default()));
    assert!(report.success);
    assert_port_closed(report.bound_port);

    assert!(orchestrator.run().await);
}

#[tokio::test]
async fn errors_count_as_failures() {
    let dir = create_tree(
        "<div id=\"results\">\n<div>Testing: combat</div>\n<div>✅ PASS: a</div>\n<div>💥 ERROR: boom</div>\n<div>All tests completed</div>\n</div>",
    );
    let report = Orchestrator::new(config_for(dir.path())).run_report().await;

    assert_eq!(report.summary, Some(RunSummary { passed: 1, failed: 1 }));
    assert_eq!(report.outcomes[1].status, OutcomeStatus::Error);
    assert!(!report.success);
}

#[tokio::test]
async fn fetch_failure_still_tears_down() {
    let dir = create_tree(r#"<div id="results"></div>"#);
    let mut config = config_for(dir.path());
    config.target_path = "/testsuite/missing.html".to_string();

    let report = Orchestrator::new(config).run_report().await;
    assert!(!report.success);
    assert!(report.summary.is_none());
    let failure = report.failure.as_ref().expect("fetch failure recorded");
    assert_eq!(failure.stage, RunState::Fetching);
    assert!(failure.message.contains("404"), "{}", failure.message);
    assert_port_closed(report.bound_port);
}

#[tokio::test]
async fn parse_failure_still_tears_down() {
    let dir = create_tree("<html><body><p>The page never rendered results.</p></body></html>");

    let report = Orchestrator::new(config_for(dir.path())).run_report().await;
    assert!(!report.success);
    assert!(report.summary.is_none());
    let failure = report.failure.as_ref().expect("parse failure recorded");
    assert_eq!(failure.stage, RunState::Parsing);
    assert!(failure.message.starts_with("Malformed results"));
    assert_port_closed(report.bound_port);
}

#[tokio::test]
async fn start_failure_skips_fetch() {
    let dir = create_tree(r#"<div id="results"></div>"#);
    let config = config_for(&dir.path().join("does-not-exist"));

    let report = Orchestrator::new(config).run_report().await;
    assert!(!report.success);
    assert!(report.bound_port.is_none());
    assert_eq!(
        report.failure.map(|f| f.stage),
        Some(RunState::ServerStarting)
    );
}

#[tokio::test]
async fn occupied_preferred_port_moves_up() {
    let dir = create_tree(r#"<div id="results"><div>✅ PASS: only</div></div>"#);
    let (occupied, taken) = occupy_port_before_free_one();

    let mut config = config_for(dir.path());
    config.server.preferred_port = taken;

    let report = Orchestrator::new(config).run_report().await;
    assert!(report.success);
    assert_eq!(report.bound_port, Some(taken + 1));
    drop(occupied);
}

#[tokio::test]
async fn report_is_written_as_json() {
    let dir = create_tree(
        r#"<div id="results"><div>✅ PASS: a</div><div>❌ FAIL: b</div></div>"#,
    );
    let run_report = Orchestrator::new(config_for(dir.path())).run_report().await;

    let path: PathBuf = dir.path().join("out/nested/report.json");
    report::write_report(&path, &run_report).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["summary"]["passed"], 1);
    assert_eq!(json["summary"]["failed"], 1);
    assert_eq!(json["outcomes"][1]["status"], "fail");
    assert_eq!(json["outcomes"][1]["message"], "❌ FAIL: b");
    assert!(json["failure"].is_null());
}
