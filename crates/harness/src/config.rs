//! Harness configuration

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use crate::report;

/// Configuration for the static file server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory served as `/`
    pub root_dir: PathBuf,

    /// Address to listen on
    pub host: IpAddr,

    /// First port tried by the port probe
    pub preferred_port: u16,

    /// Pause after the listener is up, before `start` returns
    pub settle_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(".."),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            preferred_port: 8000,
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// Configuration for a whole run
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub server: ServerConfig,

    /// Path (and optional query) of the test page, relative to the server root
    pub target_path: String,

    /// Upper bound on the page fetch
    pub fetch_timeout: Duration,

    /// Pause after teardown so the OS can release the port
    pub release_delay: Duration,

    /// Files that must exist in the working directory before anything starts
    pub fixtures: Vec<PathBuf>,

    /// Where to write the JSON run report, if anywhere
    pub report_path: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            target_path: "/testsuite/test-minimal.html".to_string(),
            fetch_timeout: Duration::from_secs(30),
            release_delay: Duration::from_millis(500),
            fixtures: vec![PathBuf::from("test-minimal.html")],
            report_path: None,
        }
    }
}

impl HarnessConfig {
    /// Check that every fixture exists, listing each one on the transcript.
    pub fn verify_fixtures(&self) -> HarnessResult<()> {
        let mut missing = Vec::new();

        for fixture in &self.fixtures {
            if fixture.exists() {
                debug!("Fixture present: {}", fixture.display());
                report::print_success(&fixture.display().to_string());
            } else {
                report::print_error(&format!("{} - MISSING", fixture.display()));
                missing.push(fixture.clone());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::MissingFixture(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.server.preferred_port, 8000);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.target_path, "/testsuite/test-minimal.html");
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.fixtures, vec![PathBuf::from("test-minimal.html")]);
        assert!(config.report_path.is_none());
    }

    #[test]
    fn test_verify_fixtures_reports_all_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("test-minimal.html");
        std::fs::write(&present, "<html></html>").unwrap();
        let absent_a = dir.path().join("tests/math-tests.js");
        let absent_b = dir.path().join("tests/ui-tests.js");

        let config = HarnessConfig {
            fixtures: vec![present, absent_a.clone(), absent_b.clone()],
            ..Default::default()
        };

        match config.verify_fixtures() {
            Err(HarnessError::MissingFixture(missing)) => {
                assert_eq!(missing, vec![absent_a, absent_b]);
            }
            other => panic!("expected MissingFixture, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_fixtures_ok_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("test-minimal.html");
        std::fs::write(&present, "<html></html>").unwrap();

        let config = HarnessConfig {
            fixtures: vec![present],
            ..Default::default()
        };
        assert!(config.verify_fixtures().is_ok());
    }
}
