//! pagerun harness
//!
//! Serves a directory of static files, fetches a test page that reports its
//! results as markup, and turns that markup into a pass/fail verdict:
//! - Serves the root directory on an ephemeral port with a linear port probe
//! - Fetches the target page once, with a timeout
//! - Scrapes outcome lines out of the results container
//! - Tears the server down on every exit path
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run_report()                                               │
//! │    ├── StaticFileServer::start(port) -> ServerHandle        │
//! │    ├── fetch_page(url, timeout) -> html                     │
//! │    ├── ResultScraper::scrape(html) -> [ResultLine]          │
//! │    ├── RunSummary::from_lines(..) -> summary                │
//! │    └── ServerHandle::stop()          (always)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Results markup                                             │
//! │    <div id="results">                                       │
//! │      <div>✅ PASS: ...</div>                                │
//! │      <div>❌ FAIL: ...</div> | <div>💥 ERROR: ...</div>      │
//! │      <div>Testing: ...</div>                                │
//! │    </div>                                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod scraper;
pub mod server;

pub use config::{HarnessConfig, ServerConfig};
pub use error::{HarnessError, HarnessResult};
pub use runner::{Orchestrator, RunFailure, RunReport, RunState};
pub use scraper::{OutcomeStatus, ResultLine, ResultScraper, RunSummary, TestOutcome};
pub use server::{ServerHandle, StaticFileServer};
