//! # probate-scraper
//!
//! Scrapes probate case records from a frame-heavy county record portal.
//! A run logs in as guest, searches a filing-date range, walks every result
//! page and detail view, and hands the records to a [`RecordStore`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use probate_scraper::{Config, DirectoryStore, Runner};
//!
//! # #[tokio::main]
//! # async fn main() -> probate_scraper::Result<()> {
//! let config = Config::load("configs/delaware.yaml")?;
//! let mut store = DirectoryStore::new(&config.output.dir);
//! let runner = Runner::launch(&config.browser).await?;
//! let report = runner.run(&config, &mut store).await?;
//! println!("Records: {}", report.records_found);
//! runner.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod criteria;
mod debug;
pub mod driver;
pub mod extract;
mod frames;
mod navigation;
mod retry;
mod runner;
mod session;
mod walker;

pub use config::{
    BrowserConfig, Config, DecedentFields, FieldSpec, OutputConfig, PageJump,
    RepresentativeRules, RetryConfig, SearchConfig, SiteProfile, TimingConfig, Viewport,
    WalkConfig,
};
pub use criteria::SearchCriteria;
pub use debug::DebugSink;
pub use driver::{FrameHandle, PageDriver, Target};
pub use extract::RecordExtractor;
pub use frames::{FrameLocatorPath, FrameMatch, FrameResolver};
pub use navigation::{NavState, NavigationController};
pub use probate_records::{
    CaseIds, CaseRecord, DecedentInfo, DirectoryStore, MemoryStore, RecordStore, Representative,
};
pub use retry::RetryPolicy;
pub use runner::{scrape, RunReport, Runner};
pub use session::Session;
pub use walker::{ResultPageWalker, StopReason, WalkOutcome};

/// Result type for probate-scraper operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or driving a scrape.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("frame not found: {0}")]
    FrameNotFound(String),

    #[error("frame detached: {0}")]
    FrameDetached(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("terms not accepted: {0}")]
    TermsNotAccepted(String),

    #[error("search could not be opened: {0}")]
    SearchOpenFailed(String),

    #[error("search criteria not entered: {0}")]
    CriteriaEntryFailed(String),

    #[error("could not return to results: {0}")]
    BackNavigationFailed(String),

    #[error("could not advance results page: {0}")]
    PageNavigationFailed(String),

    #[error("{operation} called in state {actual}, expected {expected}")]
    OutOfOrder {
        operation: &'static str,
        expected: NavState,
        actual: NavState,
    },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("store error: {0}")]
    Store(#[from] probate_records::Error),
}

impl Error {
    /// Whether another attempt at the same step may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::FrameNotFound(_)
                | Error::FrameDetached(_)
                | Error::ElementNotFound(_)
                | Error::Timeout(_)
        )
    }
}
