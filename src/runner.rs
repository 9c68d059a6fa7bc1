use crate::config::{BrowserConfig, Config};
use crate::criteria::SearchCriteria;
use crate::debug::DebugSink;
use crate::driver::{EokaDriver, PageDriver};
use crate::navigation::NavigationController;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::walker::{ResultPageWalker, StopReason};
use crate::{Error, Result};
use eoka::{Browser, Page};
use probate_records::RecordStore;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of one scrape.
#[derive(Debug)]
pub struct RunReport {
    /// Whether the run reached the result list and exported.
    pub success: bool,
    /// Error message if failed.
    pub error: Option<String>,
    /// Date range that was searched.
    pub criteria: SearchCriteria,
    /// Records collected by the walk.
    pub records_found: usize,
    /// Records new to the store.
    pub added: usize,
    pub pages_visited: usize,
    /// Why the walk ended; `None` when it never started.
    pub stop: Option<StopReason>,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    fn new(criteria: SearchCriteria) -> Self {
        Self {
            success: false,
            error: None,
            criteria,
            records_found: 0,
            added: 0,
            pages_visited: 0,
            stop: None,
            duration_ms: 0,
        }
    }
}

/// Search range of this run: the configured range, moved forward to the
/// latest persisted filing date when resuming.
pub fn resolve_criteria(config: &Config, store: &dyn RecordStore) -> Result<SearchCriteria> {
    let configured = config
        .search
        .from
        .as_deref()
        .map(SearchCriteria::parse_date)
        .transpose()?;
    let latest = if config.search.resume {
        store.latest_filing_date()?
    } else {
        None
    };
    if let Some(latest) = latest {
        info!("Latest persisted filing date: {}", latest);
    }
    let to = match config.search.to.as_deref() {
        Some(to) => SearchCriteria::parse_date(to)?,
        None => chrono::Local::now().date_naive(),
    };
    // A cursor past the end of the window does not apply to it.
    let latest = match (configured, latest) {
        (Some(_), Some(latest)) if latest > to => {
            info!("Persisted filing date {} is after {}, not resuming", latest, to);
            None
        }
        (None, Some(latest)) if latest > to => Some(to),
        (_, latest) => latest,
    };

    let from = match (configured, latest) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => {
            return Err(Error::Config(
                "search.from is required when nothing has been persisted".into(),
            ))
        }
    };
    SearchCriteria::from_dates(from, to)
}

/// One scrape on an open tab: log in, search, walk every page and persist
/// whatever was collected.
///
/// Navigation failures end the run with `success == false`; they are not
/// returned as `Err`. `Err` is reserved for config and store errors.
pub async fn scrape(
    driver: &dyn PageDriver,
    config: &Config,
    store: &mut dyn RecordStore,
) -> Result<RunReport> {
    let start = Instant::now();
    let criteria = resolve_criteria(config, store)?;
    info!("Searching filing dates {}", criteria);

    let debug = match &config.output.debug_dir {
        Some(dir) => DebugSink::new(dir, config.output.screenshots),
        None => DebugSink::disabled(),
    };
    let session = Session::new(driver, &config.site, &config.timing, &debug);
    let mut report = RunReport::new(criteria);

    let mut nav = NavigationController::new(session, RetryPolicy::steps(&config.retry));
    match navigate(&mut nav, &criteria).await {
        Ok(true) => {}
        Ok(false) => {
            report.error = Some("search could not be submitted".into());
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        }
        Err(e) => {
            error!("Navigation failed in state {}: {}", nav.state(), e);
            report.error = Some(e.to_string());
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        }
    }

    match nav.await_results().await {
        Ok(frame) => debug!("Result list in {}", frame),
        Err(Error::FrameNotFound(e)) => {
            info!("No results for {} ({})", criteria, e);
            report.success = true;
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        }
        Err(e) => {
            report.error = Some(e.to_string());
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        }
    }

    let walker = ResultPageWalker::new(session, &config.walk, RetryPolicy::back(&config.retry));
    let outcome = walker.walk().await;
    report.records_found = outcome.records.len();
    report.pages_visited = outcome.pages_visited;

    if outcome.records.is_empty() {
        info!("No records to persist");
    } else {
        let summary = store.persist(&outcome.records)?;
        info!(
            "Persisted {} new records ({} total, {} months)",
            summary.added,
            summary.total,
            summary.months.len()
        );
        report.added = summary.added;
    }

    if let StopReason::BackNavigationFailed(ref e) = outcome.stop {
        warn!("Walk ended early, {} records kept", report.records_found);
        report.error = Some(format!("back navigation failed: {}", e));
    } else {
        report.success = true;
    }
    report.stop = Some(outcome.stop);
    report.duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

async fn navigate(nav: &mut NavigationController<'_>, criteria: &SearchCriteria) -> Result<bool> {
    nav.login().await?;
    nav.accept_terms().await?;
    nav.open_search().await?;
    nav.enter_criteria(criteria).await?;
    nav.submit_search().await
}

/// Owns the browser for a scrape.
pub struct Runner {
    browser: Browser,
    page: Page,
}

impl Runner {
    /// Launch a browser with `config`.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
            viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, config.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self { browser, page })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Run one scrape of `config` into `store`.
    pub async fn run(&self, config: &Config, store: &mut impl RecordStore) -> Result<RunReport> {
        let driver = EokaDriver::new(&self.page);
        scrape(&driver, config, store).await
    }

    /// Close the browser.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}
