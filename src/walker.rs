//! Walking the result list: every row's detail view, then the next page.

use crate::config::{TimingConfig, WalkConfig};
use crate::driver::{self, FrameHandle, Target};
use crate::extract::RecordExtractor;
use crate::frames::FrameLocatorPath;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::{Error, Result};
use probate_records::CaseRecord;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Why a walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// No row link showed up on the current page.
    NoRows,
    /// The next-page control did not lead to a new page.
    NoMorePages,
    /// `walk.max_pages` pages were walked.
    PageBound,
    /// `walk.max_records` records were collected.
    RecordBudget,
    /// The detail view could not be left.
    BackNavigationFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::NoRows => write!(f, "no rows"),
            StopReason::NoMorePages => write!(f, "no more pages"),
            StopReason::PageBound => write!(f, "page bound reached"),
            StopReason::RecordBudget => write!(f, "record budget reached"),
            StopReason::BackNavigationFailed(e) => write!(f, "back navigation failed: {}", e),
        }
    }
}

/// Records of a walk and how it went.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub records: Vec<CaseRecord>,
    pub pages_visited: usize,
    pub rows_visited: usize,
    pub rows_missed: usize,
    pub stop: StopReason,
}

impl WalkOutcome {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            pages_visited: 0,
            rows_visited: 0,
            rows_missed: 0,
            stop: StopReason::NoRows,
        }
    }
}

/// Visits every row of every result page, in order.
///
/// Must start with the result list loaded. Failed rows are counted and
/// skipped; only a detail view that cannot be left ends the walk early.
pub struct ResultPageWalker<'a> {
    session: Session<'a>,
    config: &'a WalkConfig,
    back: RetryPolicy,
}

impl<'a> ResultPageWalker<'a> {
    pub fn new(session: Session<'a>, config: &'a WalkConfig, back: RetryPolicy) -> Self {
        Self {
            session,
            config,
            back,
        }
    }

    fn ms(&self, value: u64) -> Duration {
        TimingConfig::ms(value)
    }

    pub async fn walk(&self) -> WalkOutcome {
        let mut out = WalkOutcome::new();
        let mut page = 1;
        loop {
            if let Some(stop) = self.walk_page(page, &mut out).await {
                out.stop = stop;
                break;
            }
            if self.budget_reached(&out) {
                out.stop = StopReason::RecordBudget;
                break;
            }
            if page >= self.config.max_pages {
                info!("Page bound {} reached", self.config.max_pages);
                out.stop = StopReason::PageBound;
                break;
            }
            match self.next_page(page).await {
                Ok(()) => page += 1,
                Err(e) => {
                    info!("No more pages after page {}: {}", page, e);
                    out.stop = StopReason::NoMorePages;
                    break;
                }
            }
        }

        info!(
            "Walk finished ({}): {} records from {} rows on {} pages, {} rows missed",
            out.stop,
            out.records.len(),
            out.rows_visited,
            out.pages_visited,
            out.rows_missed
        );
        out
    }

    fn budget_reached(&self, out: &WalkOutcome) -> bool {
        self.config
            .max_records
            .is_some_and(|max| out.records.len() >= max)
    }

    /// Walk the rows of one page. `Some` ends the whole walk.
    async fn walk_page(&self, page: usize, out: &mut WalkOutcome) -> Option<StopReason> {
        let rows = match self.wait_for_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                info!("No result rows on page {}: {}", page, e);
                return Some(StopReason::NoRows);
            }
        };
        out.pages_visited += 1;
        info!("Page {}: {} row links", page, rows);

        let mut misses = 0;
        for index in 0..self.config.row_budget {
            if self.budget_reached(out) {
                info!("Record budget reached at {} records", out.records.len());
                return Some(StopReason::RecordBudget);
            }

            if let Err(e) = self.open_row(index).await {
                misses += 1;
                out.rows_missed += 1;
                debug!("Row {} of page {} not opened: {}", index, page, e);
                if let Err(e) = self.recover().await {
                    return Some(self.back_failed(e).await);
                }
                if misses >= self.config.miss_limit {
                    info!(
                        "{} consecutive rows missed, leaving page {}",
                        misses, page
                    );
                    break;
                }
                continue;
            }
            misses = 0;

            let records = self.extract_row().await;
            info!(
                "Row {} of page {}: {} records",
                index,
                page,
                records.len()
            );
            out.rows_visited += 1;
            out.records.extend(records);

            if let Err(e) = self.back_to_results().await {
                return Some(self.back_failed(e).await);
            }
        }
        None
    }

    async fn back_failed(&self, e: Error) -> StopReason {
        let s = self.session;
        error!("Could not return to results: {}", e);
        s.debug.dump(s.driver, "back_failed").await;
        StopReason::BackNavigationFailed(e.to_string())
    }

    fn list_frames(&self) -> [FrameLocatorPath; 2] {
        let site = self.session.site;
        [
            site.results_list_frame.clone(),
            site.results_list_fallback_frame.clone(),
        ]
    }

    /// Number of row links once at least one is present.
    async fn wait_for_rows(&self) -> Result<usize> {
        let s = self.session;
        let frames = s.frames();
        let frame = match frames
            .wait_for_element(
                &s.site.results_list_frame,
                &s.site.row_link_selector,
                self.ms(s.timing.row_timeout_ms),
            )
            .await
        {
            Ok(frame) => frame,
            Err(e) => {
                debug!("{}; trying fallback result list", e);
                frames
                    .wait_for_element(
                        &s.site.results_list_fallback_frame,
                        &s.site.row_link_selector,
                        Duration::ZERO,
                    )
                    .await?
            }
        };
        s.driver.count(&frame, &s.site.row_link_selector).await
    }

    /// Click row `index` and wait for its detail view.
    async fn open_row(&self, index: usize) -> Result<FrameHandle> {
        let s = self.session;
        let frames = s.frames();
        let list = frames
            .resolve_any(&self.list_frames(), self.ms(s.timing.frame_timeout_ms))
            .await?;
        let targets = [
            Target::css(s.site.row_link(index)),
            Target::Nth {
                css: s.site.row_link_fallback.clone(),
                index,
            },
        ];
        driver::click_required(s.driver, &list, &targets).await?;

        match frames
            .resolve_loaded(&s.site.doc_info_frame, self.ms(s.timing.detail_timeout_ms))
            .await
        {
            Ok(frame) => Ok(frame),
            Err(e) => {
                debug!("{}; trying fallback document frame", e);
                frames
                    .resolve_loaded(&s.site.doc_info_fallback_frame, Duration::ZERO)
                    .await
            }
        }
    }

    async fn extract_row(&self) -> Vec<CaseRecord> {
        let extractor = RecordExtractor::new(self.session);
        let info = extractor.extract_decedent_info().await;
        let reps = extractor.extract_representatives().await;
        let ids = extractor.case_ids().await;
        CaseRecord::expand(&info, &ids, &reps)
    }

    /// After a miss, leave a half-opened detail view.
    async fn recover(&self) -> Result<()> {
        let s = self.session;
        let frames = s.driver.frames().await?;
        if frames.iter().any(|f| f.url.contains(&s.site.detail_fragment)) {
            debug!("Detail view open after a miss, going back");
            return self.back_to_results().await;
        }
        Ok(())
    }

    /// Return from a detail view to the result list.
    pub async fn back_to_results(&self) -> Result<()> {
        let this = self;
        let result = this
            .back
            .run("back to results", move |_| this.try_back_to_results())
            .await;
        result.map_err(|e| Error::BackNavigationFailed(e.to_string()))
    }

    async fn try_back_to_results(&self) -> Result<()> {
        let s = self.session;
        let frames = s.frames();
        if self.results_showing().await {
            return Ok(());
        }

        let nav = frames
            .resolve_any(&s.site.back_frames, self.ms(s.timing.frame_timeout_ms))
            .await?;
        driver::click_required(s.driver, &nav, &s.site.back_to_results).await?;
        frames
            .resolve_by_url_fragment(
                None,
                &s.site.results_fragment,
                self.ms(s.timing.back_timeout_ms),
            )
            .await?;
        debug!("Back on result list");
        s.settle().await;
        Ok(())
    }

    async fn results_showing(&self) -> bool {
        let s = self.session;
        match s.driver.frames().await {
            Ok(frames) => frames
                .iter()
                .any(|f| f.url.contains(&s.site.results_fragment)),
            Err(_) => false,
        }
    }

    async fn first_row_text(&self, timeout: Duration) -> Option<String> {
        let s = self.session;
        let list = s
            .frames()
            .resolve_any(&self.list_frames(), timeout)
            .await
            .ok()?;
        let first = Target::css(s.site.row_link_selector.as_str());
        s.driver.text_of(&list, &first).await.ok().flatten()
    }

    /// Move from `page` to the following page.
    async fn next_page(&self, page: usize) -> Result<()> {
        let s = self.session;
        let before = self
            .first_row_text(self.ms(s.timing.frame_timeout_ms))
            .await;
        let pager = s
            .frames()
            .resolve_any(&s.site.pager_frames, self.ms(s.timing.frame_timeout_ms))
            .await
            .map_err(|e| Error::PageNavigationFailed(e.to_string()))?;

        let jumped = match &s.site.page_jump {
            Some(jump) => {
                let target = page + 1;
                s.driver.fill(&pager, &jump.input, &target.to_string()).await?
                    && s.driver
                        .invoke(&pager, &jump.function, &[json!(target)])
                        .await?
            }
            None => false,
        };
        if !jumped {
            driver::click_required(s.driver, &pager, &s.site.next_page)
                .await
                .map_err(|e| Error::PageNavigationFailed(e.to_string()))?;
        }
        s.settle().await;

        let deadline = Instant::now() + self.ms(s.timing.results_timeout_ms);
        loop {
            match self.first_row_text(Duration::ZERO).await {
                Some(text) if before.as_deref() != Some(text.as_str()) => {
                    info!("Advanced to page {}", page + 1);
                    return Ok(());
                }
                _ => {}
            }
            if Instant::now() >= deadline {
                warn!("First row unchanged after paging from page {}", page);
                return Err(Error::PageNavigationFailed(format!(
                    "first row unchanged after page {}",
                    page
                )));
            }
            sleep(s.timing.poll_interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::NoMorePages.to_string(), "no more pages");
        assert_eq!(
            StopReason::BackNavigationFailed("x".into()).to_string(),
            "back navigation failed: x"
        );
    }

    #[test]
    fn test_new_outcome_is_empty() {
        let out = WalkOutcome::new();
        assert!(out.records.is_empty());
        assert_eq!(out.pages_visited, 0);
        assert_eq!(out.stop, StopReason::NoRows);
    }
}
