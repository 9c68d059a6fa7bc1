//! Reading one case out of the detail view.
//!
//! The extractor never fails a row: a field that cannot be read is left
//! empty and logged.

pub mod parse;

use crate::config::TimingConfig;
use crate::driver::{self, FrameHandle, Target};
use crate::session::Session;
use crate::{Error, Result};
use probate_records::{CaseIds, DecedentInfo, Representative};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

pub struct RecordExtractor<'a> {
    session: Session<'a>,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(session: Session<'a>) -> Self {
        Self { session }
    }

    /// Switch to the decedent tab and read its fields, polling until the
    /// filing date shows up.
    pub async fn extract_decedent_info(&self) -> DecedentInfo {
        let s = self.session;
        if !self.activate_tab(&s.site.decedent_tab).await {
            debug!("Decedent tab not switched, reading the current view");
        }

        let deadline = Instant::now() + TimingConfig::ms(s.timing.field_timeout_ms);
        let mut info = DecedentInfo::default();
        loop {
            match self.doc_info_html().await {
                Ok(html) => {
                    info = parse::parse_decedent(&html, &s.site.decedent);
                    if !info.filing_date.is_empty() {
                        return info;
                    }
                }
                Err(e) => debug!("Document info not readable yet: {}", e),
            }
            if Instant::now() >= deadline {
                warn!("Filing date never appeared, keeping partial decedent info");
                return info;
            }
            sleep(TimingConfig::ms(s.timing.field_poll_ms)).await;
        }
    }

    /// Switch to the representatives tab and read its rows. A case without
    /// representative rows yields an empty list.
    pub async fn extract_representatives(&self) -> Vec<Representative> {
        let s = self.session;
        if !self.activate_tab(&s.site.representatives_tab).await {
            warn!("Representatives tab not found");
            return Vec::new();
        }

        let rules = &s.site.representatives;
        let deadline = Instant::now() + TimingConfig::ms(s.timing.tab_timeout_ms);
        loop {
            match self.doc_info_html().await {
                Ok(html) if parse::has_match(&html, &rules.row_selector) => {
                    let reps = parse::parse_representatives(&html, rules);
                    debug!("Found {} representatives", reps.len());
                    return reps;
                }
                Ok(_) => {}
                Err(e) => debug!("Representatives not readable yet: {}", e),
            }
            if Instant::now() >= deadline {
                info!("No representative rows");
                return Vec::new();
            }
            sleep(s.timing.poll_interval()).await;
        }
    }

    /// Case ids from the URL of the detail frame.
    pub async fn case_ids(&self) -> CaseIds {
        let s = self.session;
        let frame = match s
            .frames()
            .resolve_any(
                &[
                    s.site.detail_frame.clone(),
                    s.site.detail_fallback_frame.clone(),
                ],
                TimingConfig::ms(s.timing.frame_timeout_ms),
            )
            .await
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!("No detail frame for case ids: {}", e);
                return CaseIds::default();
            }
        };
        let ids = parse::parse_case_ids(&frame.url, &s.site.case_id_param, &s.site.case_num_param);
        if ids.case_file_id.is_empty() {
            warn!("No {} in {}", s.site.case_id_param, frame.url);
        }
        ids
    }

    /// One look at the document-info frame.
    async fn doc_info_html(&self) -> Result<String> {
        let s = self.session;
        let frame = s
            .frames()
            .resolve_any(
                &[
                    s.site.doc_info_frame.clone(),
                    s.site.doc_info_fallback_frame.clone(),
                ],
                Duration::ZERO,
            )
            .await?;
        s.driver.frame_html(&frame).await
    }

    async fn tabs_frame(&self) -> Result<FrameHandle> {
        let s = self.session;
        let frames = s.frames();
        match frames
            .wait_for_element(
                &s.site.tabs_frame,
                &s.site.tab_list_selector,
                TimingConfig::ms(s.timing.tab_timeout_ms),
            )
            .await
        {
            Ok(frame) => Ok(frame),
            Err(e) => {
                debug!("{}; trying fallback tabs frame", e);
                frames
                    .wait_for_element(
                        &s.site.tabs_fallback_frame,
                        &s.site.tab_list_selector,
                        Duration::ZERO,
                    )
                    .await
            }
        }
    }

    /// Click the first tab whose caption matches one of `captions`.
    async fn activate_tab(&self, captions: &[String]) -> bool {
        let s = self.session;
        let frame = match self.tabs_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!("No tab bar: {}", e);
                return false;
            }
        };

        for caption in captions {
            let targets = [
                Target::Text {
                    css: s.site.tab_title_selector.clone(),
                    text: caption.clone(),
                },
                Target::Text {
                    css: s.site.tab_item_selector.clone(),
                    text: caption.clone(),
                },
                Target::Scan(vec![caption.clone()]),
            ];
            match driver::click_any(s.driver, &frame, &targets).await {
                Ok(Some(_)) => {
                    debug!("Switched to tab '{}'", caption);
                    s.settle().await;
                    return true;
                }
                Ok(None) => {}
                Err(Error::FrameDetached(e)) => {
                    debug!("Tab bar detached: {}", e);
                    return false;
                }
                Err(e) => debug!("Clicking tab '{}' failed: {}", caption, e),
            }
        }
        false
    }
}
