//! Guest login through to a loaded result list.

use crate::criteria::SearchCriteria;
use crate::driver::{self, FrameHandle, Target};
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::{Error, Result};
use regex::Regex;
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Where the controller is in the search workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NavState {
    LoggedOut,
    LoggedIn,
    TermsAccepted,
    SearchOpened,
    CriteriaEntered,
    SearchSubmitted,
    ResultsLoaded,
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavState::LoggedOut => "LoggedOut",
            NavState::LoggedIn => "LoggedIn",
            NavState::TermsAccepted => "TermsAccepted",
            NavState::SearchOpened => "SearchOpened",
            NavState::CriteriaEntered => "CriteriaEntered",
            NavState::SearchSubmitted => "SearchSubmitted",
            NavState::ResultsLoaded => "ResultsLoaded",
        };
        f.write_str(name)
    }
}

/// Drives the portal from the guest login page to a loaded result list.
///
/// Steps must be called in order. Each step is retried with the configured
/// policy; an exhausted step leaves a debug dump and fails with its own
/// error kind.
pub struct NavigationController<'a> {
    session: Session<'a>,
    retry: RetryPolicy,
    state: NavState,
}

impl<'a> NavigationController<'a> {
    pub fn new(session: Session<'a>, retry: RetryPolicy) -> Self {
        Self {
            session,
            retry,
            state: NavState::LoggedOut,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    fn expect(&self, operation: &'static str, expected: NavState) -> Result<()> {
        if self.state != expected {
            return Err(Error::OutOfOrder {
                operation,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Open the entry page and log in as guest.
    pub async fn login(&mut self) -> Result<()> {
        self.expect("login", NavState::LoggedOut)?;
        let pattern = Regex::new(&self.session.site.post_login_url)
            .map_err(|e| Error::Config(format!("site.post_login_url: {}", e)))?;

        let pattern = &pattern;
        let this = &*self;
        let result = this
            .retry
            .run("login", move |_| this.try_login(pattern))
            .await;
        self.finish(result, "login_failed", Error::LoginFailed, NavState::LoggedIn)
            .await
    }

    async fn try_login(&self, pattern: &Regex) -> Result<()> {
        let s = self.session;
        info!("Navigating to: {}", s.site.entry_url);
        s.driver.goto(&s.site.entry_url).await?;
        driver::click_required(s.driver, &FrameHandle::top(), &s.site.guest_login).await?;

        let deadline = Instant::now() + Self::ms(s.timing.login_timeout_ms);
        loop {
            let url = s.driver.url().await?;
            if pattern.is_match(&url) {
                info!("Logged in as guest");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "url '{}' never matched '{}'",
                    url,
                    pattern.as_str()
                )));
            }
            sleep(s.timing.poll_interval()).await;
        }
    }

    /// Dismiss the terms dialog.
    pub async fn accept_terms(&mut self) -> Result<()> {
        self.expect("accept_terms", NavState::LoggedIn)?;
        let this = &*self;
        let result = this
            .retry
            .run("accept terms", move |_| this.try_accept_terms())
            .await;
        self.finish(
            result,
            "terms_failed",
            Error::TermsNotAccepted,
            NavState::TermsAccepted,
        )
        .await
    }

    async fn try_accept_terms(&self) -> Result<()> {
        let s = self.session;
        let accept = Target::css(s.site.accept_selector.as_str());

        match s
            .frames()
            .resolve_any(&s.site.terms_frames, Self::ms(s.timing.frame_timeout_ms))
            .await
        {
            Ok(frame) => {
                if s.driver.click(&frame, &accept).await? {
                    info!("Accepted terms in {}", frame);
                    s.settle().await;
                    return Ok(());
                }
                debug!("No accept control in {}, scanning all frames", frame);
            }
            Err(e) => debug!("No terms frame ({}), scanning all frames", e),
        }

        let mut frames = s.driver.frames().await?;
        frames.insert(0, FrameHandle::top());
        for frame in &frames {
            match s.driver.click(frame, &accept).await {
                Ok(true) => {
                    info!("Accepted terms in {}", frame);
                    s.settle().await;
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => debug!("Accept in {} failed: {}", frame, e),
            }
        }
        Err(Error::ElementNotFound(format!(
            "'{}' in any frame",
            s.site.accept_selector
        )))
    }

    /// Open the "Search Public Records" entry of the body frame.
    pub async fn open_search(&mut self) -> Result<()> {
        self.expect("open_search", NavState::TermsAccepted)?;
        let this = &*self;
        let result = this
            .retry
            .run("open search", move |_| this.try_open_search())
            .await;
        self.finish(
            result,
            "open_search_failed",
            Error::SearchOpenFailed,
            NavState::SearchOpened,
        )
        .await
    }

    async fn try_open_search(&self) -> Result<()> {
        let s = self.session;
        let body = s
            .frames()
            .wait_for_element(
                &s.site.body_frame,
                &s.site.search_row_selector,
                Self::ms(s.timing.frame_timeout_ms),
            )
            .await?;
        let row = Target::css(s.site.search_row_selector.as_str());
        if !s.driver.click(&body, &row).await? {
            return Err(Error::ElementNotFound(format!(
                "'{}' in {}",
                s.site.search_row_selector, body
            )));
        }
        info!("Opened search form");
        s.settle().await;
        Ok(())
    }

    /// Type the filing-date range into the criteria form.
    pub async fn enter_criteria(&mut self, criteria: &SearchCriteria) -> Result<()> {
        self.expect("enter_criteria", NavState::SearchOpened)?;
        let this = &*self;
        let result = this
            .retry
            .run("enter criteria", move |_| this.try_enter_criteria(criteria))
            .await;
        self.finish(
            result,
            "criteria_failed",
            Error::CriteriaEntryFailed,
            NavState::CriteriaEntered,
        )
        .await
    }

    async fn try_enter_criteria(&self, criteria: &SearchCriteria) -> Result<()> {
        let s = self.session;
        let frames = s.frames();

        let (path, frame) = match frames
            .resolve_loaded(&s.site.criteria_frame, Self::ms(s.timing.criteria_timeout_ms))
            .await
        {
            Ok(frame) => (&s.site.criteria_frame, frame),
            Err(e) => {
                debug!("{}; trying fallback criteria frame", e);
                let path = &s.site.criteria_fallback_frame;
                let frame = frames
                    .resolve_loaded(path, Self::ms(s.timing.criteria_fallback_timeout_ms))
                    .await?;
                (path, frame)
            }
        };
        debug!("Criteria form in {}", frame);

        let frame = frames
            .wait_for_element(
                path,
                &s.site.date_container_selector,
                Self::ms(s.timing.frame_timeout_ms),
            )
            .await?;

        for (css, value) in [
            (&s.site.from_input_selector, criteria.from_text()),
            (&s.site.to_input_selector, criteria.to_text()),
        ] {
            if !s.driver.fill(&frame, css, &value).await? {
                return Err(Error::ElementNotFound(format!("'{}' in {}", css, frame)));
            }
        }
        info!("Entered date range {}", criteria);
        Ok(())
    }

    /// Click the search control. Returns `false` when it could not be
    /// clicked; the controller then stays in `CriteriaEntered`.
    pub async fn submit_search(&mut self) -> Result<bool> {
        self.expect("submit_search", NavState::CriteriaEntered)?;
        let s = self.session;
        let submit = Target::css(s.site.submit_selector.as_str());

        let clicked = match s
            .frames()
            .resolve_path(&s.site.search_frame, Self::ms(s.timing.frame_timeout_ms))
            .await
        {
            Ok(frame) => match s.driver.click(&frame, &submit).await {
                Ok(clicked) => clicked,
                Err(e) => {
                    warn!("Search submit failed: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("Search frame not found: {}", e);
                false
            }
        };

        if clicked {
            info!("Submitted search");
            self.state = NavState::SearchSubmitted;
        } else {
            warn!("Search control '{}' not clicked", s.site.submit_selector);
            s.debug.dump(s.driver, "submit_failed").await;
        }
        Ok(clicked)
    }

    /// Wait for the result list. [`Error::FrameNotFound`] here means the
    /// search matched nothing.
    pub async fn await_results(&mut self) -> Result<FrameHandle> {
        self.expect("await_results", NavState::SearchSubmitted)?;
        let s = self.session;
        let frame = s
            .frames()
            .resolve_any(
                &[
                    s.site.results_list_frame.clone(),
                    s.site.results_list_fallback_frame.clone(),
                ],
                Self::ms(s.timing.results_timeout_ms),
            )
            .await?;
        info!("Results loaded in {}", frame);
        self.state = NavState::ResultsLoaded;
        Ok(frame)
    }

    async fn finish(
        &mut self,
        result: Result<()>,
        dump_prefix: &str,
        wrap: fn(String) -> Error,
        next: NavState,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                self.state = next;
                Ok(())
            }
            Err(e) => {
                let s = self.session;
                s.debug.dump(s.driver, dump_prefix).await;
                Err(wrap(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_order() {
        assert!(NavState::LoggedOut < NavState::LoggedIn);
        assert!(NavState::SearchSubmitted < NavState::ResultsLoaded);
        assert_eq!(NavState::CriteriaEntered.to_string(), "CriteriaEntered");
    }

    #[test]
    fn test_out_of_order_message() {
        let e = Error::OutOfOrder {
            operation: "open_search",
            expected: NavState::TermsAccepted,
            actual: NavState::LoggedOut,
        };
        assert_eq!(
            e.to_string(),
            "open_search called in state LoggedOut, expected TermsAccepted"
        );
    }
}
