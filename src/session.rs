use crate::config::{SiteProfile, TimingConfig};
use crate::debug::DebugSink;
use crate::driver::PageDriver;
use crate::frames::FrameResolver;
use std::time::Duration;

/// What every stage of a scrape shares: the tab, the portal profile, the
/// timings and the debug sink.
#[derive(Clone, Copy)]
pub struct Session<'a> {
    pub driver: &'a dyn PageDriver,
    pub site: &'a SiteProfile,
    pub timing: &'a TimingConfig,
    pub debug: &'a DebugSink,
}

impl<'a> Session<'a> {
    pub fn new(
        driver: &'a dyn PageDriver,
        site: &'a SiteProfile,
        timing: &'a TimingConfig,
        debug: &'a DebugSink,
    ) -> Self {
        Self {
            driver,
            site,
            timing,
            debug,
        }
    }

    pub fn frames(&self) -> FrameResolver<'a> {
        FrameResolver::new(self.driver, self.timing.poll_interval())
    }

    /// Pause after a click that reloads frames.
    pub async fn settle(&self) {
        if self.timing.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.timing.settle_ms)).await;
        }
    }
}
