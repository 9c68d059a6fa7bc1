use crate::driver::PageDriver;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Writes page markup and a screenshot when a step gives up.
///
/// Dumps are best effort: failures are logged and swallowed.
#[derive(Debug, Clone, Default)]
pub struct DebugSink {
    dir: Option<PathBuf>,
    screenshots: bool,
}

impl DebugSink {
    pub fn new(dir: impl Into<PathBuf>, screenshots: bool) -> Self {
        Self {
            dir: Some(dir.into()),
            screenshots,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Write `<dir>/<prefix>-<timestamp>.html` (and `.png`). Returns the
    /// HTML path when it was written.
    pub async fn dump(&self, driver: &dyn PageDriver, prefix: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Cannot create debug dir {}: {}", dir.display(), e);
            return None;
        }

        let stem = format!("{}-{}", prefix, Local::now().format("%Y%m%dT%H%M%S"));
        let html_path = dir.join(format!("{}.html", stem));
        let mut written = None;

        match driver.page_html().await {
            Ok(html) => match std::fs::write(&html_path, html) {
                Ok(()) => written = Some(html_path.clone()),
                Err(e) => warn!("Failed to save {}: {}", html_path.display(), e),
            },
            Err(e) => warn!("Failed to read page for debug dump: {}", e),
        }

        if self.screenshots {
            let png_path = dir.join(format!("{}.png", stem));
            match driver.screenshot().await {
                Ok(data) => {
                    if let Err(e) = std::fs::write(&png_path, data) {
                        warn!("Failed to save {}: {}", png_path.display(), e);
                    }
                }
                Err(e) => warn!("Failed to take debug screenshot: {}", e),
            }
        }

        if written.is_some() {
            info!("Saved debug dump to: {}", html_path.display());
        }
        written
    }
}
