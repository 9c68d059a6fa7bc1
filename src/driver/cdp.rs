use super::{scripts, FrameHandle, PageDriver, Target};
use crate::{Error, Result};
use async_trait::async_trait;
use eoka::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// [`PageDriver`] over an eoka CDP page.
///
/// Frames are reached through `window.frames` of the top document, which
/// works for the same-origin frame sets of the record portals.
pub struct EokaDriver<'p> {
    page: &'p Page,
}

#[derive(Deserialize)]
struct FrameReply<T> {
    #[serde(default)]
    detached: bool,
    value: Option<T>,
    error: Option<String>,
}

impl<'p> EokaDriver<'p> {
    pub fn new(page: &'p Page) -> Self {
        Self { page }
    }

    /// Evaluate `body` in `frame`; `None` when the expression yielded nothing.
    async fn eval_in<T: DeserializeOwned>(&self, frame: &FrameHandle, body: &str) -> Result<Option<T>> {
        let expected = (!frame.is_top() && !frame.url.is_empty()).then_some(frame.url.as_str());
        let js = scripts::in_frame(&frame.path, expected, body);
        let reply: FrameReply<T> = self.page.evaluate(&js).await?;
        if reply.detached {
            if let Some(err) = reply.error {
                debug!("Script in {} failed: {}", frame, err);
            }
            return Err(Error::FrameDetached(frame.to_string()));
        }
        Ok(reply.value)
    }
}

#[async_trait(?Send)]
impl PageDriver for EokaDriver<'_> {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.page.url().await?)
    }

    async fn page_html(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.page.screenshot().await?)
    }

    async fn frames(&self) -> Result<Vec<FrameHandle>> {
        Ok(self.page.evaluate(scripts::LIST_FRAMES).await?)
    }

    async fn frame_html(&self, frame: &FrameHandle) -> Result<String> {
        Ok(self
            .eval_in::<String>(frame, &scripts::html())
            .await?
            .unwrap_or_default())
    }

    async fn count(&self, frame: &FrameHandle, css: &str) -> Result<usize> {
        Ok(self
            .eval_in::<usize>(frame, &scripts::count(css))
            .await?
            .unwrap_or(0))
    }

    async fn exists(&self, frame: &FrameHandle, target: &Target) -> Result<bool> {
        Ok(self
            .eval_in::<bool>(frame, &scripts::exists(target))
            .await?
            .unwrap_or(false))
    }

    async fn click(&self, frame: &FrameHandle, target: &Target) -> Result<bool> {
        let clicked = self
            .eval_in::<bool>(frame, &scripts::click(target))
            .await?
            .unwrap_or(false);
        debug!("click {} in {}: {}", target, frame, clicked);
        Ok(clicked)
    }

    async fn fill(&self, frame: &FrameHandle, css: &str, value: &str) -> Result<bool> {
        let ready = self
            .eval_in::<bool>(frame, &scripts::prepare_input(css))
            .await?
            .unwrap_or(false);
        if !ready {
            return Ok(false);
        }

        self.page.type_text(value).await?;
        let typed: Option<String> = self.eval_in(frame, &scripts::input_value(css)).await?;
        if typed.as_deref() == Some(value) {
            return Ok(true);
        }

        debug!(
            "Typed value of '{}' reads {:?}, setting it directly",
            css, typed
        );
        Ok(self
            .eval_in::<bool>(frame, &scripts::set_value(css, value))
            .await?
            .unwrap_or(false))
    }

    async fn invoke(
        &self,
        frame: &FrameHandle,
        function: &str,
        args: &[serde_json::Value],
    ) -> Result<bool> {
        Ok(self
            .eval_in::<bool>(frame, &scripts::invoke(function, args))
            .await?
            .unwrap_or(false))
    }

    async fn text_of(&self, frame: &FrameHandle, target: &Target) -> Result<Option<String>> {
        self.eval_in::<String>(frame, &scripts::text(target)).await
    }
}
