//! The seam between the scraper and the browser tab.
//!
//! Everything above this module talks to a [`PageDriver`]. Production runs
//! use [`EokaDriver`]; tests plug in an in-memory site.

mod cdp;
mod scripts;

pub use cdp::EokaDriver;

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

/// Snapshot of one frame of the tab.
///
/// `path` is the chain of child indices from the top window; the top
/// document has the empty path. A handle is only valid until the next
/// navigation of the frame or any of its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FrameHandle {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub loaded: bool,
    pub path: Vec<usize>,
}

impl FrameHandle {
    /// The top-level document.
    pub fn top() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            loaded: true,
            path: Vec::new(),
        }
    }

    pub fn is_top(&self) -> bool {
        self.path.is_empty()
    }

    /// Strict descendant of `root`.
    pub fn is_within(&self, root: &FrameHandle) -> bool {
        self.path.len() > root.path.len() && self.path.starts_with(&root.path)
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_top() {
            return write!(f, "top");
        }
        if self.name.is_empty() {
            write!(f, "frame {:?} ({})", self.path, self.url)
        } else {
            write!(f, "frame '{}' {:?}", self.name, self.path)
        }
    }
}

/// Element inside one frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "TargetSpec")]
pub enum Target {
    /// First match of a CSS selector.
    Css(String),
    /// The `index`-th match of a CSS selector.
    Nth { css: String, index: usize },
    /// First CSS match whose text contains `text` (case-insensitive).
    Text { css: String, text: String },
    /// First clickable element whose text, alt, value or onclick contains
    /// any of the needles (case-insensitive).
    Scan(Vec<String>),
}

/// Elements a text target looks at when no selector is given.
pub const CLICKABLE: &str = "a, button, input, img, span, li, td, [onclick]";

impl Target {
    pub fn css(selector: impl Into<String>) -> Self {
        Target::Css(selector.into())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Css(css) => write!(f, "selector '{}'", css),
            Target::Nth { css, index } => write!(f, "selector '{}' #{}", css, index),
            Target::Text { text, .. } => write!(f, "text '{}'", text),
            Target::Scan(needles) => write!(f, "scan {:?}", needles),
        }
    }
}

/// YAML form of a [`Target`].
#[derive(Debug, Deserialize)]
struct TargetSpec {
    selector: Option<String>,
    text: Option<String>,
    index: Option<usize>,
    scan: Option<Vec<String>>,
}

impl TryFrom<TargetSpec> for Target {
    type Error = String;

    fn try_from(spec: TargetSpec) -> std::result::Result<Self, Self::Error> {
        match spec {
            TargetSpec {
                scan: Some(needles),
                selector: None,
                text: None,
                index: None,
            } => Ok(Target::Scan(needles)),
            TargetSpec {
                selector: Some(css),
                text: None,
                index: Some(index),
                scan: None,
            } => Ok(Target::Nth { css, index }),
            TargetSpec {
                selector,
                text: Some(text),
                index: None,
                scan: None,
            } => Ok(Target::Text {
                css: selector.unwrap_or_else(|| CLICKABLE.to_string()),
                text,
            }),
            TargetSpec {
                selector: Some(css),
                text: None,
                index: None,
                scan: None,
            } => Ok(Target::Css(css)),
            _ => Err("target needs one of: selector, selector + index, text, scan".into()),
        }
    }
}

/// One browser tab, addressed frame by frame.
///
/// Frame-scoped calls fail with [`Error::FrameDetached`] when the handle no
/// longer names a live frame. Element calls report a missing element as
/// `false` / `None`, not as an error.
#[async_trait(?Send)]
pub trait PageDriver {
    /// Navigate the top document.
    async fn goto(&self, url: &str) -> Result<()>;

    /// URL of the top document.
    async fn url(&self) -> Result<String>;

    /// Markup of the top document.
    async fn page_html(&self) -> Result<String>;

    /// PNG of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Every frame below the top document, in document order.
    async fn frames(&self) -> Result<Vec<FrameHandle>>;

    /// Markup of one frame's document.
    async fn frame_html(&self, frame: &FrameHandle) -> Result<String>;

    /// Number of elements matching `css`.
    async fn count(&self, frame: &FrameHandle, css: &str) -> Result<usize>;

    async fn exists(&self, frame: &FrameHandle, target: &Target) -> Result<bool>;

    /// Click through the DOM (`el.click()`). `false` when nothing matched.
    async fn click(&self, frame: &FrameHandle, target: &Target) -> Result<bool>;

    /// Clear an input and type `value` into it.
    async fn fill(&self, frame: &FrameHandle, css: &str, value: &str) -> Result<bool>;

    /// Call a global function of the frame. `false` when it is not defined.
    async fn invoke(
        &self,
        frame: &FrameHandle,
        function: &str,
        args: &[serde_json::Value],
    ) -> Result<bool>;

    /// Trimmed text of the target.
    async fn text_of(&self, frame: &FrameHandle, target: &Target) -> Result<Option<String>>;
}

/// Click the first target that matches.
pub async fn click_any(
    driver: &dyn PageDriver,
    frame: &FrameHandle,
    targets: &[Target],
) -> Result<Option<usize>> {
    for (i, target) in targets.iter().enumerate() {
        if driver.click(frame, target).await? {
            tracing::debug!("Clicked {} in {}", target, frame);
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// [`click_any`], failing when nothing matched.
pub async fn click_required(
    driver: &dyn PageDriver,
    frame: &FrameHandle,
    targets: &[Target],
) -> Result<()> {
    match click_any(driver, frame, targets).await? {
        Some(_) => Ok(()),
        None => Err(Error::ElementNotFound(format!(
            "none of {} in {}",
            targets
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            frame
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> std::result::Result<Target, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    #[test]
    fn test_target_forms() {
        assert_eq!(parse("selector: \"#accept\"").unwrap(), Target::css("#accept"));
        assert_eq!(
            parse("selector: a.link\nindex: 3").unwrap(),
            Target::Nth {
                css: "a.link".into(),
                index: 3
            }
        );
        assert_eq!(
            parse("text: Next").unwrap(),
            Target::Text {
                css: CLICKABLE.into(),
                text: "Next".into()
            }
        );
        assert_eq!(
            parse("selector: a\ntext: Next").unwrap(),
            Target::Text {
                css: "a".into(),
                text: "Next".into()
            }
        );
        assert_eq!(
            parse("scan: [next, navigateResults]").unwrap(),
            Target::Scan(vec!["next".into(), "navigateResults".into()])
        );
    }

    #[test]
    fn test_target_rejects_ambiguous() {
        assert!(parse("{}").is_err());
        assert!(parse("scan: [x]\nselector: a").is_err());
        assert!(parse("text: a\nindex: 1").is_err());
    }

    #[test]
    fn test_frame_handle_within() {
        let body = FrameHandle {
            name: "bodyframe".into(),
            url: String::new(),
            loaded: true,
            path: vec![0],
        };
        let child = FrameHandle {
            path: vec![0, 1],
            ..body.clone()
        };
        let sibling = FrameHandle {
            path: vec![1, 0],
            ..body.clone()
        };
        assert!(child.is_within(&body));
        assert!(!sibling.is_within(&body));
        assert!(!body.is_within(&body));
        assert!(body.is_within(&FrameHandle::top()));
    }
}
