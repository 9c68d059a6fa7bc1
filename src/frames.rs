//! Locating frames in a tab whose frame tree is rebuilt on every navigation.
//!
//! Nothing here caches a [`FrameHandle`]: every call polls
//! [`PageDriver::frames`] afresh until the frame shows up or the timeout
//! elapses.

use crate::driver::{FrameHandle, PageDriver};
use crate::{Error, Result};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// One hop of a [`FrameLocatorPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameMatch {
    /// Exact frame name.
    Name(String),
    /// Substring of the frame URL.
    UrlFragment(String),
}

impl FrameMatch {
    pub fn matches(&self, frame: &FrameHandle) -> bool {
        match self {
            FrameMatch::Name(name) => frame.name == *name,
            FrameMatch::UrlFragment(fragment) => frame.url.contains(fragment.as_str()),
        }
    }
}

impl fmt::Display for FrameMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameMatch::Name(name) => write!(f, "name '{}'", name),
            FrameMatch::UrlFragment(fragment) => write!(f, "url containing '{}'", fragment),
        }
    }
}

impl<'de> Deserialize<'de> for FrameMatch {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(FrameMatchVisitor)
    }
}

struct FrameMatchVisitor;

impl<'de> Visitor<'de> for FrameMatchVisitor {
    type Value = FrameMatch;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a frame match map with single key (name or url)")
    }

    fn visit_map<M>(self, mut map: M) -> std::result::Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let key: String = map
            .next_key()?
            .ok_or_else(|| de::Error::custom("expected frame match key"))?;

        match key.as_str() {
            "name" => Ok(FrameMatch::Name(map.next_value()?)),
            "url" => Ok(FrameMatch::UrlFragment(map.next_value()?)),
            other => Err(de::Error::unknown_variant(other, &["name", "url"])),
        }
    }
}

/// Hops from the top page down to a frame, each hop searched among the
/// descendants of the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FrameLocatorPath(Vec<FrameMatch>);

impl FrameLocatorPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.0.push(FrameMatch::Name(name.into()));
        self
    }

    pub fn url(mut self, fragment: &str) -> Self {
        self.0.push(FrameMatch::UrlFragment(fragment.into()));
        self
    }

    pub fn hops(&self) -> &[FrameMatch] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FrameLocatorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.0.iter().map(|m| m.to_string()).collect();
        write!(f, "[{}]", hops.join(" > "))
    }
}

/// Polls the frame tree for frames by name or URL fragment.
#[derive(Clone, Copy)]
pub struct FrameResolver<'d> {
    driver: &'d dyn PageDriver,
    poll: Duration,
}

impl<'d> FrameResolver<'d> {
    pub fn new(driver: &'d dyn PageDriver, poll: Duration) -> Self {
        Self { driver, poll }
    }

    /// Frame named `name`, below `root` when given.
    pub async fn resolve_by_name(
        &self,
        root: Option<&FrameHandle>,
        name: &str,
        timeout: Duration,
    ) -> Result<FrameHandle> {
        let path = FrameLocatorPath::new().name(name);
        self.poll(root, &path, false, Instant::now() + timeout).await
    }

    /// Frame whose URL contains `fragment`, below `root` when given.
    pub async fn resolve_by_url_fragment(
        &self,
        root: Option<&FrameHandle>,
        fragment: &str,
        timeout: Duration,
    ) -> Result<FrameHandle> {
        let path = FrameLocatorPath::new().url(fragment);
        self.poll(root, &path, false, Instant::now() + timeout).await
    }

    /// Walk `path` hop by hop within `timeout`.
    pub async fn resolve_path(&self, path: &FrameLocatorPath, timeout: Duration) -> Result<FrameHandle> {
        self.poll(None, path, false, Instant::now() + timeout).await
    }

    /// Like [`resolve_path`](Self::resolve_path), and the last hop has
    /// finished loading.
    pub async fn resolve_loaded(&self, path: &FrameLocatorPath, timeout: Duration) -> Result<FrameHandle> {
        self.poll(None, path, true, Instant::now() + timeout).await
    }

    /// First of `candidates` that resolves. The timeout is shared; every
    /// poll looks at all candidates in order.
    pub async fn resolve_any(
        &self,
        candidates: &[FrameLocatorPath],
        timeout: Duration,
    ) -> Result<FrameHandle> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.driver.frames().await {
                Ok(frames) => {
                    let hit = candidates
                        .iter()
                        .find_map(|path| locate(&frames, None, path, false).ok());
                    if let Some(frame) = hit {
                        return Ok(frame);
                    }
                }
                Err(e) => debug!("Frame poll failed: {}", e),
            }

            let now = Instant::now();
            if now >= deadline {
                let tried: Vec<String> = candidates.iter().map(|p| p.to_string()).collect();
                return Err(Error::FrameNotFound(format!("any of {}", tried.join(", "))));
            }
            sleep(self.poll.min(deadline - now)).await;
        }
    }

    /// Resolve `path` until its frame holds an element matching `css`.
    pub async fn wait_for_element(
        &self,
        path: &FrameLocatorPath,
        css: &str,
        timeout: Duration,
    ) -> Result<FrameHandle> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(frame) = self.poll(None, path, false, Instant::now()).await {
                match self.driver.count(&frame, css).await {
                    Ok(n) if n > 0 => return Ok(frame),
                    Ok(_) => {}
                    Err(e) => debug!("Counting '{}' in {} failed: {}", css, frame, e),
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::ElementNotFound(format!("'{}' in {}", css, path)));
            }
            sleep(self.poll.min(deadline - now)).await;
        }
    }

    /// Core poll loop. Each poll takes one snapshot of the frame tree and
    /// walks the whole path in it. Never fails before `deadline`; a failed
    /// poll only means "look again".
    async fn poll(
        &self,
        root: Option<&FrameHandle>,
        path: &FrameLocatorPath,
        require_loaded: bool,
        deadline: Instant,
    ) -> Result<FrameHandle> {
        let mut polls = 0u32;
        let mut missed_hop = 0;
        loop {
            polls += 1;
            match self.driver.frames().await {
                Ok(frames) => match locate(&frames, root, path, require_loaded) {
                    Ok(frame) => {
                        if polls > 1 {
                            debug!("Resolved {} after {} polls", path, polls);
                        }
                        return Ok(frame);
                    }
                    Err(hop) => missed_hop = hop,
                },
                Err(e) => debug!("Frame poll failed: {}", e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(not_found(path, missed_hop));
            }
            sleep(self.poll.min(deadline - now)).await;
        }
    }
}

fn not_found(path: &FrameLocatorPath, hop: usize) -> Error {
    match path.hops() {
        [only] => Error::FrameNotFound(only.to_string()),
        hops => match hops.get(hop) {
            Some(m) => Error::FrameNotFound(format!("hop {} ({}) of {}", hop + 1, m, path)),
            None => Error::FrameNotFound(path.to_string()),
        },
    }
}

/// Walk `path` in one snapshot. On a miss, returns the index of the deepest
/// hop that matched nothing.
///
/// Every frame matching a hop is tried in document order, so a duplicated
/// name that leads nowhere does not hide a sibling that completes the path.
fn locate(
    frames: &[FrameHandle],
    root: Option<&FrameHandle>,
    path: &FrameLocatorPath,
    require_loaded: bool,
) -> std::result::Result<FrameHandle, usize> {
    if path.is_empty() {
        return Err(0);
    }
    descend(frames, root, path.hops(), 0, require_loaded)
}

fn descend(
    frames: &[FrameHandle],
    current: Option<&FrameHandle>,
    hops: &[FrameMatch],
    depth: usize,
    require_loaded: bool,
) -> std::result::Result<FrameHandle, usize> {
    let Some((hop, rest)) = hops.split_first() else {
        return current.cloned().ok_or(depth);
    };
    let mut deepest = depth;
    for frame in frames.iter().filter(|f| {
        current.map_or(true, |r| f.is_within(r))
            && hop.matches(f)
            && (!require_loaded || !rest.is_empty() || f.loaded)
    }) {
        match descend(frames, Some(frame), rest, depth + 1, require_loaded) {
            Ok(found) => return Ok(found),
            Err(miss) => deepest = deepest.max(miss),
        }
    }
    Err(deepest)
}
