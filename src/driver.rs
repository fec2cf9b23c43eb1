//! The page automation handle the pipeline drives.
//!
//! Every pipeline stage talks to the browser through [`PageHandle`], so the
//! scroll loop, link collector and detail scraper can run against a real
//! Chromium tab or against a scripted page in tests. Calls are strictly
//! sequential: a handle belongs to exactly one job.

pub mod chromium;
#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use serde::Deserialize;

/// Scroll geometry of one element, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub scroll_height: i64,
    pub scroll_top: i64,
    pub client_height: i64,
}

impl ScrollMetrics {
    pub fn is_scrollable(&self) -> bool {
        self.scroll_height > self.client_height
    }
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    type Element: Clone + Send + Sync;

    async fn navigate(&self, url: &str) -> anyhow::Result<()>;

    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> anyhow::Result<Vec<Self::Element>>;

    /// Descendants of `scope` matching `selector`, in document order.
    async fn query_within(
        &self,
        scope: &Self::Element,
        selector: &str,
    ) -> anyhow::Result<Vec<Self::Element>>;

    async fn parent(&self, element: &Self::Element) -> anyhow::Result<Option<Self::Element>>;

    async fn attribute(&self, element: &Self::Element, name: &str)
    -> anyhow::Result<Option<String>>;

    /// The anchor's `href` resolved against the document URL, as the browser
    /// would follow it.
    async fn link_target(&self, element: &Self::Element) -> anyhow::Result<Option<String>>;

    /// Rendered text; empty when the element has none.
    async fn text(&self, element: &Self::Element) -> anyhow::Result<String>;

    async fn click(&self, element: &Self::Element) -> anyhow::Result<()>;

    async fn scroll_metrics(&self, element: &Self::Element) -> anyhow::Result<ScrollMetrics>;

    async fn scroll_by(&self, element: &Self::Element, dy: i64) -> anyhow::Result<()>;
}
