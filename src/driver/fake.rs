//! Scripted in-memory page for tests.
//!
//! Query results are registered per (current URL, selector) instead of being
//! computed from a DOM, which keeps fixtures short and explicit.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{PageHandle, ScrollMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FakeId(usize);

#[derive(Debug, Default, Clone)]
pub struct FakeElement {
    attrs: HashMap<String, String>,
    text: String,
    parent: Option<FakeId>,
    children: HashMap<String, Vec<FakeId>>,
    heights: VecDeque<i64>,
    client_height: i64,
    fail_click: bool,
}

impl FakeElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_owned();
        self
    }

    /// `scrollHeight` values returned by successive metric reads; the last
    /// one repeats forever.
    pub fn heights(mut self, heights: &[i64], client_height: i64) -> Self {
        self.heights = heights.iter().copied().collect();
        self.client_height = client_height;
        self
    }

    pub fn failing_click(mut self) -> Self {
        self.fail_click = true;
        self
    }
}

#[derive(Debug, Default)]
struct State {
    elements: Vec<FakeElement>,
    queries: HashMap<(String, String), Vec<FakeId>>,
    failing_urls: HashSet<String>,
    current_url: String,
    navigations: Vec<String>,
    clicks: Vec<FakeId>,
    scrolls: Vec<(FakeId, i64)>,
    metric_reads: usize,
}

#[derive(Debug, Default)]
pub struct FakePage {
    state: Mutex<State>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().expect("fake page state poisoned");
        f(&mut state)
    }

    pub fn add(&self, element: FakeElement) -> FakeId {
        self.with(|state| {
            state.elements.push(element);
            FakeId(state.elements.len() - 1)
        })
    }

    /// Registers the result of `query_all(selector)` while `url` is loaded.
    /// The page before any navigation has URL `""`.
    pub fn on_query(&self, url: &str, selector: &str, ids: &[FakeId]) {
        self.with(|state| {
            state
                .queries
                .insert((url.to_owned(), selector.to_owned()), ids.to_vec());
        });
    }

    pub fn on_query_within(&self, scope: FakeId, selector: &str, ids: &[FakeId]) {
        self.with(|state| {
            state.elements[scope.0]
                .children
                .insert(selector.to_owned(), ids.to_vec());
        });
    }

    pub fn set_parent(&self, child: FakeId, parent: FakeId) {
        self.with(|state| state.elements[child.0].parent = Some(parent));
    }

    pub fn fail_navigation(&self, url: &str) {
        self.with(|state| {
            state.failing_urls.insert(url.to_owned());
        });
    }

    pub fn navigations(&self) -> Vec<String> {
        self.with(|state| state.navigations.clone())
    }

    pub fn clicks(&self) -> Vec<FakeId> {
        self.with(|state| state.clicks.clone())
    }

    pub fn scrolls(&self) -> Vec<(FakeId, i64)> {
        self.with(|state| state.scrolls.clone())
    }

    pub fn metric_reads(&self) -> usize {
        self.with(|state| state.metric_reads)
    }
}

#[async_trait]
impl PageHandle for FakePage {
    type Element = FakeId;

    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.with(|state| {
            state.navigations.push(url.to_owned());
            if state.failing_urls.contains(url) {
                anyhow::bail!("navigation failed: {url}");
            }
            state.current_url = url.to_owned();
            Ok(())
        })
    }

    async fn query_all(&self, selector: &str) -> anyhow::Result<Vec<FakeId>> {
        Ok(self.with(|state| {
            state
                .queries
                .get(&(state.current_url.clone(), selector.to_owned()))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn query_within(&self, scope: &FakeId, selector: &str) -> anyhow::Result<Vec<FakeId>> {
        Ok(self.with(|state| {
            state.elements[scope.0]
                .children
                .get(selector)
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn parent(&self, element: &FakeId) -> anyhow::Result<Option<FakeId>> {
        Ok(self.with(|state| state.elements[element.0].parent))
    }

    async fn attribute(&self, element: &FakeId, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.with(|state| state.elements[element.0].attrs.get(name).cloned()))
    }

    async fn link_target(&self, element: &FakeId) -> anyhow::Result<Option<String>> {
        Ok(self.with(|state| {
            let href = state.elements[element.0].attrs.get("href")?;
            let resolved = url::Url::parse(&state.current_url)
                .and_then(|base| base.join(href))
                .map(String::from);
            Some(resolved.unwrap_or_else(|_| href.clone()))
        }))
    }

    async fn text(&self, element: &FakeId) -> anyhow::Result<String> {
        Ok(self.with(|state| state.elements[element.0].text.clone()))
    }

    async fn click(&self, element: &FakeId) -> anyhow::Result<()> {
        self.with(|state| {
            if state.elements[element.0].fail_click {
                anyhow::bail!("element is not clickable");
            }
            state.clicks.push(*element);
            Ok(())
        })
    }

    async fn scroll_metrics(&self, element: &FakeId) -> anyhow::Result<ScrollMetrics> {
        Ok(self.with(|state| {
            state.metric_reads += 1;
            let el = &mut state.elements[element.0];
            let scroll_height = if el.heights.len() > 1 {
                el.heights.pop_front().unwrap_or_default()
            } else {
                el.heights.front().copied().unwrap_or_default()
            };
            ScrollMetrics {
                scroll_height,
                scroll_top: 0,
                client_height: el.client_height,
            }
        }))
    }

    async fn scroll_by(&self, element: &FakeId, dy: i64) -> anyhow::Result<()> {
        self.with(|state| state.scrolls.push((*element, dy)));
        Ok(())
    }
}
