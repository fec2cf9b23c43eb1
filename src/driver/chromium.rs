use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;
use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use serde::de::DeserializeOwned;

use super::{PageHandle, ScrollMetrics};

const REF_ATTR: &str = "data-mapscrape-ref";

const METRICS_JS: &str = r"function() {
    return JSON.stringify({
        scrollHeight: Math.round(this.scrollHeight),
        scrollTop: Math.round(this.scrollTop),
        clientHeight: Math.round(this.clientHeight)
    });
}";

const LINK_TARGET_JS: &str = r"function() {
    return JSON.stringify(this.hasAttribute('href') ? this.href : null);
}";

#[derive(Clone)]
pub struct ChromiumElement(Arc<Element>);

/// [`PageHandle`] over one chromiumoxide tab.
pub struct ChromiumPage {
    page: Page,
    next_ref: AtomicU64,
}

impl ChromiumPage {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            next_ref: AtomicU64::new(0),
        }
    }

    fn wrap(elements: Vec<Element>) -> Vec<ChromiumElement> {
        elements
            .into_iter()
            .map(|element| ChromiumElement(Arc::new(element)))
            .collect()
    }

    /// Runs `function_declaration` with `this` bound to the element. The
    /// function must return a JSON string; primitives always come back by
    /// value over CDP, objects do not.
    async fn call_json<T: DeserializeOwned>(
        &self,
        element: &ChromiumElement,
        function_declaration: String,
    ) -> anyhow::Result<T> {
        let returns = element
            .0
            .call_js_fn(function_declaration, false)
            .await
            .context("call element script")?;
        let raw = returns
            .result
            .value
            .as_ref()
            .and_then(|value| value.as_str())
            .ok_or_else(|| anyhow::anyhow!("element script returned no string value"))?;
        serde_json::from_str(raw).context("parse element script result")
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    type Element = ChromiumElement;

    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigate: {url}"))?;
        self.page
            .wait_for_navigation()
            .await
            .with_context(|| format!("wait for navigation: {url}"))?;
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> anyhow::Result<Vec<Self::Element>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .with_context(|| format!("query {selector:?}"))?;
        Ok(Self::wrap(elements))
    }

    async fn query_within(
        &self,
        scope: &Self::Element,
        selector: &str,
    ) -> anyhow::Result<Vec<Self::Element>> {
        let elements = scope
            .0
            .find_elements(selector)
            .await
            .with_context(|| format!("query {selector:?} within element"))?;
        Ok(Self::wrap(elements))
    }

    async fn parent(&self, element: &Self::Element) -> anyhow::Result<Option<Self::Element>> {
        // CDP hands back remote objects, not element handles, so the parent
        // is tagged and re-queried.
        let id = format!(
            "r{}-{}",
            std::process::id(),
            self.next_ref.fetch_add(1, Ordering::Relaxed)
        );
        let script = format!(
            "function() {{
                const parent = this.parentElement;
                if (!parent) {{ return JSON.stringify(false); }}
                parent.setAttribute('{REF_ATTR}', '{id}');
                return JSON.stringify(true);
            }}"
        );
        let tagged: bool = self.call_json(element, script).await?;
        if !tagged {
            return Ok(None);
        }

        let parent = self
            .page
            .find_element(format!("[{REF_ATTR}=\"{id}\"]"))
            .await
            .context("re-query tagged parent")?;
        Ok(Some(ChromiumElement(Arc::new(parent))))
    }

    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> anyhow::Result<Option<String>> {
        element
            .0
            .attribute(name)
            .await
            .with_context(|| format!("read attribute {name:?}"))
    }

    async fn link_target(&self, element: &Self::Element) -> anyhow::Result<Option<String>> {
        self.call_json(element, LINK_TARGET_JS.to_owned())
            .await
            .context("read link target")
    }

    async fn text(&self, element: &Self::Element) -> anyhow::Result<String> {
        let text = element.0.inner_text().await.context("read inner text")?;
        Ok(text.unwrap_or_default())
    }

    async fn click(&self, element: &Self::Element) -> anyhow::Result<()> {
        element.0.click().await.context("click element")?;
        Ok(())
    }

    async fn scroll_metrics(&self, element: &Self::Element) -> anyhow::Result<ScrollMetrics> {
        self.call_json(element, METRICS_JS.to_owned())
            .await
            .context("read scroll metrics")
    }

    async fn scroll_by(&self, element: &Self::Element, dy: i64) -> anyhow::Result<()> {
        let script =
            format!("function() {{ this.scrollBy(0, {dy}); return JSON.stringify(null); }}");
        let _: serde_json::Value = self.call_json(element, script).await.context("scroll")?;
        Ok(())
    }
}
