//! Drives the infinitely scrolling result feed until no more content loads.

use crate::driver::PageHandle;
use crate::error::ScrapeError;
use crate::settings::{ScrapeSettings, SelectorProfile};
use crate::wait::wait_for_all;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub last_observed_height: i64,
    pub consecutive_stale_cycles: u32,
    pub loop_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStop {
    /// `stale_threshold` cycles in a row brought no new content.
    Exhausted,
    /// `max_scroll_loops` scroll commands were issued.
    LoopBudget,
}

impl ScrollState {
    fn stop_reason(&self, settings: &ScrapeSettings) -> Option<ScrollStop> {
        if self.consecutive_stale_cycles >= settings.stale_threshold {
            Some(ScrollStop::Exhausted)
        } else if self.loop_count >= settings.max_scroll_loops {
            Some(ScrollStop::LoopBudget)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub state: ScrollState,
    pub stop: ScrollStop,
}

pub struct ScrollController<'a, H: PageHandle> {
    handle: &'a H,
    settings: &'a ScrapeSettings,
    feed_selector: String,
    container: Option<H::Element>,
}

impl<'a, H: PageHandle> ScrollController<'a, H> {
    pub fn new(handle: &'a H, settings: &'a ScrapeSettings, profile: &SelectorProfile) -> Self {
        Self {
            handle,
            settings,
            feed_selector: profile.feed.clone(),
            container: None,
        }
    }

    /// Finds the element that actually scrolls: the feed itself or one of its
    /// closest ancestors. Cached for the lifetime of the controller.
    pub async fn locate_container(&mut self) -> anyhow::Result<H::Element> {
        if let Some(container) = &self.container {
            return Ok(container.clone());
        }

        let feed = wait_for_all(
            self.handle,
            &self.feed_selector,
            self.settings.container_wait,
            self.settings.element_poll,
        )
        .await
        .map_err(|timeout| ScrapeError::ContainerNotFound {
            selector: timeout.selector,
            waited: timeout.waited,
        })?
        .swap_remove(0);

        let container = self.scrollable_ancestor(feed).await?;
        let class = self
            .handle
            .attribute(&container, "class")
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        tracing::info!(class = %class, "scroll container located");

        self.container = Some(container.clone());
        Ok(container)
    }

    async fn scrollable_ancestor(&self, mut current: H::Element) -> anyhow::Result<H::Element> {
        for _ in 0..self.settings.max_ancestor_levels {
            match self.handle.scroll_metrics(&current).await {
                Ok(metrics) if metrics.is_scrollable() => return Ok(current),
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(?err, "scroll metrics unavailable; stopping ancestor walk");
                    break;
                }
            }
            match self.handle.parent(&current).await? {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(current)
    }

    /// Scrolls until the feed stops growing or the loop budget runs out.
    /// Both endings are a normal completion.
    pub async fn scroll_to_end(&mut self) -> anyhow::Result<ScrollOutcome> {
        let container = self.locate_container().await?;
        let settings = self.settings;
        let polls = settings.polls_per_cycle();

        let mut state = ScrollState {
            last_observed_height: self.handle.scroll_metrics(&container).await?.scroll_height,
            ..ScrollState::default()
        };

        let stop = loop {
            if let Some(stop) = state.stop_reason(settings) {
                break stop;
            }

            self.handle
                .scroll_by(&container, settings.scroll_increment_px)
                .await?;
            state.loop_count += 1;

            let mut latest = state.last_observed_height;
            let mut grew = false;
            for _ in 0..polls {
                tokio::time::sleep(settings.scroll_pause).await;
                latest = self.handle.scroll_metrics(&container).await?.scroll_height;
                if latest > state.last_observed_height {
                    grew = true;
                    break;
                }
            }

            if grew {
                state.consecutive_stale_cycles = 0;
            } else {
                state.consecutive_stale_cycles += 1;
                tracing::debug!(
                    stale_cycles = state.consecutive_stale_cycles,
                    "scroll height unchanged"
                );
            }
            state.last_observed_height = latest;
            tracing::info!(
                loop_count = state.loop_count,
                scroll_height = latest,
                "scrolled feed"
            );
        };

        match stop {
            ScrollStop::Exhausted => tracing::info!("scrolling finished: no new content"),
            ScrollStop::LoopBudget => tracing::info!(
                max_loops = settings.max_scroll_loops,
                "scrolling finished: loop budget reached"
            ),
        }

        Ok(ScrollOutcome { state, stop })
    }
}
