//! Bounded waits. Each one either succeeds before its deadline or reports a
//! [`WaitTimeout`]; callers decide whether that is fatal.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::driver::PageHandle;

#[derive(Debug, thiserror::Error)]
#[error("no element matched {selector:?} within {waited:?}")]
pub struct WaitTimeout {
    pub selector: String,
    pub waited: Duration,
}

/// Runs `probe` until it yields a value or `timeout` elapses. The probe
/// always runs at least once.
async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(found) = probe().await {
            return Some(found);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

pub async fn wait_for_all<H: PageHandle>(
    handle: &H,
    selector: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<Vec<H::Element>, WaitTimeout> {
    poll_until(timeout, interval, || async move {
        match handle.query_all(selector).await {
            Ok(found) if !found.is_empty() => Some(found),
            Ok(_) => None,
            Err(err) => {
                tracing::trace!(selector, ?err, "query failed while waiting");
                None
            }
        }
    })
    .await
    .ok_or_else(|| WaitTimeout {
        selector: selector.to_owned(),
        waited: timeout,
    })
}

pub async fn wait_for_within<H: PageHandle>(
    handle: &H,
    scope: &H::Element,
    selector: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<Vec<H::Element>, WaitTimeout> {
    poll_until(timeout, interval, || async move {
        match handle.query_within(scope, selector).await {
            Ok(found) if !found.is_empty() => Some(found),
            _ => None,
        }
    })
    .await
    .ok_or_else(|| WaitTimeout {
        selector: selector.to_owned(),
        waited: timeout,
    })
}

/// Waits until the first element matching `selector` accepts a click.
pub async fn wait_and_click<H: PageHandle>(
    handle: &H,
    selector: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<(), WaitTimeout> {
    poll_until(timeout, interval, || async move {
        let found = handle.query_all(selector).await.ok()?;
        let first = found.first()?;
        match handle.click(first).await {
            Ok(()) => Some(()),
            Err(err) => {
                tracing::trace!(selector, ?err, "element not clickable yet");
                None
            }
        }
    })
    .await
    .ok_or_else(|| WaitTimeout {
        selector: selector.to_owned(),
        waited: timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeElement, FakePage};

    #[tokio::test]
    async fn zero_timeout_probes_once() {
        let page = FakePage::new();
        let err = wait_for_all(&page, "a", Duration::ZERO, Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.selector, "a");
    }

    #[tokio::test]
    async fn returns_matches_in_order() -> anyhow::Result<()> {
        let page = FakePage::new();
        let first = page.add(FakeElement::new().text("one"));
        let second = page.add(FakeElement::new().text("two"));
        page.on_query("", "a", &[first, second]);

        let found = wait_for_all(&page, "a", Duration::ZERO, Duration::ZERO).await?;
        assert_eq!(found, vec![first, second]);
        Ok(())
    }

    #[tokio::test]
    async fn click_failure_is_a_timeout() {
        let page = FakePage::new();
        let button = page.add(FakeElement::new().failing_click());
        page.on_query("", "button", &[button]);

        assert!(
            wait_and_click(&page, "button", Duration::from_millis(20), Duration::from_millis(5))
                .await
                .is_err()
        );
        assert!(page.clicks().is_empty());
    }
}
