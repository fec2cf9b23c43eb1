//! Chromium lifecycle for one scrape job.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use futures::StreamExt as _;
use tokio::task::JoinHandle;

use crate::driver::chromium::ChromiumPage;
use crate::settings::ScrapeSettings;

/// Overrides executable discovery.
pub const CHROME_ENV: &str = "MAPSCRAPE_CHROME";

fn find_browser_executable() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CHROME_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(path = %path.display(), "{CHROME_ENV} points to a missing file");
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    };
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// A launched browser with a single tab. Call [`BrowserSession::close`] when
/// done; dropping only stops the event handler.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: ChromiumPage,
    user_data_dir: PathBuf,
}

impl BrowserSession {
    pub async fn launch(settings: &ScrapeSettings) -> anyhow::Result<Self> {
        let user_data_dir = std::env::temp_dir().join(format!(
            "mapscrape_chrome_{}",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&user_data_dir)
            .with_context(|| format!("create user data dir: {}", user_data_dir.display()))?;

        let (width, height) = settings.window_size;
        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .window_size(width, height)
            .user_data_dir(user_data_dir.clone())
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-notifications");
        builder = if settings.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };
        match find_browser_executable() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using browser executable");
                builder = builder.chrome_executable(path);
            }
            None => tracing::debug!("no known browser path; using chromiumoxide detection"),
        }
        let config = builder
            .build()
            .map_err(|err| anyhow::anyhow!("build browser config: {err}"))?;

        let (browser, mut events) = Browser::launch(config).await.context("launch browser")?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(err) = event {
                    tracing::debug!(?err, "browser handler event error");
                }
            }
            tracing::debug!("browser handler finished");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler.abort();
                return Err(err).context("open browser tab");
            }
        };
        tracing::info!(headless = settings.headless, "browser launched");

        Ok(Self {
            browser,
            handler,
            page: ChromiumPage::new(page),
            user_data_dir,
        })
    }

    pub fn page(&self) -> &ChromiumPage {
        &self.page
    }

    /// Closes the browser process and removes its profile directory. Failures
    /// are logged, never returned.
    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            tracing::warn!(?err, "failed to close browser cleanly");
        }
        if let Err(err) = self.browser.wait().await {
            tracing::warn!(?err, "failed to wait for browser exit");
        }
        self.handler.abort();
        if let Err(err) = std::fs::remove_dir_all(&self.user_data_dir) {
            tracing::debug!(
                path = %self.user_data_dir.display(),
                ?err,
                "failed to remove browser profile dir"
            );
        }
        tracing::info!("browser closed");
    }
}
