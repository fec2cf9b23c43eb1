use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

const SEARCH_URL_PREFIX: &str = "https://www.google.com/maps/search/";
const SEARCH_URL_SUFFIX: &str =
    "/@34.0150613,-6.8471705,10z?entry=ttu&g_ep=EgoyMDI1MDczMC4wIKXMDSoASAFQAw%3D%3D";

/// Timing and limits for one scrape job.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub scroll_increment_px: i64,
    pub scroll_pause: Duration,
    pub scroll_poll_window: Duration,
    pub max_scroll_loops: u32,
    pub stale_threshold: u32,
    pub container_wait: Duration,
    pub max_ancestor_levels: u32,

    pub link_wait: Duration,
    pub filter_by_first_class: bool,

    pub settle_delay: Duration,
    pub marker_wait: Duration,
    pub text_wait: Duration,
    pub panel_wait: Duration,
    pub element_poll: Duration,

    pub headless: bool,
    pub window_size: (u32, u32),
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            scroll_increment_px: 400,
            scroll_pause: Duration::from_millis(800),
            scroll_poll_window: Duration::from_secs(3),
            max_scroll_loops: 60,
            stale_threshold: 4,
            container_wait: Duration::from_secs(20),
            max_ancestor_levels: 3,

            link_wait: Duration::from_secs(15),
            filter_by_first_class: true,

            settle_delay: Duration::from_secs(1),
            marker_wait: Duration::from_secs(15),
            text_wait: Duration::from_secs(5),
            panel_wait: Duration::from_secs(5),
            element_poll: Duration::from_millis(250),

            headless: true,
            window_size: (1920, 1080),
        }
    }
}

impl ScrapeSettings {
    /// Every wait and delay set to zero: each bounded wait becomes a single
    /// probe. Used by tests driving a scripted page.
    pub fn instant() -> Self {
        Self {
            scroll_pause: Duration::ZERO,
            scroll_poll_window: Duration::ZERO,
            container_wait: Duration::ZERO,
            link_wait: Duration::ZERO,
            settle_delay: Duration::ZERO,
            marker_wait: Duration::ZERO,
            text_wait: Duration::ZERO,
            panel_wait: Duration::ZERO,
            element_poll: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Number of height polls per scroll cycle: `ceil(window / pause)`, at
    /// least one.
    pub fn polls_per_cycle(&self) -> u32 {
        if self.scroll_pause.is_zero() {
            return 1;
        }
        let ratio = self.scroll_poll_window.as_secs_f64() / self.scroll_pause.as_secs_f64();
        (ratio.ceil() as u32).max(1)
    }
}

/// CSS selectors and attribute names describing the result-page layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorProfile {
    pub feed: String,
    pub anchor: String,
    pub anchor_label_attr: String,
    pub marker_attr: String,
    pub marker_prefixes: Vec<String>,
    pub body_text_class: String,
    pub span: String,
    pub details_button_label_prefix: String,
    pub section_tag: String,
    pub section_class_token: usize,
    pub section_heading: String,
    pub section_item: String,
}

impl Default for SelectorProfile {
    fn default() -> Self {
        Self {
            feed: "div[role='feed']".to_owned(),
            anchor: "a".to_owned(),
            anchor_label_attr: "aria-label".to_owned(),
            marker_attr: "data-item-id".to_owned(),
            marker_prefixes: vec![
                "address".to_owned(),
                "phone".to_owned(),
                "authority".to_owned(),
            ],
            body_text_class: "fontBodyMedium".to_owned(),
            span: "span".to_owned(),
            details_button_label_prefix: "Informations sur".to_owned(),
            section_tag: "div".to_owned(),
            section_class_token: 1,
            section_heading: "h2".to_owned(),
            section_item: "li".to_owned(),
        }
    }
}

impl SelectorProfile {
    /// Loads a YAML profile. Keys the file omits keep their defaults.
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read selector profile: {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parse selector profile: {}", path.display()))
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Matches any element whose marker attribute starts with one of the
    /// known field prefixes.
    pub fn marker_selector(&self) -> String {
        self.marker_prefixes
            .iter()
            .map(|prefix| format!("[{}^=\"{prefix}\"]", self.marker_attr))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn body_text_selector(&self) -> String {
        format!(".{}", self.body_text_class)
    }

    pub fn details_button_selector(&self) -> String {
        format!(
            "button[aria-label^=\"{}\"]",
            self.details_button_label_prefix
        )
    }
}

/// Namespacing key for output files: lower-case, spaces replaced by `_`.
pub fn keyword_key(keyword: &str) -> String {
    keyword.replace(' ', "_").to_lowercase()
}

pub fn search_url(keyword: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(SEARCH_URL_PREFIX).context("parse search url template")?;
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("search url template cannot be a base"))?
        .pop_if_empty()
        .push(keyword);
    let with_suffix = format!("{}{SEARCH_URL_SUFFIX}", url.as_str());
    Url::parse(&with_suffix).context("build search url")
}

pub fn raw_log_path(out_dir: &Path, key: &str) -> PathBuf {
    out_dir.join(format!("product_details_live_{key}.json"))
}

pub fn cleaned_path(out_dir: &Path, key: &str) -> PathBuf {
    out_dir.join(format!("product_details_live_{key}_cleaned.json"))
}
