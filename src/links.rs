use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::NaiveDateTime;
use serde_json::Value;

use crate::driver::PageHandle;
use crate::error::ScrapeError;
use crate::formats::ListingLink;
use crate::settings::{ScrapeSettings, SelectorProfile};
use crate::structural::StructuralClass;
use crate::wait::wait_for_all;

const LINKS_FILE_PREFIX: &str = "products_";
const LINKS_FILE_TIMESTAMP: &str = "%Y-%m-%d_%H-%M-%S";

/// Harvests listing links from the loaded feed, in document order.
///
/// With `filter_by_first_class`, the class string of the first anchor that
/// has an `href` becomes the reference and every anchor with a different
/// class is dropped. Anchors after an interruption are kept if their class
/// matches again.
pub async fn extract_links<H: PageHandle>(
    handle: &H,
    settings: &ScrapeSettings,
    profile: &SelectorProfile,
) -> anyhow::Result<Vec<ListingLink>> {
    let anchors = wait_for_all(
        handle,
        &profile.anchor,
        settings.link_wait,
        settings.element_poll,
    )
    .await
    .map_err(|timeout| ScrapeError::ContentNotFound {
        selector: timeout.selector,
        waited: timeout.waited,
    })?;

    let mut reference: Option<StructuralClass> = None;
    let mut links = Vec::new();
    for anchor in &anchors {
        let class = StructuralClass::new(handle.attribute(anchor, "class").await?.as_deref());
        let Some(href) = handle
            .link_target(anchor)
            .await?
            .filter(|href| !href.is_empty())
        else {
            continue;
        };

        if settings.filter_by_first_class {
            match &reference {
                None => reference = Some(class.clone()),
                Some(first) if *first != class => continue,
                Some(_) => {}
            }
        }

        let name = handle
            .attribute(anchor, &profile.anchor_label_attr)
            .await?
            .unwrap_or_default();
        links.push(ListingLink {
            name,
            class: class.as_str().to_owned(),
            href,
        });
    }

    tracing::info!(
        anchors = anchors.len(),
        links = links.len(),
        "collected listing links"
    );
    Ok(links)
}

pub fn links_file_name(at: NaiveDateTime) -> String {
    format!(
        "{LINKS_FILE_PREFIX}{}.json",
        at.format(LINKS_FILE_TIMESTAMP)
    )
}

fn links_file_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let stamp = file_name
        .strip_prefix(LINKS_FILE_PREFIX)?
        .strip_suffix(".json")?;
    NaiveDateTime::parse_from_str(stamp, LINKS_FILE_TIMESTAMP).ok()
}

pub fn write_links(
    out_dir: &Path,
    links: &[ListingLink],
    at: NaiveDateTime,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir: {}", out_dir.display()))?;
    let path = out_dir.join(links_file_name(at));
    let json = serde_json::to_vec_pretty(links).context("serialize links")?;
    std::fs::write(&path, json).with_context(|| format!("write links: {}", path.display()))?;
    Ok(path)
}

/// The `products_*.json` file with the newest timestamp in its name.
pub fn latest_links_file(dir: &Path) -> anyhow::Result<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScrapeError::NoInputFile {
                dir: dir.to_path_buf(),
            }
            .into());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read links dir: {}", dir.display()));
        }
    };

    let mut newest: Option<(NaiveDateTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.with_context(|| format!("list links dir: {}", dir.display()))?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !file_name.starts_with(LINKS_FILE_PREFIX) || !file_name.ends_with(".json") {
            continue;
        }
        let Some(stamp) = links_file_timestamp(&file_name) else {
            tracing::debug!(file = %file_name, "skipping links file with unparsable timestamp");
            continue;
        };
        if newest.as_ref().is_none_or(|(best, _)| stamp > *best) {
            newest = Some((stamp, entry.path()));
        }
    }

    newest.map(|(_, path)| path).ok_or_else(|| {
        ScrapeError::NoInputFile {
            dir: dir.to_path_buf(),
        }
        .into()
    })
}

/// Reads a links file, keeping entries that carry both `href` and `name`.
pub fn load_links(path: &Path) -> anyhow::Result<Vec<ListingLink>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read links: {}", path.display()))?;
    let entries: Vec<Value> =
        serde_json::from_str(&text).with_context(|| format!("parse links: {}", path.display()))?;

    let links = entries
        .into_iter()
        .filter_map(|entry| {
            let href = entry.get("href")?.as_str()?.to_owned();
            let name = entry.get("name")?.as_str()?.to_owned();
            let class = entry
                .get("class")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            Some(ListingLink { name, class, href })
        })
        .collect();
    Ok(links)
}
