//! Visits each collected listing and extracts its fields.
//!
//! A listing that fails for any reason is logged and skipped; the rest of the
//! run goes on. Every successfully scraped listing is persisted before the
//! next one is visited.

use anyhow::Context as _;
use serde_json::Value;

use crate::driver::PageHandle;
use crate::extraction::{
    FieldLabel, PositionalSpans, SpanInterpreter, phone_from_marker, strip_leading_symbols,
};
use crate::formats::{DetailSection, ListingLink, RawListingRecord};
use crate::record_log::{RecordLog, RecordSink};
use crate::settings::{ScrapeSettings, SelectorProfile};
use crate::structural::siblings_sharing_class_of;
use crate::wait::{wait_and_click, wait_for_all, wait_for_within};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    pub total: usize,
    pub scraped: usize,
    pub skipped: usize,
    /// URLs of listings that could not be scraped or persisted.
    pub failed: Vec<String>,
}

pub struct DetailScraper<'a, H: PageHandle> {
    handle: &'a H,
    settings: &'a ScrapeSettings,
    profile: &'a SelectorProfile,
    spans: Box<dyn SpanInterpreter>,
}

impl<'a, H: PageHandle> DetailScraper<'a, H> {
    pub fn new(handle: &'a H, settings: &'a ScrapeSettings, profile: &'a SelectorProfile) -> Self {
        Self {
            handle,
            settings,
            profile,
            spans: Box::new(PositionalSpans::default()),
        }
    }

    pub fn with_span_interpreter(mut self, spans: Box<dyn SpanInterpreter>) -> Self {
        self.spans = spans;
        self
    }

    /// Scrapes every link whose URL is not in `log` yet, in order, and hands
    /// back the grown log.
    pub async fn scrape_all(
        &self,
        links: &[ListingLink],
        mut log: RecordLog,
        sink: &mut dyn RecordSink,
    ) -> (RecordLog, ScrapeReport) {
        let mut report = ScrapeReport {
            total: links.len(),
            ..ScrapeReport::default()
        };
        if !log.is_empty() {
            tracing::info!(already_scraped = log.len(), "resuming from record log");
        }

        for (index, link) in links.iter().enumerate() {
            if log.contains(&link.href) {
                tracing::info!(url = %link.href, "already scraped");
                report.skipped += 1;
                continue;
            }

            tracing::info!(
                position = index + 1,
                total = links.len(),
                name = %link.name,
                "scraping listing"
            );
            let record = match self.scrape_listing(link).await {
                Ok(record) => record,
                Err(err) => {
                    tracing::error!(
                        url = %link.href,
                        error = %format!("{err:#}"),
                        "listing scrape failed"
                    );
                    report.failed.push(link.href.clone());
                    continue;
                }
            };

            log.push(record);
            match sink.persist(log.records()) {
                Ok(()) => {
                    report.scraped += 1;
                    tracing::info!(url = %link.href, "listing saved");
                }
                Err(err) => {
                    tracing::error!(
                        url = %link.href,
                        error = %format!("{err:#}"),
                        "persisting record log failed"
                    );
                    report.failed.push(link.href.clone());
                }
            }
        }

        tracing::info!(
            total = report.total,
            scraped = report.scraped,
            skipped = report.skipped,
            failed = report.failed.len(),
            "detail scrape finished"
        );
        (log, report)
    }

    pub async fn scrape_listing(&self, link: &ListingLink) -> anyhow::Result<RawListingRecord> {
        self.handle.navigate(&link.href).await?;
        tokio::time::sleep(self.settings.settle_delay).await;

        let mut record = RawListingRecord::new(&link.href, &link.name);

        let markers = wait_for_all(
            self.handle,
            &self.profile.marker_selector(),
            self.settings.marker_wait,
            self.settings.element_poll,
        )
        .await
        .context("wait for field markers")?;
        for marker in &markers {
            let (label, text) = self.read_marker(marker).await?;
            set_field(&mut record, label, text);
        }

        let spans = self.body_text_spans().await?;
        let fields = self.spans.interpret(&spans);
        tracing::debug!(
            url = %link.href,
            ?spans,
            rating = ?fields.rating,
            number_of_rates = ?fields.number_of_rates,
            "rating spans"
        );
        if fields.rating.is_some() {
            record.rating = fields.rating;
        }
        if fields.number_of_rates.is_some() {
            record.number_of_rates = fields.number_of_rates;
        }

        match self.read_details().await {
            Ok(Some(details)) => record.details = Some(details),
            Ok(None) => tracing::debug!(url = %link.href, "no details panel"),
            Err(err) => tracing::debug!(url = %link.href, ?err, "details panel unreadable"),
        }

        Ok(record)
    }

    async fn read_marker(&self, marker: &H::Element) -> anyhow::Result<(FieldLabel, String)> {
        let marker_value = self
            .handle
            .attribute(marker, &self.profile.marker_attr)
            .await?
            .unwrap_or_default();
        let label = FieldLabel::from_marker(&marker_value);

        let mut text = match wait_for_within(
            self.handle,
            marker,
            &self.profile.body_text_selector(),
            self.settings.text_wait,
            self.settings.element_poll,
        )
        .await
        {
            Ok(found) => self
                .handle
                .text(&found[0])
                .await
                .map(|text| text.trim().to_owned())
                .unwrap_or_default(),
            Err(_) => String::new(),
        };

        if label == FieldLabel::Phone
            && text.is_empty()
            && let Some(phone) = phone_from_marker(&marker_value)
        {
            text = phone.to_owned();
        }

        Ok((label, text))
    }

    /// Non-empty span texts under every body-text element, flattened in
    /// document order.
    async fn body_text_spans(&self) -> anyhow::Result<Vec<String>> {
        let containers = self
            .handle
            .query_all(&self.profile.body_text_selector())
            .await?;
        let mut spans = Vec::new();
        for container in &containers {
            for span in self
                .handle
                .query_within(container, &self.profile.span)
                .await?
            {
                let text = self.handle.text(&span).await?;
                let text = text.trim();
                if !text.is_empty() {
                    spans.push(text.to_owned());
                }
            }
        }
        Ok(spans)
    }

    /// Opens the details panel and reads its sections. `None` when the panel
    /// is not available.
    async fn read_details(&self) -> anyhow::Result<Option<Vec<DetailSection>>> {
        let opened = wait_and_click(
            self.handle,
            &self.profile.details_button_selector(),
            self.settings.panel_wait,
            self.settings.element_poll,
        )
        .await;
        if opened.is_err() {
            return Ok(None);
        }

        let Ok(bodies) = wait_for_all(
            self.handle,
            &self.profile.body_text_selector(),
            self.settings.panel_wait,
            self.settings.element_poll,
        )
        .await
        else {
            return Ok(None);
        };
        let Some(reference) = bodies.get(1) else {
            return Ok(None);
        };
        let Some(sections) = siblings_sharing_class_of(
            self.handle,
            reference,
            &self.profile.section_tag,
            self.profile.section_class_token,
        )
        .await?
        else {
            return Ok(None);
        };

        let mut details = Vec::with_capacity(sections.len());
        for section in &sections {
            match self.read_section(section).await {
                Ok(section) => details.push(section),
                Err(err) => tracing::trace!(?err, "skipping details section"),
            }
        }
        Ok(Some(details))
    }

    async fn read_section(&self, section: &H::Element) -> anyhow::Result<DetailSection> {
        let headings = self
            .handle
            .query_within(section, &self.profile.section_heading)
            .await?;
        let heading = headings
            .first()
            .ok_or_else(|| anyhow::anyhow!("section has no heading"))?;
        let title = self.handle.text(heading).await?.trim().to_owned();

        let mut items = Vec::new();
        for item in self
            .handle
            .query_within(section, &self.profile.section_item)
            .await?
        {
            items.push(strip_leading_symbols(&self.handle.text(&item).await?));
        }

        Ok(DetailSection { title, items })
    }
}

fn set_field(record: &mut RawListingRecord, label: FieldLabel, text: String) {
    match label {
        FieldLabel::Address => record.address = Some(text),
        FieldLabel::Phone => record.phone = Some(text),
        FieldLabel::Authority => record.authority = Some(text),
        FieldLabel::Unknown => {
            record
                .extra
                .insert(label.as_str().to_owned(), Value::String(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeElement, FakeId, FakePage};
    use crate::record_log::MemorySink;

    const MARKERS: &str =
        r#"[data-item-id^="address"], [data-item-id^="phone"], [data-item-id^="authority"]"#;
    const BODY: &str = ".fontBodyMedium";
    const BUTTON: &str = r#"button[aria-label^="Informations sur"]"#;

    fn link(n: usize) -> ListingLink {
        ListingLink {
            name: format!("Listing {n}"),
            class: "hfpxzc".to_owned(),
            href: format!("https://maps.example/place/{n}"),
        }
    }

    fn marker(page: &FakePage, id: &str, text: Option<&str>) -> FakeId {
        let marker = page.add(FakeElement::new().attr("data-item-id", id));
        if let Some(text) = text {
            let label = page.add(FakeElement::new().text(text));
            page.on_query_within(marker, BODY, &[label]);
        }
        marker
    }

    /// A listing page with an address marker and nothing else.
    fn minimal_listing(page: &FakePage, url: &str) {
        let address = marker(page, "address", Some("1 Rue Test"));
        page.on_query(url, MARKERS, &[address]);
    }

    fn full_listing(page: &FakePage, url: &str) -> FakeId {
        let address = marker(page, "address", Some("  12 Avenue Fal Ould Oumeir, Rabat "));
        let phone = marker(page, "phone:tel:0537000000", None);
        let site = marker(page, "authority", Some("cafex.ma"));
        page.on_query(url, MARKERS, &[address, phone, site]);

        let rating_block = page.add(FakeElement::new().attr("class", "fontBodyMedium"));
        let spans: Vec<_> = ["4,5", "  ", "(120)"]
            .iter()
            .map(|text| page.add(FakeElement::new().text(text)))
            .collect();
        page.on_query_within(rating_block, "span", &spans);

        let panel_body = page.add(FakeElement::new().attr("class", "fontBodyMedium dmRWX"));
        let count = page.add(FakeElement::new().text("120"));
        page.on_query_within(panel_body, "span", &[count]);
        page.on_query(url, BODY, &[rating_block, panel_body]);

        let button = page.add(FakeElement::new());
        page.on_query(url, BUTTON, &[button]);

        let services = page.add(FakeElement::new());
        let heading = page.add(FakeElement::new().text(" Services "));
        let items: Vec<_> = ["\u{e5ca}Terrasse", "· Wi-Fi"]
            .iter()
            .map(|text| page.add(FakeElement::new().text(text)))
            .collect();
        page.on_query_within(services, "h2", &[heading]);
        page.on_query_within(services, "li", &items);

        let headless = page.add(FakeElement::new());
        page.on_query(url, "div.dmRWX", &[services, headless]);
        button
    }

    #[tokio::test]
    async fn extracts_fields_spans_and_details() -> anyhow::Result<()> {
        let page = FakePage::new();
        let url = link(1).href;
        let button = full_listing(&page, &url);
        let settings = ScrapeSettings::instant();
        let profile = SelectorProfile::default();

        let record = DetailScraper::new(&page, &settings, &profile)
            .scrape_listing(&link(1))
            .await?;

        assert_eq!(record.url, url);
        assert_eq!(record.name, "Listing 1");
        assert_eq!(record.address.as_deref(), Some("12 Avenue Fal Ould Oumeir, Rabat"));
        assert_eq!(record.phone.as_deref(), Some("0537000000"));
        assert_eq!(record.authority.as_deref(), Some("cafex.ma"));
        assert_eq!(record.rating.as_deref(), Some("4,5"));
        assert_eq!(record.number_of_rates.as_deref(), Some("120"));
        assert_eq!(
            record.details,
            Some(vec![DetailSection {
                title: "Services".to_owned(),
                items: vec!["Terrasse".to_owned(), "Wi-Fi".to_owned()],
            }])
        );
        assert_eq!(page.clicks(), vec![button]);
        Ok(())
    }

    #[tokio::test]
    async fn missing_panel_and_spans_leave_fields_absent() -> anyhow::Result<()> {
        let page = FakePage::new();
        minimal_listing(&page, &link(1).href);
        let settings = ScrapeSettings::instant();
        let profile = SelectorProfile::default();

        let record = DetailScraper::new(&page, &settings, &profile)
            .scrape_listing(&link(1))
            .await?;

        assert_eq!(record.address.as_deref(), Some("1 Rue Test"));
        assert_eq!(record.phone, None);
        assert_eq!(record.rating, None);
        assert_eq!(record.number_of_rates, None);
        assert_eq!(record.details, None);
        Ok(())
    }

    #[tokio::test]
    async fn custom_span_interpreter_is_used() -> anyhow::Result<()> {
        let page = FakePage::new();
        full_listing(&page, &link(1).href);
        let settings = ScrapeSettings::instant();
        let profile = SelectorProfile::default();

        let record = DetailScraper::new(&page, &settings, &profile)
            .with_span_interpreter(Box::new(PositionalSpans {
                rating_index: 0,
                count_index: 1,
            }))
            .scrape_listing(&link(1))
            .await?;

        assert_eq!(record.number_of_rates.as_deref(), Some("(120)"));
        Ok(())
    }

    #[tokio::test]
    async fn failing_listing_does_not_stop_later_ones() -> anyhow::Result<()> {
        let page = FakePage::new();
        let links: Vec<_> = (1..=5).map(link).collect();
        for (n, link) in links.iter().enumerate() {
            if n != 2 {
                minimal_listing(&page, &link.href);
            }
        }
        let settings = ScrapeSettings::instant();
        let profile = SelectorProfile::default();
        let mut sink = MemorySink::default();

        let (log, report) = DetailScraper::new(&page, &settings, &profile)
            .scrape_all(&links, RecordLog::new(), &mut sink)
            .await;

        assert_eq!(page.navigations().len(), 5);
        assert_eq!(report.scraped, 4);
        assert_eq!(report.failed, vec![links[2].href.clone()]);
        let urls: Vec<_> = log.records().iter().map(|r| r.url.clone()).collect();
        assert_eq!(
            urls,
            [0, 1, 3, 4].map(|i| links[i].href.clone()).to_vec()
        );
        assert_eq!(sink.snapshots.len(), 4);
        assert_eq!(sink.snapshots.last().map(Vec::len), Some(4));
        Ok(())
    }

    #[tokio::test]
    async fn navigation_failure_is_isolated() {
        let page = FakePage::new();
        let links: Vec<_> = (1..=2).map(link).collect();
        page.fail_navigation(&links[0].href);
        minimal_listing(&page, &links[1].href);
        let settings = ScrapeSettings::instant();
        let profile = SelectorProfile::default();
        let mut sink = MemorySink::default();

        let (log, report) = DetailScraper::new(&page, &settings, &profile)
            .scrape_all(&links, RecordLog::new(), &mut sink)
            .await;

        assert_eq!(report.failed, vec![links[0].href.clone()]);
        assert_eq!(log.len(), 1);
        assert!(log.contains(&links[1].href));
    }

    #[tokio::test]
    async fn second_run_with_persisted_log_is_a_no_op() {
        let page = FakePage::new();
        let links: Vec<_> = (1..=3).map(link).collect();
        for link in &links {
            minimal_listing(&page, &link.href);
        }
        let settings = ScrapeSettings::instant();
        let profile = SelectorProfile::default();
        let scraper = DetailScraper::new(&page, &settings, &profile);

        let mut first_sink = MemorySink::default();
        let (first_log, _) = scraper
            .scrape_all(&links, RecordLog::new(), &mut first_sink)
            .await;
        let navigations_after_first = page.navigations().len();

        let mut second_sink = MemorySink::default();
        let (second_log, report) = scraper
            .scrape_all(&links, first_log.clone(), &mut second_sink)
            .await;

        assert_eq!(second_log, first_log);
        assert_eq!(page.navigations().len(), navigations_after_first);
        assert_eq!(report.skipped, 3);
        assert!(second_sink.snapshots.is_empty());
    }

    #[tokio::test]
    async fn duplicate_links_are_scraped_once() {
        let page = FakePage::new();
        let links = vec![link(1), link(1)];
        minimal_listing(&page, &links[0].href);
        let settings = ScrapeSettings::instant();
        let profile = SelectorProfile::default();
        let mut sink = MemorySink::default();

        let (log, report) = DetailScraper::new(&page, &settings, &profile)
            .scrape_all(&links, RecordLog::new(), &mut sink)
            .await;

        assert_eq!(log.len(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(page.navigations().len(), 1);
    }
}
