//! Stage orchestration: collect, details and normalize, sharing one browser.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::browser::BrowserSession;
use crate::cli::{BrowserArgs, CollectArgs, DetailsArgs, NormalizeArgs, RunArgs};
use crate::details::{DetailScraper, ScrapeReport};
use crate::driver::PageHandle;
use crate::formats::ListingLink;
use crate::links::{extract_links, latest_links_file, load_links, write_links};
use crate::record_log::{JsonFileSink, RecordSink as _, load_record_log};
use crate::scroll::ScrollController;
use crate::settings::{
    ScrapeSettings, SelectorProfile, cleaned_path, keyword_key, raw_log_path, search_url,
};

/// Everything one scrape job needs to know.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub keyword: String,
    pub key: String,
    pub out_dir: PathBuf,
    pub skip_collect: bool,
    pub settings: ScrapeSettings,
    pub profile: SelectorProfile,
}

impl ScrapeJob {
    pub fn new(keyword: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        let keyword = keyword.into();
        Self {
            key: keyword_key(&keyword),
            keyword,
            out_dir: out_dir.into(),
            skip_collect: false,
            settings: ScrapeSettings::default(),
            profile: SelectorProfile::default(),
        }
    }

    pub fn raw_log_path(&self) -> PathBuf {
        raw_log_path(&self.out_dir, &self.key)
    }

    pub fn cleaned_path(&self) -> PathBuf {
        cleaned_path(&self.out_dir, &self.key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub key: String,
    pub links: usize,
    pub scraped: usize,
    pub skipped: usize,
    pub failed: usize,
    pub normalized: usize,
    pub links_path: Option<PathBuf>,
    pub raw_log_path: PathBuf,
    pub cleaned_path: Option<PathBuf>,
}

/// Scrolls the feed for `job.keyword`, harvests the listing links and writes
/// them to a timestamped links file.
pub async fn collect_links<H: PageHandle>(
    handle: &H,
    job: &ScrapeJob,
) -> anyhow::Result<(Vec<ListingLink>, PathBuf)> {
    let url = search_url(&job.keyword)?;
    tracing::info!(keyword = %job.keyword, url = %url, "collect: open search");
    handle.navigate(url.as_str()).await.context("open search page")?;

    let outcome = ScrollController::new(handle, &job.settings, &job.profile)
        .scroll_to_end()
        .await?;
    tracing::debug!(?outcome, "collect: scroll done");

    let links = extract_links(handle, &job.settings, &job.profile).await?;
    let path = write_links(&job.out_dir, &links, chrono::Local::now().naive_local())?;
    tracing::info!(links = links.len(), path = %path.display(), "collect: links written");
    Ok((links, path))
}

/// Scrapes `links` into the job's record log, resuming from whatever the log
/// already holds. The log is rewritten once more at the end, so the file is
/// valid JSON afterwards even when nothing new was saved.
pub async fn scrape_details<H: PageHandle>(
    handle: &H,
    job: &ScrapeJob,
    links: &[ListingLink],
) -> anyhow::Result<ScrapeReport> {
    let raw_path = job.raw_log_path();
    let log = load_record_log(&raw_path);
    let mut sink = JsonFileSink::new(&raw_path);

    let (log, report) = DetailScraper::new(handle, &job.settings, &job.profile)
        .scrape_all(links, log, &mut sink)
        .await;

    sink.persist(log.records()).context("write record log")?;
    Ok(report)
}

/// Collect (unless skipped) and details on an already open page.
pub async fn scrape<H: PageHandle>(handle: &H, job: &ScrapeJob) -> anyhow::Result<JobSummary> {
    let (links, links_path) = if job.skip_collect {
        let path = latest_links_file(&job.out_dir)?;
        tracing::info!(path = %path.display(), "details: resuming from links file");
        (load_links(&path)?, path)
    } else {
        collect_links(handle, job).await.context("collect")?
    };

    let report = scrape_details(handle, job, &links).await.context("details")?;
    Ok(JobSummary {
        key: job.key.clone(),
        links: links.len(),
        scraped: report.scraped,
        skipped: report.skipped,
        failed: report.failed.len(),
        normalized: 0,
        links_path: Some(links_path),
        raw_log_path: job.raw_log_path(),
        cleaned_path: None,
    })
}

/// The whole job: launch a browser, scrape, always close the browser, then
/// normalize the record log into the cleaned file.
pub async fn run_job(job: &ScrapeJob) -> anyhow::Result<JobSummary> {
    let session = BrowserSession::launch(&job.settings)
        .await
        .context("launch browser")?;
    let scraped = scrape(session.page(), job).await;
    session.close().await;
    let mut summary = scraped?;

    let cleaned = job.cleaned_path();
    summary.normalized = crate::normalize::run(&summary.raw_log_path, Some(&cleaned))
        .context("normalize")?;
    summary.cleaned_path = Some(cleaned);

    tracing::info!(
        key = %summary.key,
        links = summary.links,
        scraped = summary.scraped,
        skipped = summary.skipped,
        failed = summary.failed,
        "job finished"
    );
    Ok(summary)
}

fn settings_for(browser: &BrowserArgs) -> ScrapeSettings {
    ScrapeSettings {
        headless: !browser.headed,
        ..ScrapeSettings::default()
    }
}

fn profile_for(browser: &BrowserArgs) -> anyhow::Result<SelectorProfile> {
    SelectorProfile::load(browser.profile.as_deref().map(Path::new))
}

pub async fn run(args: RunArgs) -> anyhow::Result<JobSummary> {
    let mut job = ScrapeJob::new(&args.keyword, &args.out);
    if let Some(key) = args.key {
        job.key = key;
    }
    job.skip_collect = args.skip_collect;
    job.settings = ScrapeSettings {
        max_scroll_loops: args.max_scroll_loops,
        ..settings_for(&args.browser)
    };
    job.profile = profile_for(&args.browser)?;

    run_job(&job).await
}

pub async fn collect(args: CollectArgs) -> anyhow::Result<PathBuf> {
    let mut job = ScrapeJob::new(&args.keyword, &args.out);
    job.settings = ScrapeSettings {
        max_scroll_loops: args.max_scroll_loops,
        filter_by_first_class: !args.no_class_filter,
        ..settings_for(&args.browser)
    };
    job.profile = profile_for(&args.browser)?;

    let session = BrowserSession::launch(&job.settings)
        .await
        .context("launch browser")?;
    let collected = collect_links(session.page(), &job).await;
    session.close().await;
    let (_, path) = collected?;
    Ok(path)
}

pub async fn details(args: DetailsArgs) -> anyhow::Result<ScrapeReport> {
    let mut job = ScrapeJob::new(&args.keyword, &args.out);
    if let Some(key) = args.key {
        job.key = key;
    }
    job.settings = settings_for(&args.browser);
    job.profile = profile_for(&args.browser)?;

    let links_path = match args.links {
        Some(path) => PathBuf::from(path),
        None => latest_links_file(&job.out_dir)?,
    };
    let links = load_links(&links_path)?;
    tracing::info!(path = %links_path.display(), links = links.len(), "details: links loaded");

    let session = BrowserSession::launch(&job.settings)
        .await
        .context("launch browser")?;
    let report = scrape_details(session.page(), &job, &links).await;
    session.close().await;
    report
}

pub fn normalize(args: NormalizeArgs) -> anyhow::Result<usize> {
    crate::normalize::run(Path::new(&args.input), args.out.as_deref().map(Path::new))
}
