use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::Utc;

use crate::app::job_store::JobStore;
use crate::app::model::{Job, JobStatus};
use crate::pipeline::{JobSummary, ScrapeJob};

/// Runs one scrape job to completion.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &ScrapeJob) -> anyhow::Result<JobSummary>;
}

/// Launches a real browser per job.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserExecutor;

#[async_trait]
impl JobExecutor for BrowserExecutor {
    async fn execute(&self, job: &ScrapeJob) -> anyhow::Result<JobSummary> {
        crate::pipeline::run_job(job).await
    }
}

pub struct JobRunner {
    job_store: Arc<dyn JobStore>,
    executor: Arc<dyn JobExecutor>,
}

impl JobRunner {
    pub fn new(job_store: Arc<dyn JobStore>, executor: Arc<dyn JobExecutor>) -> Self {
        Self {
            job_store,
            executor,
        }
    }

    pub async fn run_job(&self, job_id: &str) {
        if let Err(err) = self.try_run_job(job_id).await {
            tracing::error!(job_id, ?err, "job failed");
            if let Err(err) = self.mark_error(job_id, format!("{err:#}")).await {
                tracing::error!(job_id, ?err, "failed to record job error");
            }
        }
    }

    async fn try_run_job(&self, job_id: &str) -> anyhow::Result<()> {
        let mut job = self
            .job_store
            .get(job_id)
            .await
            .context("load job")?
            .ok_or_else(|| anyhow::anyhow!("job not found: {job_id}"))?;
        let request = self
            .job_store
            .get_request(job_id)
            .await
            .context("load request")?
            .ok_or_else(|| anyhow::anyhow!("request not found: {job_id}"))?;

        self.mark_running(&mut job).await.context("mark running")?;

        let scrape_job = ScrapeJob {
            key: job.key.clone(),
            skip_collect: request.skip_collect,
            ..ScrapeJob::new(&job.keyword, &job.out_dir)
        };
        let summary = self.executor.execute(&scrape_job).await?;

        job.status = JobStatus::Done;
        job.message = format!(
            "scraped {} listings ({} already done, {} failed)",
            summary.scraped, summary.skipped, summary.failed
        );
        job.finished_at = Some(Utc::now());
        job.cleaned_path = summary.cleaned_path.clone();
        job.summary = Some(summary);

        self.job_store.put(&job).await.context("save job")?;
        tracing::info!(job_id, key = %job.key, "job done");
        Ok(())
    }

    async fn mark_running(&self, job: &mut Job) -> anyhow::Result<()> {
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        job.message = "scraping".to_owned();
        self.job_store.put(job).await.context("save job")?;
        Ok(())
    }

    async fn mark_error(&self, job_id: &str, message: String) -> anyhow::Result<()> {
        let Some(mut job) = self.job_store.get(job_id).await? else {
            return Ok(());
        };
        job.status = JobStatus::Error;
        job.message = message;
        job.finished_at = Some(Utc::now());
        self.job_store.put(&job).await?;
        Ok(())
    }
}
