use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::app::job_store::JobStore;
use crate::app::model::{Job, JobStatus, StartJobRequest, StartJobResponse};
use crate::app::queue::InProcessQueue;
use crate::app::runner::JobRunner;
use crate::settings::keyword_key;

#[derive(Clone)]
pub struct AppState {
    /// Shared output directory, so a later job for the same key resumes.
    pub out_dir: PathBuf,
    pub job_store: Arc<dyn JobStore>,
    pub queue: InProcessQueue,
    pub runner: Arc<JobRunner>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/scrape", post(start_scrape))
        .route("/jobs/:job_id", get(get_job))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn start_scrape(
    State(state): State<AppState>,
    Json(request): Json<StartJobRequest>,
) -> Result<(StatusCode, Json<StartJobResponse>), (StatusCode, String)> {
    let keyword = request.keyword.trim().to_owned();
    if keyword.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "keyword is required".to_owned()));
    }
    let key = request
        .key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| keyword_key(&keyword));

    let job_id = uuid::Uuid::new_v4().to_string();
    let job = Job {
        job_id: job_id.clone(),
        status: JobStatus::Queued,
        message: "queued".to_owned(),
        created_at: chrono::Utc::now(),
        started_at: None,
        finished_at: None,
        keyword: keyword.clone(),
        key: key.clone(),
        out_dir: state.out_dir.clone(),
        cleaned_path: None,
        summary: None,
    };
    let request = StartJobRequest {
        keyword,
        key: Some(key.clone()),
        skip_collect: request.skip_collect,
    };
    state.job_store.create(&job, &request).await.map_err(|err| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("create job: {err:#}"),
        )
    })?;

    let runner = Arc::clone(&state.runner);
    let job_id_for_task = job_id.clone();
    state.queue.spawn(async move {
        runner.run_job(&job_id_for_task).await;
    });
    tracing::info!(job_id = %job_id, key = %key, "job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartJobResponse {
            job_id,
            key,
            message: "Scraping started in the background.".to_owned(),
        }),
    ))
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, StatusCode> {
    if uuid::Uuid::parse_str(job_id.trim()).is_err() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let Some(job) = state
        .job_store
        .get(&job_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    else {
        return Err(StatusCode::NOT_FOUND);
    };
    Ok(Json(job))
}
