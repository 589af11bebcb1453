use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{
    commands::{extract, ExtractCommand},
    queries::{download, get_job, list_jobs, DownloadQuery, GetJobQuery, ListJobsQuery},
};
use crate::error::AppError;
use crate::features::FeatureState;

pub fn data_routes() -> Router<FeatureState> {
    Router::new()
        .route("/extract", post(extract_data))
        .route("/:job_id/download", get(download_data))
}

pub fn jobs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(list_all_jobs))
        .route("/:job_id", get(get_job_status))
}

/// POST /data/extract
///
/// 201 for a fresh extraction, 200 when served from the cache.
async fn extract_data(
    State(state): State<FeatureState>,
    body: Result<Json<ExtractCommand>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(command) = body.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Rejected extract request body");
        AppError::bad_request("Missing endpoint parameter", rejection.body_text())
    })?;

    let response = extract::handle(&state.service, &state.jobs, command).await?;

    let status = if response.cache_hit {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(response)).into_response())
}

/// GET /jobs?status=failed&limit=50&offset=0
async fn list_all_jobs(
    State(state): State<FeatureState>,
    Query(query): Query<ListJobsQuery>,
) -> Response {
    let response = list_jobs::handle(&state.jobs, query).await;
    (StatusCode::OK, Json(response)).into_response()
}

/// GET /jobs/:job_id
async fn get_job_status(
    State(state): State<FeatureState>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let job = get_job::handle(&state.jobs, GetJobQuery { job_id }).await?;
    Ok((StatusCode::OK, Json(job)).into_response())
}

/// GET /data/:job_id/download
async fn download_data(
    State(state): State<FeatureState>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let response = download::handle(&state.service, &state.jobs, DownloadQuery { job_id }).await?;

    tracing::debug!(
        job_id = %response.job_id,
        expires_in = response.expires_in,
        "Download URL generated"
    );

    Ok((StatusCode::OK, Json(response)).into_response())
}
