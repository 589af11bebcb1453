use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::queries::{list_entries, ListEntriesQuery};
use crate::cache::CacheIndex;
use crate::error::AppError;

pub fn cache_routes() -> Router<CacheIndex> {
    Router::new()
        .route("/", get(list_dates))
        .route("/:date", get(get_partition))
}

/// GET /cache
async fn list_dates(State(cache): State<CacheIndex>) -> Result<Response, AppError> {
    let response = list_entries::handle_dates(&cache).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// GET /cache/:date
async fn get_partition(
    State(cache): State<CacheIndex>,
    Path(date): Path<String>,
) -> Result<Response, AppError> {
    let response = list_entries::handle(&cache, ListEntriesQuery { date }).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}
