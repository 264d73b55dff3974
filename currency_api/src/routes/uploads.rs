use crate::{error::ApiError, server::SharedState, storage::content_type_for};
use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
};
use tracing::instrument;

#[instrument(skip(state))]
pub async fn serve_upload(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state
        .detection
        .files()
        .read(&filename)
        .await?
        .ok_or(ApiError::NotFound)?;

    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(Body::from(bytes))
        .map_err(|e| ApiError::Internal(format!("HTTP builder failed: {}", e)))
}
