use crate::{
    detection::{ClientInfo, UploadedImage},
    error::ApiError,
    prediction::{BatchItem, BatchResponse, PredictionResponse},
    server::SharedState,
};
use axum::{
    extract::{multipart::{Field, MultipartRejection}, ConnectInfo, Multipart, State},
    http::{header, HeaderMap},
    Json,
};
use std::{net::SocketAddr, time::Instant};
use tracing::instrument;

async fn read_image(field: Field<'_>) -> Result<UploadedImage, ApiError> {
    let original_filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await?;

    Ok(UploadedImage {
        original_filename,
        content_type,
        bytes,
    })
}

/// A body that is not multipart at all has no file part to speak of.
fn rejected(message: &str, rejection: MultipartRejection) -> ApiError {
    tracing::debug!("Multipart body rejected: {}", rejection.body_text());
    ApiError::BadRequest(message.to_string())
}

fn client_info(addr: SocketAddr, headers: &HeaderMap) -> ClientInfo {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());

    ClientInfo {
        ip_address: forwarded.or_else(|| Some(addr.ip().to_string())),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

#[instrument(skip_all, fields(client = %addr))]
pub async fn predict(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    state.metrics.record_request("/predict");

    let mut multipart = multipart.map_err(|e| rejected("No file part", e))?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            upload = Some(read_image(field).await?);
            break;
        }
    }

    let image = upload.ok_or_else(|| ApiError::BadRequest("No file part".into()))?;
    if image.original_filename.is_empty() {
        return Err(ApiError::BadRequest("No selected file".into()));
    }

    let started = Instant::now();
    let result = state
        .detection
        .process(image, &client_info(addr, &headers))
        .await;

    state
        .metrics
        .record_prediction_duration(started.elapsed().as_millis() as u64, "/predict");
    match &result {
        Ok(prediction) => state.metrics.record_prediction(prediction.label.as_str()),
        Err(_) => state.metrics.record_prediction("failed"),
    }

    Ok(Json(result?))
}

#[instrument(skip_all, fields(client = %addr))]
pub async fn predict_multiple(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    state.metrics.record_request("/predict_multiple");

    let mut multipart = multipart.map_err(|e| rejected("No files part", e))?;
    let mut images = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("files") {
            images.push(read_image(field).await?);
        }
    }

    if images.is_empty() {
        return Err(ApiError::BadRequest("No files part".into()));
    }

    let total_files = images.len();
    let images: Vec<UploadedImage> = images
        .into_iter()
        .filter(|image| !image.original_filename.is_empty())
        .collect();
    if images.is_empty() {
        return Err(ApiError::BadRequest("No selected files".into()));
    }

    let max_files = state.detection.upload_config().max_files;
    if images.len() > max_files {
        return Err(ApiError::BadRequest(format!(
            "Too many files: at most {} images per request",
            max_files
        )));
    }

    let started = Instant::now();
    let batch = state
        .detection
        .process_batch(total_files, images, &client_info(addr, &headers))
        .await;

    state
        .metrics
        .record_prediction_duration(started.elapsed().as_millis() as u64, "/predict_multiple");
    for item in &batch.results {
        match item {
            BatchItem::Success { prediction, .. } => {
                state.metrics.record_prediction(prediction.label.as_str())
            }
            BatchItem::Failed { .. } => {
                state.metrics.record_prediction("failed")
            }
        }
    }

    tracing::info!(
        "Batch of {} processed: {} succeeded, {} failed",
        batch.total_files,
        batch.successful_predictions,
        batch.failed_predictions
    );

    Ok(Json(batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_info_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 10.0.0.1"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));

        let info = client_info("127.0.0.1:4000".parse().unwrap(), &headers);
        assert_eq!(info.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));

        let info = client_info("127.0.0.1:4000".parse().unwrap(), &HeaderMap::new());
        assert_eq!(info.ip_address.as_deref(), Some("127.0.0.1"));
        assert!(info.user_agent.is_none());
    }
}
