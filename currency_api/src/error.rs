use crate::{classifier::ClassifierError, config::Environment, store::StoreError};
use axum::{
    body::Body,
    extract::{multipart::MultipartError, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Upload not found")]
    NotFound,
    #[error("Model not loaded")]
    ModelUnavailable(#[source] ClassifierError),
    #[error("Prediction failed: {0}")]
    PredictionFailed(#[source] ClassifierError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::PredictionFailed(_)
            | ApiError::Storage(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stack(&self) -> String {
        let mut lines = vec![format!("{:?}", self)];
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            lines.push(format!("caused by: {}", err));
            source = err.source();
        }
        lines.join("\n")
    }
}

/// Attached to error responses so the rendering middleware can decide on the stack.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub stack: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    stack: Option<&'a str>,
}

fn error_response(status: StatusCode, message: &str, stack: Option<&str>) -> Response {
    // Never report an error with a success status.
    let status = if status == StatusCode::OK {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        status
    };
    let body = ErrorBody {
        error: message,
        message,
        stack,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        if self.status().is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(error = %message, "Request rejected");
        }
        let report = ErrorReport {
            stack: self.stack(),
            message: message.clone(),
        };
        let mut response = error_response(self.status(), &message, None);
        response.extensions_mut().insert(report);
        response
    }
}

pub async fn render_errors(
    State(environment): State<Environment>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return wrap_plain_error(response).await;
    };

    if !environment.exposes_stack() {
        return response;
    }

    error_response(response.status(), &report.message, Some(&report.stack))
}

/// Rejections produced by axum itself (routing, extractors, body limits) come
/// back as plain text; give them the same JSON shape as `ApiError`.
async fn wrap_plain_error(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let (parts, body) = response.into_parts();
    let text = axum::body::to_bytes(body, PLAIN_ERROR_LIMIT)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();
    let message = if text.is_empty() {
        status.canonical_reason().unwrap_or("Request failed").to_string()
    } else {
        text
    };

    let mut wrapped = error_response(status, &message, None);
    for name in [header::ALLOW, header::RETRY_AFTER] {
        if let Some(value) = parts.headers.get(&name) {
            wrapped.headers_mut().insert(name, value.clone());
        }
    }
    wrapped
}

const PLAIN_ERROR_LIMIT: usize = 64 * 1024;
