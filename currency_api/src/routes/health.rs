use crate::{server::SharedState, store::run_blocking};
use axum::{extract::State, response::IntoResponse, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
pub struct Status {
    status: &'static str,
    timestamp: DateTime<Utc>,
    model_loaded: bool,
    database_connected: bool,
}

pub async fn healthcheck(State(state): State<SharedState>) -> impl IntoResponse {
    state.metrics.record_request("/health");

    let database = run_blocking(state.detection.store(), |store| Ok(store.ping()));
    let (database_connected, model_loaded) =
        tokio::join!(database, state.detection.classifier().is_ready());

    Json(Status {
        status: "healthy",
        timestamp: Utc::now(),
        model_loaded,
        database_connected: database_connected.unwrap_or(false),
    })
}

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Pakistani Currency Detection API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active",
        "endpoints": {
            "predict": "/predict",
            "predict_multiple": "/predict_multiple",
            "upload_history": "/upload_history",
            "model_stats": "/model_stats",
            "health": "/health",
            "uploads": "/uploads/{filename}"
        }
    }))
}
