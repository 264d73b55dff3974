mod health;
mod history;
mod metrics;
mod predict;
mod stats;
mod uploads;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub use health::{healthcheck, index};
pub use history::upload_history;
pub use metrics::metrics_handler;
pub use predict::{predict, predict_multiple};
pub use stats::model_stats;
pub use uploads::serve_upload;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(healthcheck))
        .route("/metrics", get(metrics_handler))
        .route("/predict", post(predict))
        .route("/predict_multiple", post(predict_multiple))
        .route("/upload_history", get(upload_history))
        .route("/model_stats", get(model_stats))
        .route("/uploads/{filename}", get(serve_upload))
}
