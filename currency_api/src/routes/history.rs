use crate::{
    config::HistoryConfig,
    error::ApiError,
    server::SharedState,
    store::{run_blocking, HistoryPage},
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::instrument;

/// Raw query values; anything unparsable falls back to the defaults.
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    page: Option<String>,
    per_page: Option<String>,
}

impl HistoryQuery {
    fn resolve(&self, config: &HistoryConfig) -> (u32, u32) {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1);
        let per_page = self
            .per_page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(config.default_per_page as i64)
            .min(config.max_per_page as i64);

        (page.min(u32::MAX as i64) as u32, per_page as u32)
    }
}

#[instrument(skip(state))]
pub async fn upload_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    state.metrics.record_request("/upload_history");

    let (page, per_page) = query.resolve(&state.history);
    let history =
        run_blocking(state.detection.store(), move |store| store.history(page, per_page)).await?;

    Ok(Json(history))
}
