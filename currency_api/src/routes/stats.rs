use crate::{
    error::ApiError,
    server::SharedState,
    store::{run_blocking, UploadStats},
};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Active,
    Inactive,
}

#[derive(Debug, Serialize)]
pub struct ModelStats {
    #[serde(flatten)]
    pub uploads: UploadStats,
    pub model_status: ModelStatus,
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

#[instrument(skip(state))]
pub async fn model_stats(State(state): State<SharedState>) -> Result<Json<ModelStats>, ApiError> {
    state.metrics.record_request("/model_stats");

    let since = start_of_day(Utc::now());
    let uploads = run_blocking(state.detection.store(), move |store| store.stats(since));
    let (uploads, ready) = tokio::join!(uploads, state.detection.classifier().is_ready());

    Ok(Json(ModelStats {
        uploads: uploads?,
        model_status: if ready {
            ModelStatus::Active
        } else {
            ModelStatus::Inactive
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 17, 45, 12).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap()
        );
    }
}
