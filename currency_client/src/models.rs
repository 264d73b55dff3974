use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One prediction as returned by `/predict`, or one item of a batch.
/// Failed batch items only carry `filename`, `error` and `status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    #[serde(default)]
    pub results: Vec<PredictionResult>,
    #[serde(default)]
    pub successful_predictions: usize,
    #[serde(default)]
    pub failed_predictions: usize,
    #[serde(default)]
    pub total_files: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub original_filename: String,
    #[serde(default)]
    pub prediction_result: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub upload_timestamp: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub uploads: Vec<HistoryEntry>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub total_uploads: u64,
    pub uploads_today: u64,
    pub average_processing_time: f64,
    pub model_status: String,
    #[serde(default)]
    pub predictions_distribution: BTreeMap<String, u64>,
}

impl ModelStats {
    pub fn is_active(&self) -> bool {
        self.model_status == "active"
    }
}
