use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionLabel {
    Real,
    Fake,
    NotCurrency,
}

impl PredictionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionLabel::Real => "real",
            PredictionLabel::Fake => "fake",
            PredictionLabel::NotCurrency => "not_currency",
        }
    }

    /// Human readable verdict returned next to the raw label.
    pub fn message(&self) -> &'static str {
        match self {
            PredictionLabel::Real => "✅ This is a Real PKR Currency Note.",
            PredictionLabel::Fake => "❌ This is a Fake PKR Currency Note.",
            PredictionLabel::NotCurrency => {
                "🚫 This is not a currency image. Please upload a valid PKR note."
            }
        }
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "real" => Ok(Self::Real),
            "fake" => Ok(Self::Fake),
            "not_currency" => Ok(Self::NotCurrency),
            other => Err(format!("Unknown prediction label `{}`", other)),
        }
    }
}

/// What the inference service answers for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: PredictionLabel,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub filename: String,
    pub prediction: String,
    pub label: PredictionLabel,
    pub confidence: f64,
    pub processing_time: f64,
    pub upload_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    Success {
        #[serde(flatten)]
        prediction: PredictionResponse,
        status: ItemStatus,
    },
    Failed {
        filename: String,
        error: String,
        status: ItemStatus,
    },
}

impl BatchItem {
    pub fn success(prediction: PredictionResponse) -> Self {
        BatchItem::Success {
            prediction,
            status: ItemStatus::Success,
        }
    }

    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        BatchItem::Failed {
            filename: filename.into(),
            error: error.into(),
            status: ItemStatus::Failed,
        }
    }

    pub fn status(&self) -> ItemStatus {
        match self {
            BatchItem::Success { status, .. } | BatchItem::Failed { status, .. } => *status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub total_files: usize,
    pub successful_predictions: usize,
    pub failed_predictions: usize,
    pub results: Vec<BatchItem>,
}

impl BatchResponse {
    pub fn new(total_files: usize, results: Vec<BatchItem>) -> Self {
        let successful_predictions = results
            .iter()
            .filter(|r| r.status() == ItemStatus::Success)
            .count();
        let failed_predictions = results.len() - successful_predictions;
        Self {
            total_files,
            successful_predictions,
            failed_predictions,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing() {
        assert_eq!("REAL".parse::<PredictionLabel>(), Ok(PredictionLabel::Real));
        assert_eq!(
            "not_currency".parse::<PredictionLabel>(),
            Ok(PredictionLabel::NotCurrency)
        );
        assert!("counterfeit".parse::<PredictionLabel>().is_err());
    }

    #[test]
    fn test_batch_item_serialization() {
        let ok = BatchItem::success(PredictionResponse {
            filename: "note.jpg".into(),
            prediction: PredictionLabel::Fake.message().into(),
            label: PredictionLabel::Fake,
            confidence: 0.91,
            processing_time: 0.2,
            upload_id: "abc".into(),
        });
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["label"], "fake");
        assert_eq!(value["status"], "success");
        assert_eq!(value["upload_id"], "abc");

        let failed = BatchItem::failed("doc.pdf", "File extension 'pdf' not allowed");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "File extension 'pdf' not allowed");
    }

    #[test]
    fn test_batch_counts() {
        let batch = BatchResponse::new(
            3,
            vec![
                BatchItem::failed("a.txt", "bad"),
                BatchItem::failed("b.txt", "bad"),
            ],
        );
        assert_eq!(batch.total_files, 3);
        assert_eq!(batch.successful_predictions, 0);
        assert_eq!(batch.failed_predictions, 2);
    }
}
