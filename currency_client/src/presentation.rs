use crate::models::{HistoryEntry, PredictionResult};
use std::fmt;

pub const NO_RESULT: &str = "No prediction result available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCategory {
    Real,
    Fake,
    NotCurrency,
}

impl ResultCategory {
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::to_lowercase).as_deref() {
            Some("real") => ResultCategory::Real,
            Some("fake") => ResultCategory::Fake,
            _ => ResultCategory::NotCurrency,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ResultCategory::Real => "✅",
            ResultCategory::Fake => "❌",
            ResultCategory::NotCurrency => "🚫",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ResultCategory::Real => "success",
            ResultCategory::Fake => "error",
            ResultCategory::NotCurrency => "warning",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            ResultCategory::Real => "Real Currency",
            ResultCategory::Fake => "Fake Currency",
            ResultCategory::NotCurrency => "Not a Currency",
        }
    }
}

/// Display model of one prediction card.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub filename: String,
    pub category: ResultCategory,
    pub confidence: Option<String>,
    pub processing_time: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
}

impl ResultView {
    pub fn from_result(result: &PredictionResult) -> Option<Self> {
        if result.label.is_none() && result.error.is_none() {
            return None;
        }

        Some(Self {
            filename: result.filename.clone().unwrap_or_default(),
            category: ResultCategory::from_label(result.label.as_deref()),
            confidence: result.confidence.map(format_confidence),
            processing_time: result.processing_time.map(format_seconds),
            status: result.status.clone(),
            error: result.error.clone(),
        })
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = &self.error {
            return write!(
                f,
                "⚠️ {}: {} [{}]",
                self.filename,
                error,
                self.status.as_deref().unwrap_or("failed")
            );
        }

        write!(
            f,
            "{} {}: {}",
            self.category.icon(),
            self.filename,
            self.category.text()
        )?;
        if let Some(confidence) = &self.confidence {
            write!(f, " (confidence {})", confidence)?;
        }
        if let Some(time) = &self.processing_time {
            write!(f, " in {}", time)?;
        }
        if let Some(status) = &self.status {
            write!(f, " [{}]", status)?;
        }
        Ok(())
    }
}

pub fn render_result(result: Option<&PredictionResult>) -> String {
    result
        .and_then(ResultView::from_result)
        .map(|view| view.to_string())
        .unwrap_or_else(|| NO_RESULT.to_string())
}

pub fn render_history_row(entry: &HistoryEntry) -> String {
    let category = ResultCategory::from_label(entry.prediction_result.as_deref());
    let verdict = match &entry.error {
        Some(error) => format!("failed: {}", error),
        None => format!("{} {}", category.icon(), category.text()),
    };

    format!(
        "{:<36}  {:<30}  {:<22}  {:>7}  {:>9}  {}",
        entry.id,
        entry.original_filename,
        verdict,
        entry
            .confidence_score
            .map(format_confidence)
            .unwrap_or_else(|| "-".into()),
        format_file_size(entry.file_size),
        entry.upload_timestamp.as_deref().unwrap_or("-"),
    )
}

pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

pub fn format_seconds(seconds: f64) -> String {
    format!("{:.3}s", seconds)
}

/// Human readable size using powers of 1024.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;

    format!("{} {}", rounded, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: Option<&str>) -> PredictionResult {
        PredictionResult {
            filename: Some("note.jpg".into()),
            label: label.map(String::from),
            confidence: Some(0.9734),
            processing_time: Some(0.12345),
            ..PredictionResult::default()
        }
    }

    #[test]
    fn test_category_from_label() {
        assert_eq!(ResultCategory::from_label(Some("real")), ResultCategory::Real);
        assert_eq!(ResultCategory::from_label(Some("FAKE")), ResultCategory::Fake);
        assert_eq!(
            ResultCategory::from_label(Some("not_currency")),
            ResultCategory::NotCurrency
        );
        assert_eq!(
            ResultCategory::from_label(Some("coin")),
            ResultCategory::NotCurrency
        );
        assert_eq!(ResultCategory::from_label(None), ResultCategory::NotCurrency);

        assert_eq!(ResultCategory::NotCurrency.icon(), "🚫");
        assert_eq!(ResultCategory::Fake.color(), "error");
        assert_eq!(ResultCategory::Real.text(), "Real Currency");
    }

    #[test]
    fn test_render_result() {
        assert_eq!(
            render_result(Some(&result(Some("real")))),
            "✅ note.jpg: Real Currency (confidence 97.3%) in 0.123s"
        );
        assert_eq!(render_result(None), NO_RESULT);

        let batch_item = PredictionResult {
            status: Some("success".into()),
            ..result(Some("fake"))
        };
        assert_eq!(
            render_result(Some(&batch_item)),
            "❌ note.jpg: Fake Currency (confidence 97.3%) in 0.123s [success]"
        );
        assert_eq!(render_result(Some(&result(None))), NO_RESULT);
    }

    #[test]
    fn test_render_failed_item() {
        let failed = PredictionResult {
            filename: Some("bad.jpg".into()),
            error: Some("Model not loaded".into()),
            status: Some("failed".into()),
            ..PredictionResult::default()
        };
        assert_eq!(
            render_result(Some(&failed)),
            "⚠️ bad.jpg: Model not loaded [failed]"
        );
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(16 * 1024 * 1024), "16 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
    }
}
