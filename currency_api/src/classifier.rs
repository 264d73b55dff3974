use crate::{
    config::InferenceServiceConfig,
    prediction::{Classification, PredictionLabel},
};
use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Inference service unreachable: {0}")]
    Unavailable(#[source] reqwest::Error),
    #[error("Inference request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Inference service answered {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected inference response: {0}")]
    InvalidResponse(String),
}

impl ClassifierError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClassifierError::Unavailable(_))
    }
}

/// Image bytes as received from the uploader.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Anything able to label a currency image.
pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, image: ImagePayload)
        -> BoxFuture<'_, Result<Classification, ClassifierError>>;

    /// Whether a model is currently loaded and answering.
    fn is_ready(&self) -> BoxFuture<'_, bool>;
}

#[derive(Deserialize)]
struct InferenceReply {
    label: String,
    confidence: f64,
}

#[derive(Deserialize)]
struct InferenceErrorReply {
    error: String,
}

pub struct HttpClassifier {
    client: reqwest::Client,
    predict_url: String,
    health_url: String,
}

impl HttpClassifier {
    pub fn new(config: &InferenceServiceConfig) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            predict_url: config.predict_url(),
            health_url: config.health_url(),
        })
    }

    #[instrument(skip(self, image), fields(filename = %image.filename, size = image.bytes.len()))]
    async fn post_image(&self, image: ImagePayload) -> Result<Classification, ClassifierError> {
        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.filename)
            .mime_str(&image.mime_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.predict_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ClassifierError::Unavailable(e)
                } else {
                    ClassifierError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<InferenceErrorReply>(&body)
                .map(|reply| reply.error)
                .unwrap_or(body);
            return Err(ClassifierError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let reply: InferenceReply = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        parse_reply(reply)
    }

    async fn check_health(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Inference health check failed: {:?}", e);
                false
            }
        }
    }
}

fn parse_reply(reply: InferenceReply) -> Result<Classification, ClassifierError> {
    let label: PredictionLabel = reply
        .label
        .parse()
        .map_err(ClassifierError::InvalidResponse)?;

    if !(0.0..=1.0).contains(&reply.confidence) {
        return Err(ClassifierError::InvalidResponse(format!(
            "confidence {} outside of [0, 1]",
            reply.confidence
        )));
    }

    Ok(Classification {
        label,
        confidence: reply.confidence,
    })
}

impl Classifier for HttpClassifier {
    fn classify(
        &self,
        image: ImagePayload,
    ) -> BoxFuture<'_, Result<Classification, ClassifierError>> {
        Box::pin(self.post_image(image))
    }

    fn is_ready(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.check_health())
    }
}

/// Polls the classifier with exponential backoff until it reports ready.
pub async fn wait_until_ready(classifier: &dyn Classifier, max_retries: u32) -> bool {
    let mut retry_delay = Duration::from_millis(50);
    let max_retry_delay = Duration::from_secs(1);

    for attempt in 0..=max_retries {
        if classifier.is_ready().await {
            return true;
        }
        if attempt == max_retries {
            break;
        }
        tracing::warn!(
            "Inference service not ready (attempt {}/{})",
            attempt + 1,
            max_retries + 1
        );

        let jitter = rand::random::<f32>() * 0.2 + 0.9;
        sleep(retry_delay.mul_f32(jitter)).await;
        retry_delay = (retry_delay * 2).min(max_retry_delay);
    }

    false
}
