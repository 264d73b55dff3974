use crate::{
    config::ApiConfig,
    error::ClientError,
    files::SelectedFile,
    models::{BatchPrediction, HistoryPage, ModelStats, PredictionResult},
};
use futures::future::BoxFuture;
use reqwest::{
    multipart::{Form, Part},
    Response,
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    PredictSingle,
    PredictMultiple,
    UploadHistory,
    ModelStats,
    HealthCheck,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::PredictSingle => "/predict",
            Endpoint::PredictMultiple => "/predict_multiple",
            Endpoint::UploadHistory => "/upload_history",
            Endpoint::ModelStats => "/model_stats",
            Endpoint::HealthCheck => "/health",
        }
    }
}

pub fn build_api_url(base_url: &str, endpoint: Endpoint) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), endpoint.path())
}

/// The calls the upload form and the history view make against the backend.
pub trait CurrencyApi: Send + Sync {
    fn predict_single<'a>(
        &'a self,
        file: &'a SelectedFile,
    ) -> BoxFuture<'a, Result<PredictionResult, ClientError>>;

    fn predict_multiple<'a>(
        &'a self,
        files: &'a [SelectedFile],
    ) -> BoxFuture<'a, Result<BatchPrediction, ClientError>>;

    fn upload_history(
        &self,
        page: u32,
        per_page: u32,
    ) -> BoxFuture<'_, Result<HistoryPage, ClientError>>;

    fn model_stats(&self) -> BoxFuture<'_, Result<ModelStats, ClientError>>;
}

#[derive(Deserialize)]
struct ServerError {
    error: Option<String>,
    message: Option<String>,
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, endpoint: Endpoint) -> String {
        build_api_url(&self.base_url, endpoint)
    }

    fn part(file: &SelectedFile) -> Result<Part, ClientError> {
        Ok(Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ServerError>(&body)
            .ok()
            .and_then(|e| e.error.or(e.message));

        tracing::warn!("Server responded {}: {:?}", status, message);

        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }

    #[instrument(skip(self, file), fields(file = %file.name))]
    async fn post_single(&self, file: &SelectedFile) -> Result<PredictionResult, ClientError> {
        let form = Form::new().part("file", Self::part(file)?);
        let response = self
            .client
            .post(self.url(Endpoint::PredictSingle))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, files), fields(count = files.len()))]
    async fn post_multiple(&self, files: &[SelectedFile]) -> Result<BatchPrediction, ClientError> {
        let mut form = Form::new();
        for file in files {
            form = form.part("files", Self::part(file)?);
        }
        let response = self
            .client
            .post(self.url(Endpoint::PredictMultiple))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn get_history(&self, page: u32, per_page: u32) -> Result<HistoryPage, ClientError> {
        let response = self
            .client
            .get(self.url(Endpoint::UploadHistory))
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_stats(&self) -> Result<ModelStats, ClientError> {
        let response = self.client.get(self.url(Endpoint::ModelStats)).send().await?;
        Self::decode(response).await
    }

    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        let response = self
            .client
            .get(self.url(Endpoint::HealthCheck))
            .send()
            .await?;
        Self::decode(response).await
    }
}

impl CurrencyApi for ApiClient {
    fn predict_single<'a>(
        &'a self,
        file: &'a SelectedFile,
    ) -> BoxFuture<'a, Result<PredictionResult, ClientError>> {
        Box::pin(self.post_single(file))
    }

    fn predict_multiple<'a>(
        &'a self,
        files: &'a [SelectedFile],
    ) -> BoxFuture<'a, Result<BatchPrediction, ClientError>> {
        Box::pin(self.post_multiple(files))
    }

    fn upload_history(
        &self,
        page: u32,
        per_page: u32,
    ) -> BoxFuture<'_, Result<HistoryPage, ClientError>> {
        Box::pin(self.get_history(page, per_page))
    }

    fn model_stats(&self) -> BoxFuture<'_, Result<ModelStats, ClientError>> {
        Box::pin(self.get_stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_api_url() {
        assert_eq!(
            build_api_url("http://localhost:5000/", Endpoint::PredictMultiple),
            "http://localhost:5000/predict_multiple"
        );
        assert_eq!(
            build_api_url("http://api", Endpoint::HealthCheck),
            "http://api/health"
        );
    }
}
