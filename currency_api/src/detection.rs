use crate::{
    classifier::{Classifier, ImagePayload},
    config::UploadConfig,
    error::ApiError,
    prediction::{BatchItem, BatchResponse, Classification, PredictionResponse},
    storage::{FileStorage, StoredFile},
    store::{run_blocking, UploadRecord, UploadStore},
    validation::{validate_image_file, ValidationError},
};
use bytes::Bytes;
use chrono::Utc;
use std::{sync::Arc, time::Instant};
use tracing::instrument;
use uuid::Uuid;

/// One file part pulled out of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub original_filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct DetectionService {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn UploadStore>,
    files: FileStorage,
    upload: UploadConfig,
}

impl DetectionService {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn UploadStore>,
        files: FileStorage,
        upload: UploadConfig,
    ) -> Self {
        Self {
            classifier,
            store,
            files,
            upload,
        }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn store(&self) -> Arc<dyn UploadStore> {
        self.store.clone()
    }

    pub fn files(&self) -> &FileStorage {
        &self.files
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.upload
    }

    #[instrument(skip(self, image, client), fields(filename = %image.original_filename))]
    pub async fn process(
        &self,
        image: UploadedImage,
        client: &ClientInfo,
    ) -> Result<PredictionResponse, ApiError> {
        validate_image_file(
            &self.upload,
            &image.original_filename,
            &image.content_type,
            image.bytes.len(),
        )
        .map_err(|e| match e {
            ValidationError::TooLarge { .. } => ApiError::PayloadTooLarge(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        })?;

        let started = Instant::now();
        let stored = self
            .files
            .save(&image.original_filename, &image.bytes)
            .await?;

        let payload = ImagePayload {
            filename: image.original_filename.clone(),
            mime_type: image.content_type.clone(),
            bytes: image.bytes.clone(),
        };

        let classification = match self.classifier.classify(payload).await {
            Ok(classification) => classification,
            Err(e) => {
                let processing_time = started.elapsed().as_secs_f64();
                let error = if e.is_unavailable() {
                    ApiError::ModelUnavailable(e)
                } else {
                    ApiError::PredictionFailed(e)
                };
                let record = self.record(&image, &stored, client, Err(&error), processing_time);
                self.persist(record).await?;
                return Err(error);
            }
        };

        let processing_time = started.elapsed().as_secs_f64();
        let record = self.record(
            &image,
            &stored,
            client,
            Ok(&classification),
            processing_time,
        );
        let upload_id = record.id.clone();
        self.persist(record).await?;

        tracing::info!(
            label = %classification.label,
            confidence = classification.confidence,
            processing_time,
            "Image classified"
        );

        Ok(PredictionResponse {
            filename: image.original_filename,
            prediction: classification.label.message().to_string(),
            label: classification.label,
            confidence: classification.confidence,
            processing_time,
            upload_id,
        })
    }

    /// Classifies every image independently; one failure never aborts the batch.
    pub async fn process_batch(
        &self,
        total_files: usize,
        images: Vec<UploadedImage>,
        client: &ClientInfo,
    ) -> BatchResponse {
        let mut results = Vec::with_capacity(images.len());

        for image in images {
            let filename = image.original_filename.clone();
            match self.process(image, client).await {
                Ok(prediction) => results.push(BatchItem::success(prediction)),
                Err(e) => {
                    tracing::warn!("Batch item {} failed: {}", filename, e);
                    results.push(BatchItem::failed(filename, e.to_string()));
                }
            }
        }

        BatchResponse::new(total_files, results)
    }

    fn record(
        &self,
        image: &UploadedImage,
        stored: &StoredFile,
        client: &ClientInfo,
        outcome: Result<&Classification, &ApiError>,
        processing_time: f64,
    ) -> UploadRecord {
        let (prediction_result, confidence_score, error) = match outcome {
            Ok(c) => (Some(c.label), Some(c.confidence), None),
            Err(e) => (None, None, Some(e.to_string())),
        };

        UploadRecord {
            id: Uuid::new_v4().to_string(),
            filename: stored.filename.clone(),
            original_filename: image.original_filename.clone(),
            file_path: stored.path.to_string_lossy().into_owned(),
            file_size: stored.size,
            mime_type: image.content_type.clone(),
            upload_timestamp: Utc::now(),
            prediction_result,
            confidence_score,
            processing_time: Some(processing_time),
            error,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        }
    }

    async fn persist(&self, record: UploadRecord) -> Result<(), ApiError> {
        run_blocking(self.store.clone(), move |store| store.insert(&record)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::ClassifierError, prediction::PredictionLabel, store::SqliteStore,
    };
    use futures::future::BoxFuture;

    struct MockClassifier {
        label: Option<PredictionLabel>,
    }

    impl Classifier for MockClassifier {
        fn classify(
            &self,
            _image: ImagePayload,
        ) -> BoxFuture<'_, Result<Classification, ClassifierError>> {
            Box::pin(async move {
                match self.label {
                    Some(label) => Ok(Classification {
                        label,
                        confidence: 0.93,
                    }),
                    None => Err(ClassifierError::Rejected {
                        status: 500,
                        message: "model exploded".into(),
                    }),
                }
            })
        }

        fn is_ready(&self) -> BoxFuture<'_, bool> {
            Box::pin(async { true })
        }
    }

    async fn service(label: Option<PredictionLabel>) -> (DetectionService, Arc<SqliteStore>) {
        let dir = std::env::temp_dir().join(format!("currency_detection_{}", Uuid::new_v4()));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let files = FileStorage::new(dir).await.unwrap();
        let service = DetectionService::new(
            Arc::new(MockClassifier { label }),
            store.clone(),
            files,
            UploadConfig::default(),
        );
        (service, store)
    }

    fn image(name: &str, content_type: &str) -> UploadedImage {
        UploadedImage {
            original_filename: name.to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from_static(b"\xff\xd8\xff\xe0fake-jpeg"),
        }
    }

    #[tokio::test]
    async fn test_process_persists_one_record() {
        let (service, store) = service(Some(PredictionLabel::Real)).await;

        let response = service
            .process(image("note.jpg", "image/jpeg"), &ClientInfo::default())
            .await
            .unwrap();

        assert_eq!(response.label, PredictionLabel::Real);
        assert_eq!(response.filename, "note.jpg");
        assert_eq!(response.prediction, PredictionLabel::Real.message());

        let saved = store.get(&response.upload_id).unwrap().unwrap();
        assert_eq!(saved.prediction_result, Some(PredictionLabel::Real));
        assert_eq!(saved.confidence_score, Some(0.93));
        assert!(saved.filename.ends_with("_note.jpg"));
        assert_eq!(store.history(1, 10).unwrap().pagination.total, 1);
    }

    #[tokio::test]
    async fn test_invalid_file_is_not_stored() {
        let (service, store) = service(Some(PredictionLabel::Real)).await;

        let err = service
            .process(image("notes.txt", "text/plain"), &ClientInfo::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(store.history(1, 10).unwrap().pagination.total, 0);
    }

    #[tokio::test]
    async fn test_failed_inference_records_error() {
        let (service, store) = service(None).await;

        let err = service
            .process(image("note.png", "image/png"), &ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PredictionFailed(_)));

        let page = store.history(1, 10).unwrap();
        assert_eq!(page.uploads.len(), 1);
        assert!(page.uploads[0].prediction_result.is_none());
        assert!(page.uploads[0]
            .error
            .as_deref()
            .unwrap()
            .contains("model exploded"));
    }

    #[tokio::test]
    async fn test_batch_mixes_success_and_failure() {
        let (service, _store) = service(Some(PredictionLabel::Fake)).await;

        let batch = service
            .process_batch(
                2,
                vec![image("a.jpg", "image/jpeg"), image("b.gif", "text/plain")],
                &ClientInfo::default(),
            )
            .await;

        assert_eq!(batch.total_files, 2);
        assert_eq!(batch.successful_predictions, 1);
        assert_eq!(batch.failed_predictions, 1);
        assert!(matches!(batch.results[1], BatchItem::Failed { .. }));
    }
}
