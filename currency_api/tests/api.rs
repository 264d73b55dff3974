use currency_api::{
    classifier::{Classifier, ClassifierError, HttpClassifier, ImagePayload},
    config::{
        Config, Environment, HistoryConfig, InferenceServiceConfig, LogLevel, ServerConfig,
        StorageConfig, UploadConfig,
    },
    detection::DetectionService,
    prediction::{Classification, PredictionLabel},
    server::HttpServer,
    store::SqliteStore,
    FileStorage,
};
use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone)]
struct MockClassifier {
    ready: bool,
}

impl Classifier for MockClassifier {
    fn classify(
        &self,
        image: ImagePayload,
    ) -> BoxFuture<'_, Result<Classification, ClassifierError>> {
        Box::pin(async move {
            let label = if image.filename.contains("fake") {
                PredictionLabel::Fake
            } else if image.filename.contains("cat") {
                PredictionLabel::NotCurrency
            } else {
                PredictionLabel::Real
            };
            Ok(Classification {
                label,
                confidence: 0.97,
            })
        })
    }

    fn is_ready(&self) -> BoxFuture<'_, bool> {
        let ready = self.ready;
        Box::pin(async move { ready })
    }
}

struct TestApp {
    addr: SocketAddr,
    client: reqwest::Client,
    shutdown_tx: broadcast::Sender<()>,
    upload_dir: PathBuf,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = tokio::fs::remove_dir_all(&self.upload_dir).await;
    }
}

fn test_config(environment: Environment, upload_dir: PathBuf) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: vec!["http://localhost:5173".into()],
        },
        log_level: LogLevel::Debug,
        environment,
        inference_service: InferenceServiceConfig {
            host: "127.0.0.1".into(),
            port: 1,
            predict_path: "/predict".into(),
            health_path: "/health".into(),
            timeout_secs: 1,
            startup_retries: 0,
        },
        storage: StorageConfig {
            upload_dir,
            database_path: PathBuf::from(":memory:"),
        },
        upload: UploadConfig {
            max_files: 3,
            ..UploadConfig::default()
        },
        history: HistoryConfig::default(),
    }
}

async fn spawn_app(environment: Environment, ready: bool) -> TestApp {
    spawn_app_with(environment, Arc::new(MockClassifier { ready })).await
}

async fn spawn_app_with(environment: Environment, classifier: Arc<dyn Classifier>) -> TestApp {
    let upload_dir = std::env::temp_dir().join(format!("currency_api_it_{}", Uuid::new_v4()));
    let config = test_config(environment, upload_dir.clone());

    let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
    let files = FileStorage::new(&upload_dir).await.expect("upload dir");
    let detection = Arc::new(DetectionService::new(
        classifier,
        store,
        files,
        config.upload.clone(),
    ));

    let server = HttpServer::new(detection, &config)
        .await
        .expect("server binds");
    let addr = server.local_addr().expect("local addr");

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    server.run(shutdown_rx).await.expect("server runs");

    TestApp {
        addr,
        client: reqwest::Client::new(),
        shutdown_tx,
        upload_dir,
    }
}

fn image_part(name: &str) -> Part {
    Part::bytes(b"\xff\xd8\xff\xe0jpeg-body".to_vec())
        .file_name(name.to_string())
        .mime_str("image/jpeg")
        .unwrap()
}

#[tokio::test]
async fn test_predict_persists_and_lists_history() {
    let app = spawn_app(Environment::Production, true).await;

    let form = Form::new().part("file", image_part("fake_note.jpg"));
    let response = app
        .client
        .post(app.url("/predict"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["label"], "fake");
    assert_eq!(body["filename"], "fake_note.jpg");
    assert!(body["upload_id"].as_str().is_some());
    assert!(body["processing_time"].as_f64().is_some());

    let history: Value = app
        .client
        .get(app.url("/upload_history?page=1&per_page=5"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let uploads = history["uploads"].as_array().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0]["id"], body["upload_id"]);
    assert_eq!(uploads[0]["original_filename"], "fake_note.jpg");
    assert_eq!(uploads[0]["prediction_result"], "fake");
    assert_eq!(history["pagination"]["per_page"], 5);
    assert!(uploads[0].get("file_path").is_none());

    let stored = uploads[0]["filename"].as_str().unwrap();
    let served = app
        .client
        .get(app.url(&format!("/uploads/{}", stored)))
        .send()
        .await
        .unwrap();
    assert_eq!(served.status(), 200);
    assert_eq!(served.headers()["content-type"], "image/jpeg");

    app.stop().await;
}

#[tokio::test]
async fn test_predict_multiple_reports_per_item_status() {
    let app = spawn_app(Environment::Production, true).await;

    let form = Form::new()
        .part("files", image_part("note.jpg"))
        .part("files", image_part("cat.jpg"))
        .part(
            "files",
            Part::bytes(b"plain".to_vec())
                .file_name("notes.txt")
                .mime_str("text/plain")
                .unwrap(),
        );
    let body: Value = app
        .client
        .post(app.url("/predict_multiple"))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["total_files"], 3);
    assert_eq!(body["successful_predictions"], 2);
    assert_eq!(body["failed_predictions"], 1);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["label"], "real");
    assert_eq!(results[1]["label"], "not_currency");
    assert_eq!(results[2]["status"], "failed");
    assert_eq!(results[2]["error"], "File extension 'txt' not allowed");

    let stats: Value = app
        .client
        .get(app.url("/model_stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_uploads"], 2);
    assert_eq!(stats["uploads_today"], 2);
    assert_eq!(stats["predictions_distribution"]["real"], 1);
    assert_eq!(stats["predictions_distribution"]["not_currency"], 1);
    assert_eq!(stats["predictions_distribution"]["fake"], 0);
    assert_eq!(stats["model_status"], "active");

    app.stop().await;
}

#[tokio::test]
async fn test_predict_multiple_rejects_oversized_batch() {
    let app = spawn_app(Environment::Production, true).await;

    let form = (0..4).fold(Form::new(), |form, i| {
        form.part("files", image_part(&format!("note{}.jpg", i)))
    });
    let response = app
        .client
        .post(app.url("/predict_multiple"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    app.stop().await;
}

#[tokio::test]
async fn test_missing_file_part_is_a_json_error() {
    let app = spawn_app(Environment::Production, false).await;

    let form = Form::new().text("comment", "no image here");
    let response = app
        .client
        .post(app.url("/predict"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No file part");
    assert_eq!(body["message"], "No file part");
    assert!(body["stack"].is_null());

    let stats: Value = app
        .client
        .get(app.url("/model_stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["model_status"], "inactive");

    app.stop().await;
}

#[tokio::test]
async fn test_local_environment_exposes_stack() {
    let app = spawn_app(Environment::Local, true).await;

    let form = Form::new().part(
        "file",
        Part::bytes(b"%PDF".to_vec())
            .file_name("scan.pdf")
            .mime_str("application/pdf")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url("/predict"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "File extension 'pdf' not allowed");
    assert!(body["stack"].as_str().unwrap().contains("BadRequest"));

    app.stop().await;
}

#[tokio::test]
async fn test_liveness_endpoints() {
    let app = spawn_app(Environment::Production, true).await;

    let index: Value = app
        .client
        .get(app.url("/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(index["status"], "active");
    assert_eq!(index["endpoints"]["predict"], "/predict");

    let health: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["model_loaded"], true);
    assert_eq!(health["database_connected"], true);

    let missing = app
        .client
        .get(app.url("/uploads/..%2Fsecret.jpg"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let metrics = app.client.get(app.url("/metrics")).send().await.unwrap();
    assert_eq!(metrics.status(), 200);

    app.stop().await;
}

#[tokio::test]
async fn test_non_multipart_body_is_a_json_error() {
    let app = spawn_app(Environment::Production, true).await;

    let response = app
        .client
        .post(app.url("/predict"))
        .json(&serde_json::json!({ "file": "note.jpg" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No file part");

    let response = app
        .client
        .post(app.url("/predict_multiple"))
        .body("files=a.jpg")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No files part");

    let response = app.client.get(app.url("/predict")).send().await.unwrap();
    assert_eq!(response.status(), 405);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().is_some());

    app.stop().await;
}

#[tokio::test]
async fn test_unreachable_model_service_is_503() {
    let classifier = HttpClassifier::new(&InferenceServiceConfig {
        host: "127.0.0.1".into(),
        port: 1,
        predict_path: "/predict".into(),
        health_path: "/health".into(),
        timeout_secs: 1,
        startup_retries: 0,
    })
    .unwrap();
    let app = spawn_app_with(Environment::Production, Arc::new(classifier)).await;

    let form = Form::new().part("file", image_part("note.jpg"));
    let response = app
        .client
        .post(app.url("/predict"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Model not loaded");

    let history: Value = app
        .client
        .get(app.url("/upload_history"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let uploads = history["uploads"].as_array().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0]["error"], "Model not loaded");
    assert!(uploads[0]["prediction_result"].is_null());

    app.stop().await;
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let app = spawn_app(Environment::Production, true).await;

    let preflight = |origin: &'static str| {
        app.client
            .request(reqwest::Method::OPTIONS, app.url("/predict"))
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .send()
    };

    let allowed = preflight("http://localhost:5173").await.unwrap();
    assert!(allowed.status().is_success());
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
    let methods = allowed.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));

    let other = preflight("http://evil.example").await.unwrap();
    assert!(other.headers().get("access-control-allow-origin").is_none());

    let response = app
        .client
        .get(app.url("/model_stats"))
        .header("origin", "http://localhost:5173")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );

    app.stop().await;
}
