use crate::classifier::{wait_until_ready, HttpClassifier};
use crate::config::Config;
use crate::detection::DetectionService;
use crate::server::HttpServer;
use crate::storage::FileStorage;
use crate::store::SqliteStore;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = config.storage.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let store = match SqliteStore::open(&config.storage.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open upload database: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let files = FileStorage::new(&config.storage.upload_dir).await?;

    let classifier = match HttpClassifier::new(&config.inference_service) {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            tracing::error!("Failed to initialize inference client: {:?}", e);
            return Err(Box::new(e));
        }
    };

    if wait_until_ready(
        classifier.as_ref(),
        config.inference_service.startup_retries,
    )
    .await
    {
        tracing::info!(
            "Inference service ready at {}",
            config.inference_service.get_address()
        );
    } else {
        tracing::warn!(
            "Inference service at {} is not ready, model status will report inactive",
            config.inference_service.get_address()
        );
    }

    let detection = Arc::new(DetectionService::new(
        classifier,
        store,
        files,
        config.upload.clone(),
    ));

    let server = HttpServer::new(detection, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
