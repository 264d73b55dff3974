use crate::validation::sanitize_filename;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Uploaded images on disk, served back under `/uploads`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub async fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub async fn save(&self, original_filename: &str, bytes: &[u8]) -> std::io::Result<StoredFile> {
        let filename = format!("{}_{}", Uuid::new_v4(), sanitize_filename(original_filename));
        let path = self.root.join(&filename);
        fs::write(&path, bytes).await?;
        let size = fs::metadata(&path).await?.len();

        tracing::debug!("Stored {} ({} bytes)", path.display(), size);

        Ok(StoredFile {
            filename,
            path,
            size,
        })
    }

    /// Resolves a public name to a stored file, refusing anything that is not
    /// a plain file name produced by [`FileStorage::save`].
    pub async fn read(&self, filename: &str) -> std::io::Result<Option<Vec<u8>>> {
        if filename.is_empty() || sanitize_filename(filename) != filename {
            return Ok(None);
        }

        match fs::read(self.root.join(filename)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}
