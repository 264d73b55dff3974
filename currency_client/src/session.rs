use crate::{
    api::CurrencyApi,
    config::UploadLimits,
    error::ClientError,
    files::SelectedFile,
    models::PredictionResult,
};
use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    #[default]
    Single,
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Error(String),
    Success(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionReport {
    pub kept: usize,
    pub rejected: usize,
}

/// Everything the upload form holds between user actions. Nothing here
/// outlives the process.
#[derive(Debug)]
pub struct UploadSession {
    limits: UploadLimits,
    mode: UploadMode,
    files: Vec<SelectedFile>,
    previews: Vec<String>,
    results: Vec<PredictionResult>,
    banner: Option<Banner>,
    loading: bool,
    next_preview: u64,
}

impl UploadSession {
    pub fn new(limits: UploadLimits) -> Self {
        Self {
            limits,
            mode: UploadMode::default(),
            files: Vec::new(),
            previews: Vec::new(),
            results: Vec::new(),
            banner: None,
            loading: false,
            next_preview: 0,
        }
    }

    pub fn mode(&self) -> UploadMode {
        self.mode
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn previews(&self) -> &[String] {
        &self.previews
    }

    pub fn results(&self) -> &[PredictionResult] {
        &self.results
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        match &self.banner {
            Some(Banner::Error(message)) => Some(message),
            _ => None,
        }
    }

    pub fn success(&self) -> Option<&str> {
        match &self.banner {
            Some(Banner::Success(message)) => Some(message),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn accepts(&self, file: &SelectedFile) -> bool {
        file.is_image()
            && self.limits.allows(&file.mime_type)
            && file.size() <= self.limits.max_file_size
    }

    fn preview_for(&mut self, file: &SelectedFile) -> String {
        self.next_preview += 1;
        format!("preview://{}/{}", self.next_preview, file.name)
    }

    fn replace_selection(&mut self, files: Vec<SelectedFile>) {
        self.previews.clear();
        for file in &files {
            let preview = self.preview_for(file);
            self.previews.push(preview);
        }
        self.files = files;
        self.results.clear();
        self.banner = None;
    }

    /// Applies a file picker selection according to the current mode.
    pub fn select_files(&mut self, files: Vec<SelectedFile>) -> SelectionReport {
        let offered = files.len();

        match self.mode {
            UploadMode::Single => {
                let Some(file) = files.into_iter().next().filter(|f| self.accepts(f)) else {
                    self.banner = Some(Banner::Error(ClientError::InvalidFileType.to_string()));
                    return SelectionReport {
                        kept: 0,
                        rejected: offered,
                    };
                };
                self.replace_selection(vec![file]);
                SelectionReport {
                    kept: 1,
                    rejected: offered - 1,
                }
            }
            UploadMode::Multiple => {
                let valid: Vec<SelectedFile> = files
                    .into_iter()
                    .filter(|f| self.accepts(f))
                    .take(self.limits.max_files)
                    .collect();

                if valid.is_empty() {
                    self.banner = Some(Banner::Error("Please select valid image files.".into()));
                    return SelectionReport {
                        kept: 0,
                        rejected: offered,
                    };
                }

                let kept = valid.len();
                self.replace_selection(valid);
                tracing::debug!("Kept {} of {} selected files", kept, offered);
                SelectionReport {
                    kept,
                    rejected: offered - kept,
                }
            }
        }
    }

    /// Adds a camera frame: replaces the selection in single mode, appends otherwise.
    pub fn capture_from_camera(&mut self, jpeg: impl Into<Bytes>) -> SelectionReport {
        let captured_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let file = SelectedFile::camera_capture(jpeg, captured_at_ms);

        match self.mode {
            UploadMode::Single => self.select_files(vec![file]),
            UploadMode::Multiple => {
                if self.files.len() >= self.limits.max_files {
                    self.banner = Some(Banner::Error(format!(
                        "You can upload at most {} images at once.",
                        self.limits.max_files
                    )));
                    return SelectionReport {
                        kept: 0,
                        rejected: 1,
                    };
                }
                let preview = self.preview_for(&file);
                self.files.push(file);
                self.previews.push(preview);
                SelectionReport {
                    kept: 1,
                    rejected: 0,
                }
            }
        }
    }

    pub fn remove_file(&mut self, index: usize) {
        if index < self.files.len() {
            self.files.remove(index);
        }
        if index < self.previews.len() {
            self.previews.remove(index);
        }
        if index < self.results.len() {
            self.results.remove(index);
        }
    }

    pub fn clear_all(&mut self) {
        self.files.clear();
        self.previews.clear();
        self.results.clear();
        self.banner = None;
    }

    pub fn set_mode(&mut self, mode: UploadMode) {
        self.mode = mode;
        self.clear_all();
    }

    /// Sends the selection to the matching predict endpoint and stores the outcome.
    #[instrument(skip(self, api), fields(mode = ?self.mode, files = self.files.len()))]
    pub async fn submit<A>(&mut self, api: &A) -> Result<(), ClientError>
    where
        A: CurrencyApi + ?Sized,
    {
        if self.files.is_empty() {
            let err = ClientError::EmptySelection;
            self.banner = Some(Banner::Error(err.to_string()));
            return Err(err);
        }

        self.loading = true;
        self.banner = None;

        let outcome = match self.mode {
            UploadMode::Single => api
                .predict_single(&self.files[0])
                .await
                .map(|result| (vec![result], "Image processed successfully!".to_string())),
            UploadMode::Multiple => api.predict_multiple(&self.files).await.map(|batch| {
                let message = format!(
                    "{} images processed successfully!",
                    batch.successful_predictions
                );
                (batch.results, message)
            }),
        };

        self.loading = false;

        match outcome {
            Ok((results, message)) => {
                self.results = results;
                self.banner = Some(Banner::Success(message));
                Ok(())
            }
            Err(err) => {
                tracing::error!("Error processing images: {}", err);
                self.banner = Some(Banner::Error(err.user_message()));
                Err(err)
            }
        }
    }
}
