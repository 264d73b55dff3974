use crate::{
    api::CurrencyApi,
    config::PaginationConfig,
    error::ClientError,
    models::{HistoryPage, ModelStats},
    presentation::render_history_row,
};
use tracing::instrument;

pub const FETCH_ERROR: &str = "Failed to fetch data. Please try again.";
pub const EMPTY_HISTORY: &str = "No uploads found";

/// Paged upload history plus the stats header. Pages are zero-based here and
/// one-based on the wire.
#[derive(Debug)]
pub struct HistoryView {
    page: u32,
    per_page: u32,
    options: Vec<u32>,
    history: Option<HistoryPage>,
    stats: Option<ModelStats>,
    error: Option<String>,
    loading: bool,
}

impl HistoryView {
    pub fn new(config: &PaginationConfig) -> Self {
        Self {
            page: 0,
            per_page: config.default_page_size,
            options: config.page_size_options.clone(),
            history: None,
            stats: None,
            error: None,
            loading: false,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn history(&self) -> Option<&HistoryPage> {
        self.history.as_ref()
    }

    pub fn stats(&self) -> Option<&ModelStats> {
        self.stats.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn total(&self) -> u64 {
        self.history
            .as_ref()
            .and_then(|h| h.pagination.as_ref())
            .map(|p| p.total)
            .unwrap_or(0)
    }

    /// Fetches the current page and the stats concurrently.
    #[instrument(skip(self, api), fields(page = self.page, per_page = self.per_page))]
    pub async fn load<A>(&mut self, api: &A) -> Result<(), ClientError>
    where
        A: CurrencyApi + ?Sized,
    {
        self.loading = true;
        self.error = None;

        let (history, stats) = tokio::join!(
            api.upload_history(self.page.saturating_add(1), self.per_page),
            api.model_stats()
        );

        self.loading = false;

        match (history, stats) {
            (Ok(history), Ok(stats)) => {
                self.history = Some(history);
                self.stats = Some(stats);
                Ok(())
            }
            (Err(err), _) | (_, Err(err)) => {
                tracing::error!("Error fetching history: {}", err);
                self.error = Some(FETCH_ERROR.to_string());
                Err(err)
            }
        }
    }

    pub async fn set_page<A>(&mut self, api: &A, page: u32) -> Result<(), ClientError>
    where
        A: CurrencyApi + ?Sized,
    {
        self.page = page;
        self.load(api).await
    }

    pub async fn set_per_page<A>(&mut self, api: &A, per_page: u32) -> Result<(), ClientError>
    where
        A: CurrencyApi + ?Sized,
    {
        self.position(0, Some(per_page))?;
        self.load(api).await
    }

    /// Moves to `page` (zero-based), optionally with a new page size, without fetching.
    pub fn position(&mut self, page: u32, per_page: Option<u32>) -> Result<(), ClientError> {
        if let Some(per_page) = per_page {
            if !self.options.contains(&per_page) {
                return Err(ClientError::InvalidPageSize(per_page));
            }
            self.per_page = per_page;
        }
        self.page = page;
        Ok(())
    }

    pub fn render_table(&self) -> String {
        let uploads = self
            .history
            .as_ref()
            .map(|h| h.uploads.as_slice())
            .unwrap_or_default();

        if uploads.is_empty() {
            return EMPTY_HISTORY.to_string();
        }

        let mut lines: Vec<String> = uploads.iter().map(render_history_row).collect();
        lines.push(format!(
            "page {} of {} ({} uploads)",
            self.page.saturating_add(1),
            self.history
                .as_ref()
                .and_then(|h| h.pagination.as_ref())
                .map(|p| p.pages.max(1))
                .unwrap_or(1),
            self.total()
        ));
        lines.join("\n")
    }
}
