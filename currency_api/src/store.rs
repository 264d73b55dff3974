use crate::prediction::PredictionLabel;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::{path::Path, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt upload record {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Metadata persisted for every classified image. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRecord {
    pub id: String,
    pub filename: String,
    pub original_filename: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: String,
    pub upload_timestamp: DateTime<Utc>,
    pub prediction_result: Option<PredictionLabel>,
    pub confidence_score: Option<f64>,
    pub processing_time: Option<f64>,
    pub error: Option<String>,
    #[serde(skip_serializing)]
    pub ip_address: Option<String>,
    #[serde(skip_serializing)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32, total: u64) -> Self {
        let pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page as u64)
        };
        Self {
            page,
            per_page,
            total,
            pages,
            has_next: (page as u64) < pages,
            has_prev: page > 1,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.per_page as u64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub uploads: Vec<UploadRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelDistribution {
    pub real: u64,
    pub fake: u64,
    pub not_currency: u64,
}

impl LabelDistribution {
    fn add(&mut self, label: PredictionLabel, count: u64) {
        match label {
            PredictionLabel::Real => self.real += count,
            PredictionLabel::Fake => self.fake += count,
            PredictionLabel::NotCurrency => self.not_currency += count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadStats {
    pub total_uploads: u64,
    pub uploads_today: u64,
    pub predictions_distribution: LabelDistribution,
    pub average_processing_time: f64,
}

pub trait UploadStore: Send + Sync + 'static {
    fn insert(&self, record: &UploadRecord) -> Result<(), StoreError>;
    fn history(&self, page: u32, per_page: u32) -> Result<HistoryPage, StoreError>;
    fn stats(&self, since: DateTime<Utc>) -> Result<UploadStats, StoreError>;
    fn get(&self, id: &str) -> Result<Option<UploadRecord>, StoreError>;
    fn ping(&self) -> bool;
}

/// Runs a store call on the blocking pool.
pub async fn run_blocking<T, F>(store: Arc<dyn UploadStore>, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn UploadStore) -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const SELECT_COLUMNS: &str = "id, filename, original_filename, file_path, file_size, mime_type, \
     upload_timestamp, prediction_result, confidence_score, processing_time, error, \
     ip_address, user_agent";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS uploaded_images (
                id                  TEXT PRIMARY KEY,
                filename            TEXT NOT NULL,
                original_filename   TEXT NOT NULL,
                file_path           TEXT NOT NULL,
                file_size           INTEGER NOT NULL,
                mime_type           TEXT NOT NULL,
                upload_timestamp    TEXT NOT NULL,
                prediction_result   TEXT,
                confidence_score    REAL,
                processing_time     REAL,
                error               TEXT,
                ip_address          TEXT,
                user_agent          TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_uploads_timestamp ON uploaded_images(upload_timestamp);
            CREATE INDEX IF NOT EXISTS idx_uploads_prediction ON uploaded_images(prediction_result);
            ",
        )?;
        Ok(())
    }
}

struct RawRecord {
    record: UploadRecord,
    timestamp: String,
    label: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        record: UploadRecord {
            id: row.get(0)?,
            filename: row.get(1)?,
            original_filename: row.get(2)?,
            file_path: row.get(3)?,
            file_size: row.get::<_, i64>(4)? as u64,
            mime_type: row.get(5)?,
            upload_timestamp: DateTime::<Utc>::default(),
            prediction_result: None,
            confidence_score: row.get(8)?,
            processing_time: row.get(9)?,
            error: row.get(10)?,
            ip_address: row.get(11)?,
            user_agent: row.get(12)?,
        },
        timestamp: row.get(6)?,
        label: row.get(7)?,
    })
}

impl RawRecord {
    fn finish(self) -> Result<UploadRecord, StoreError> {
        let mut record = self.record;
        let corrupt = |reason: String| StoreError::Corrupt {
            id: record.id.clone(),
            reason,
        };

        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| corrupt(format!("bad timestamp `{}`: {}", self.timestamp, e)))?;
        let label = self
            .label
            .map(|l| l.parse::<PredictionLabel>())
            .transpose()
            .map_err(corrupt)?;

        record.upload_timestamp = timestamp.with_timezone(&Utc);
        record.prediction_result = label;
        Ok(record)
    }
}

impl UploadStore for SqliteStore {
    fn insert(&self, record: &UploadRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO uploaded_images (id, filename, original_filename, file_path, file_size,
                mime_type, upload_timestamp, prediction_result, confidence_score, processing_time,
                error, ip_address, user_agent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.id,
                record.filename,
                record.original_filename,
                record.file_path,
                record.file_size as i64,
                record.mime_type,
                format_timestamp(&record.upload_timestamp),
                record.prediction_result.map(|l| l.as_str()),
                record.confidence_score,
                record.processing_time,
                record.error,
                record.ip_address,
                record.user_agent,
            ],
        )?;
        Ok(())
    }

    fn history(&self, page: u32, per_page: u32) -> Result<HistoryPage, StoreError> {
        let conn = self.conn.lock();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM uploaded_images", [], |r| {
            r.get(0)
        })?;
        let pagination = Pagination::new(page, per_page, total as u64);

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM uploaded_images
             ORDER BY upload_timestamp DESC, rowid DESC LIMIT ?1 OFFSET ?2",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![pagination.per_page as i64, pagination.offset() as i64],
            read_row,
        )?;

        let mut uploads = Vec::new();
        for row in rows {
            uploads.push(row?.finish()?);
        }

        Ok(HistoryPage {
            uploads,
            pagination,
        })
    }

    fn stats(&self, since: DateTime<Utc>) -> Result<UploadStats, StoreError> {
        let conn = self.conn.lock();

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM uploaded_images", [], |r| {
            r.get(0)
        })?;
        let today: i64 = conn.query_row(
            "SELECT COUNT(*) FROM uploaded_images WHERE upload_timestamp >= ?1",
            params![format_timestamp(&since)],
            |r| r.get(0),
        )?;
        let average: Option<f64> = conn.query_row(
            "SELECT AVG(processing_time) FROM uploaded_images WHERE processing_time IS NOT NULL",
            [],
            |r| r.get(0),
        )?;

        let mut distribution = LabelDistribution::default();
        let mut stmt = conn.prepare(
            "SELECT prediction_result, COUNT(*) FROM uploaded_images
             WHERE prediction_result IS NOT NULL GROUP BY prediction_result",
        )?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        for row in rows {
            let (label, count) = row?;
            match label.parse::<PredictionLabel>() {
                Ok(label) => distribution.add(label, count as u64),
                Err(e) => tracing::warn!("Skipping unknown label in statistics: {}", e),
            }
        }

        Ok(UploadStats {
            total_uploads: total as u64,
            uploads_today: today as u64,
            predictions_distribution: distribution,
            average_processing_time: round_to_millis(average.unwrap_or(0.0)),
        })
    }

    fn get(&self, id: &str) -> Result<Option<UploadRecord>, StoreError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM uploaded_images WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                read_row,
            )
            .optional()?;
        raw.map(RawRecord::finish).transpose()
    }

    fn ping(&self) -> bool {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).is_ok()
    }
}

fn round_to_millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
