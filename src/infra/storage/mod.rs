use crate::core::{NerError, Result, TaggedToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::AsyncWriteExt;

/// Largest page `list` will return.
pub const MAX_PAGE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: u64,
    pub input_text: String,
    pub predictions: Vec<TaggedToken>,
    /// Milliseconds spent in inference.
    pub processing_time: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub input_text: String,
    pub predictions: Vec<TaggedToken>,
    pub processing_time: u64,
}

/// What to do when a prediction record cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditPolicy {
    /// Fail the request.
    #[default]
    Strict,
    /// Log the failure and still answer the request.
    BestEffort,
}

impl FromStr for AuditPolicy {
    type Err = NerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(AuditPolicy::Strict),
            "best-effort" | "best_effort" | "besteffort" => Ok(AuditPolicy::BestEffort),
            other => Err(NerError::Config(format!("unknown audit policy '{}'", other))),
        }
    }
}

/// Append-only history of predictions.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn append(&self, record: NewPrediction) -> Result<PredictionRecord>;

    /// Records in insertion order, skipping `skip` and returning at most
    /// `limit` (capped at `MAX_PAGE`).
    async fn list(&self, skip: usize, limit: usize) -> Result<Vec<PredictionRecord>>;
}

fn stamp(id: u64, record: NewPrediction) -> PredictionRecord {
    PredictionRecord {
        id,
        input_text: record.input_text,
        predictions: record.predictions,
        processing_time: record.processing_time,
        created_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct MemoryPredictionStore {
    records: Mutex<Vec<PredictionRecord>>,
}

impl MemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl PredictionStore for MemoryPredictionStore {
    async fn append(&self, record: NewPrediction) -> Result<PredictionRecord> {
        let mut records = self.records.lock();
        let record = stamp(records.len() as u64 + 1, record);
        records.push(record.clone());
        Ok(record)
    }

    async fn list(&self, skip: usize, limit: usize) -> Result<Vec<PredictionRecord>> {
        let records = self.records.lock();
        Ok(records
            .iter()
            .skip(skip)
            .take(limit.min(MAX_PAGE))
            .cloned()
            .collect())
    }
}

/// One JSON record per line in a file that is only ever appended to.
pub struct JsonlPredictionStore {
    path: PathBuf,
    next_id: tokio::sync::Mutex<u64>,
}

impl JsonlPredictionStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| NerError::Persistence(format!("{}: {}", parent.display(), e)))?;
        }

        let last_id = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content
                .lines()
                .filter_map(|line| serde_json::from_str::<PredictionRecord>(line).ok())
                .map(|r| r.id)
                .max()
                .unwrap_or(0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(NerError::Persistence(format!("{}: {}", path.display(), e)));
            }
        };

        tracing::info!(path = %path.display(), last_id, "opened prediction log");
        Ok(Self {
            path,
            next_id: tokio::sync::Mutex::new(last_id + 1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PredictionStore for JsonlPredictionStore {
    async fn append(&self, record: NewPrediction) -> Result<PredictionRecord> {
        // Held across the write so ids and line order agree.
        let mut next_id = self.next_id.lock().await;
        let record = stamp(*next_id, record);

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| NerError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| NerError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| NerError::Persistence(format!("{}: {}", self.path.display(), e)))?;

        *next_id += 1;
        Ok(record)
    }

    async fn list(&self, skip: usize, limit: usize) -> Result<Vec<PredictionRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(NerError::Persistence(format!("{}: {}", self.path.display(), e)));
            }
        };

        let mut records = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PredictionRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = n + 1,
                    error = %e,
                    "skipping malformed prediction record"
                ),
            }
        }

        Ok(records
            .into_iter()
            .skip(skip)
            .take(limit.min(MAX_PAGE))
            .collect())
    }
}
