use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use moka::sync::Cache;
use sha2::{Digest, Sha256};
use crate::error::AppError;
use super::excel::{ExcelLoader, Workbook};

const IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Content address of an uploaded file.
pub fn content_id(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    hex::encode(&hash[..16])
}

/// Parsed workbooks keyed by the hash of their bytes. Uploading the same file twice
/// reuses the parsed sheets; results never depend on whether the entry was cached.
#[derive(Clone)]
pub struct WorkbookCache {
    inner: Cache<String, Arc<Workbook>>,
}

impl WorkbookCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_idle(IDLE_TIMEOUT)
                .build(),
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<Workbook>, AppError> {
        self.inner
            .get(id)
            .ok_or_else(|| AppError::WorkbookNotFound(id.to_string()))
    }

    pub fn insert(&self, workbook: Workbook) -> Arc<Workbook> {
        let workbook = Arc::new(workbook);
        self.inner.insert(workbook.id.clone(), workbook.clone());
        workbook
    }

    /// Returns the cached workbook for these bytes, parsing them on a miss.
    pub fn load(&self, data: Bytes) -> Result<Arc<Workbook>, AppError> {
        let id = content_id(&data);
        if let Some(hit) = self.inner.get(&id) {
            tracing::info!("Workbook {} served from cache", id);
            return Ok(hit);
        }
        let workbook = ExcelLoader.load_from_bytes(&id, data)?;
        Ok(self.insert(workbook))
    }
}
