//! Persistence collaborator for the spot price cache
//!
//! The cache persists the raw upstream payload as a single JSON document:
//! the source unit label, the price array, the index-aligned epoch-seconds
//! array, and the instant of the last refresh.

use crate::error::{HeliosError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Raw persisted price document, stored exactly as fetched plus the
/// refresh stamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPricePayload {
    /// Source unit label; validated against the expected constant on load
    pub unit: String,

    /// Prices in the source unit
    pub price: Vec<f64>,

    /// Epoch seconds, index-aligned with `price`
    pub unix_seconds: Vec<i64>,

    /// Instant the payload was fetched
    pub updated_at: DateTime<Utc>,
}

/// Storage backend for the persisted price document
pub trait PriceStore: Send + Sync {
    /// Load the persisted document; `None` if nothing was persisted yet
    fn load(&self) -> Result<Option<RawPricePayload>>;

    /// Persist the document, replacing any previous one
    fn save(&self, payload: &RawPricePayload) -> Result<()>;
}

/// File-backed price store (single JSON document)
pub struct FilePriceStore {
    path: PathBuf,
}

impl FilePriceStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PriceStore for FilePriceStore {
    fn load(&self) -> Result<Option<RawPricePayload>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            HeliosError::persistence(format!("reading {}: {}", self.path.display(), e))
        })?;
        let payload: RawPricePayload = serde_json::from_str(&contents).map_err(|e| {
            HeliosError::persistence(format!("parsing {}: {}", self.path.display(), e))
        })?;
        Ok(Some(payload))
    }

    fn save(&self, payload: &RawPricePayload) -> Result<()> {
        let contents = serde_json::to_string(payload)?;
        std::fs::write(&self.path, contents).map_err(|e| {
            HeliosError::persistence(format!("writing {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}
