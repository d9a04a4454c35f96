//! Persistence for the record PV power observation
//!
//! The maximum observed PV power survives restarts in a small JSON file.
//! Concurrent jobs may report candidate values, so the compare-update-save
//! sequence runs under a mutex: observers can never interleave a read and a
//! write.

use crate::error::{HeliosError, Result};
use crate::logging::get_logger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Record PV power and when it was seen
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaxPower {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Default for MaxPower {
    fn default() -> Self {
        Self {
            // Small non-zero floor so ratios against the maximum stay finite
            value: 0.001,
            timestamp: Utc::now(),
        }
    }
}

/// Guarded, persisted record-power tracker
pub struct MaxPowerTracker {
    path: PathBuf,
    state: tokio::sync::Mutex<MaxPower>,
    logger: crate::logging::StructuredLogger,
}

impl MaxPowerTracker {
    /// Load the persisted record, falling back to the default when the file
    /// is absent or unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let logger = get_logger("persistence");
        let path = path.as_ref().to_path_buf();

        let state = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<MaxPower>(&contents) {
                Ok(state) => state,
                Err(e) => {
                    logger.warn(&format!(
                        "Ignoring invalid max power file {}: {}",
                        path.display(),
                        e
                    ));
                    MaxPower::default()
                }
            },
            Err(_) => MaxPower::default(),
        };

        Self {
            path,
            state: tokio::sync::Mutex::new(state),
            logger,
        }
    }

    /// Current record
    pub async fn current(&self) -> MaxPower {
        *self.state.lock().await
    }

    /// Report a candidate value. If it beats the record, the record is
    /// updated, stamped, and persisted before the lock is released; the new
    /// record is returned. Returns `None` when the candidate is not a new
    /// maximum.
    pub async fn observe(&self, candidate: f64) -> Result<Option<MaxPower>> {
        let mut state = self.state.lock().await;
        if candidate <= state.value {
            return Ok(None);
        }

        state.value = candidate;
        state.timestamp = Utc::now();
        self.save(&state)?;

        self.logger.info(&format!(
            "New maximum PV power {:.3} at {}",
            state.value, state.timestamp
        ));
        Ok(Some(*state))
    }

    fn save(&self, state: &MaxPower) -> Result<()> {
        let contents = serde_json::to_string(state)?;
        std::fs::write(&self.path, contents).map_err(|e| {
            HeliosError::persistence(format!("writing {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}
