//! Shadow-index configuration.

use crate::error::{IndexError, Result};
use geodb_spatial::GeoHashConfig;
use serde::{Deserialize, Serialize};

/// Configuration shared by the trigger, backfill and candidate queries.
///
/// All three must agree on the geohash frame, so a table carries exactly
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialIndexConfig {
    /// Geohash frame and depth for shadow keys.
    pub geohash: GeoHashConfig,

    /// Emit a backfill progress event every this many rows.
    /// Default: 10000
    pub progress_interval: usize,
}

impl Default for SpatialIndexConfig {
    fn default() -> Self {
        Self {
            geohash: GeoHashConfig::default(),
            progress_interval: 10_000,
        }
    }
}

impl SpatialIndexConfig {
    pub fn with_geohash(mut self, geohash: GeoHashConfig) -> Self {
        self.geohash = geohash;
        self
    }

    pub fn with_progress_interval(mut self, rows: usize) -> Self {
        self.progress_interval = rows;
        self
    }

    /// Parse from JSON, validating the result.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| IndexError::Indexing(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.geohash.validate()?;
        if self.progress_interval == 0 {
            return Err(IndexError::Indexing(
                "progress_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
