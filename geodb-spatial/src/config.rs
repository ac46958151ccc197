//! Geohash codec configuration.
//!
//! The defaults reproduce the world-geographic frame at full resolution;
//! other frames (projected coordinate systems) supply their own extent.

use crate::bbox::BBox;
use crate::error::{Result, SpatialError};
use serde::{Deserialize, Serialize};

/// Default number of interleaving levels (hash length `2 * depth`).
pub const DEFAULT_DEPTH: u32 = 32;

/// Largest supported depth. Beyond 52 levels the normalized coordinate has
/// no mantissa bits left to expand.
pub const MAX_DEPTH: u32 = 52;

/// Configuration for geohash encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoHashConfig {
    /// Reference rectangle the hash subdivides.
    pub reference: BBox,

    /// Resolution in levels.
    pub depth: u32,
}

impl Default for GeoHashConfig {
    fn default() -> Self {
        Self {
            reference: BBox::WGS84,
            depth: DEFAULT_DEPTH,
        }
    }
}

impl GeoHashConfig {
    /// Set the reference rectangle.
    pub fn with_reference(mut self, reference: BBox) -> Self {
        self.reference = reference;
        self
    }

    /// Set the depth.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Parse from JSON, validating the result.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SpatialError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject depths outside `1..=MAX_DEPTH` and degenerate reference boxes.
    pub fn validate(&self) -> Result<()> {
        validate_depth(self.depth)?;
        let r = &self.reference;
        if r.is_empty() || !(r.width() > 0.0) || !(r.height() > 0.0) {
            return Err(SpatialError::Config(format!(
                "reference box {} has no area",
                r
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_depth(depth: u32) -> Result<()> {
    if depth == 0 || depth > MAX_DEPTH {
        return Err(SpatialError::Config(format!(
            "depth must be in 1..={}, got {}",
            MAX_DEPTH, depth
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeoHashConfig::default();
        assert_eq!(config.reference, BBox::WGS84);
        assert_eq!(config.depth, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = GeoHashConfig::from_json(r#"{"depth": 16}"#).unwrap();
        assert_eq!(config.depth, 16);
        assert_eq!(config.reference, BBox::WGS84);
    }

    #[test]
    fn test_invalid_depth_rejected() {
        assert!(GeoHashConfig::default().with_depth(0).validate().is_err());
        assert!(GeoHashConfig::from_json(r#"{"depth": 60}"#).is_err());
    }

    #[test]
    fn test_flat_reference_rejected() {
        let config = GeoHashConfig::default().with_reference(BBox::new(0.0, 0.0, 0.0, 10.0));
        assert!(matches!(config.validate(), Err(SpatialError::Config(_))));
    }
}
