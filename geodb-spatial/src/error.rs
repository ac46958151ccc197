//! Error types for the spatial core.

use thiserror::Error;

/// Spatial codec and geometry errors.
#[derive(Error, Debug)]
pub enum SpatialError {
    /// Malformed or truncated binary buffer, or an unrecognized type word.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The geometry could not be serialized.
    #[error("Encode error: {0}")]
    Encode(String),

    /// WKT / EWKT parsing error.
    #[error("WKT parse error: {0}")]
    WktParse(String),

    /// Geometry is not usable for the requested operation.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SpatialError {
    pub(crate) fn truncated(what: &str, needed: usize, available: usize) -> Self {
        SpatialError::Decode(format!(
            "truncated {}: needed {} bytes, {} available",
            what, needed, available
        ))
    }
}

/// Result type for spatial operations.
pub type Result<T> = std::result::Result<T, SpatialError>;
