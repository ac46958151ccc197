//! Error types for shadow-index maintenance.

use geodb_spatial::SpatialError;
use thiserror::Error;

/// Errors raised by the synchronizer, lifecycle commands and tables.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Shadow maintenance failed (bad schema or a non-geometry cell).
    #[error("Indexing error: {0}")]
    Indexing(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// The column already has a shadow column or the index name is taken.
    #[error("Spatial index already exists: {0}")]
    AlreadyIndexed(String),

    #[error("No spatial index: {0}")]
    NotIndexed(String),

    #[error("Row not found: {0}")]
    RowNotFound(usize),

    /// Row width does not match the table schema.
    #[error("Row has {actual} values, expected {expected}")]
    Arity { expected: usize, actual: usize },

    /// Geometry decode or geohash failure.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
