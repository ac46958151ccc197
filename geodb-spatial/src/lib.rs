//! Spatial core for GeoDB.
//!
//! This crate provides the geometry-valued column support used by the
//! database engine:
//!
//! - **Geohash keys**: a bit-interleaved quadtree encoding of points and
//!   boxes whose string prefixes mirror spatial containment, usable as an
//!   ordinary sorted index key
//! - **Envelope-prefixed binary geometries**: a 32-byte bounding box ahead of
//!   an SRID-tagged EWKB payload, so bounding-box filters never decode
//!   coordinates
//! - **Aggregates**: streaming `ST_Extent` and `ST_Union` reducers with
//!   mergeable partial states
//! - **SQL functions**: the `ST_*` constructors, accessors, predicates and
//!   processing functions over stored values
//!
//! # Architecture
//!
//! ```text
//!   WKT / EWKT / WKB ──► SpatialGeometry ──► ewkb::encode ──► stored bytes
//!                                                              │
//!        ┌─────────────────────────────────────────────────────┤
//!        ▼                                                     ▼
//!   ewkb::decode_envelope (32 bytes)                    ewkb::decode
//!        │                                                     │
//!        ▼                                                     ▼
//!   geohash / bbox filters                     functions / aggregates (geo)
//! ```
//!
//! # Modules
//!
//! - [`bbox`]: Axis-aligned box arithmetic
//! - [`geostring`]: Interleaved geohash codec
//! - [`geohash`]: Covering-cell geohash of a box
//! - [`geometry`]: Geometry values with SRID and Z, WKT / EWKT
//! - [`cursor`]: Byte cursors for the binary formats
//! - [`wkb`]: WKB / EWKB reader and writer over the `wkb` crate
//! - [`ewkb`]: Envelope-prefixed storage format
//! - [`aggregate`]: Extent and union reducers
//! - [`functions`]: `ST_*` function surface
//! - [`config`]: Geohash configuration
//! - [`error`]: Error types

pub mod aggregate;
pub mod bbox;
pub mod config;
pub mod cursor;
pub mod error;
pub mod ewkb;
pub mod functions;
pub mod geohash;
pub mod geometry;
pub mod geostring;
pub mod wkb;

// Re-export key types
pub use aggregate::{fold_parallel, AggregateKind, GeometryAggregate};
pub use bbox::BBox;
pub use config::{GeoHashConfig, DEFAULT_DEPTH, MAX_DEPTH};
pub use cursor::{ByteOrder, ByteReader, ByteWriter};
pub use error::{Result, SpatialError};
pub use geohash::{geohash, geohash_bbox, geohash_with};
pub use geometry::{GeometryType, SpatialGeometry, DEFAULT_SRID, UNKNOWN_SRID};
pub use geostring::{decode_bbox, geostring_bbox, GeoString};
