//! Geohash shadow-column spatial index for GeoDB tables.
//!
//! A geometry column `GEOM` is indexed by adding a text column
//! `_GEOM_GEOHASH` holding the geohash of each row's envelope and an ordinary
//! ordered index `_GEOM_GEOHASH_INDEX` over it. A row trigger recomputes the
//! shadow cell whenever a row is inserted or updated, and bounding-box
//! queries turn into a handful of exact lookups plus one prefix range scan.
//!
//! # Example
//!
//! ```
//! use geodb_index::{create_spatial_index, spatial_candidates, MemoryTable, Value};
//! use geodb_spatial::{ewkb, BBox, SpatialGeometry};
//!
//! let mut table = MemoryTable::new("CITIES", ["NAME", "GEOM"]);
//! create_spatial_index(&mut table, "GEOM")?;
//!
//! let paris = ewkb::encode(&SpatialGeometry::point(2.35, 48.86).with_srid(4326))?;
//! let id = table.insert(vec!["Paris".into(), Value::Bytes(paris), Value::Null])?;
//!
//! let hits = spatial_candidates(&table, "GEOM", &BBox::new(2.0, 48.0, 3.0, 49.0))?;
//! assert_eq!(hits, vec![id]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! - [`binding`]: Shadow column discovery and naming
//! - [`trigger`]: Row trigger computing shadow geohashes
//! - [`lifecycle`]: `create_spatial_index` / `drop_spatial_index`
//! - [`query`]: Bounding-box candidate search
//! - [`table`]: Table trait and in-memory table
//! - [`value`]: Cell values
//! - [`config`]: Index configuration
//! - [`error`]: Error types

pub mod binding;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod table;
pub mod trigger;
pub mod value;

pub use binding::{index_name, shadow_column_name, ShadowIndexBinding, ShadowPair};
pub use config::SpatialIndexConfig;
pub use error::{IndexError, Result};
pub use lifecycle::{create_spatial_index, drop_spatial_index, rebind};
pub use query::spatial_candidates;
pub use table::{MemoryTable, OrderedIndex, RowId, SpatialTable};
pub use trigger::{GeoHashTrigger, RowEvent};
pub use value::Value;
