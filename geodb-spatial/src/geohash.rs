//! Covering-cell geohash of a bounding box.
//!
//! The geohash of a box is the hash of the smallest quadtree cell that
//! contains both of its corners: the union of the two corner `GeoString`s.
//! The same key serves as the per-row index value and as the lookup key of a
//! query box.

use crate::bbox::BBox;
use crate::config::{GeoHashConfig, DEFAULT_DEPTH};
use crate::error::Result;
use crate::geostring::GeoString;

/// Geohash of the box `(x1, y1)-(x2, y2)` in the world frame at full depth.
pub fn geohash(x1: f64, y1: f64, x2: f64, y2: f64) -> String {
    let lower = GeoString::encode_unchecked(x1, y1, BBox::WGS84, DEFAULT_DEPTH);
    let upper = GeoString::encode_unchecked(x2, y2, BBox::WGS84, DEFAULT_DEPTH);
    lower.union(&upper).into_hash()
}

/// Geohash of an envelope in the world frame; `None` for an empty envelope.
pub fn geohash_bbox(bbox: &BBox) -> Option<String> {
    if bbox.is_empty() {
        return None;
    }
    Some(geohash(bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y))
}

/// Geohash of an envelope against a configured reference frame and depth.
pub fn geohash_with(config: &GeoHashConfig, bbox: &BBox) -> Result<Option<String>> {
    config.validate()?;
    if bbox.is_empty() {
        return Ok(None);
    }
    let lower = GeoString::encode(bbox.min_x, bbox.min_y, config.reference, config.depth)?;
    let upper = GeoString::encode(bbox.max_x, bbox.max_y, config.reference, config.depth)?;
    Ok(Some(lower.union(&upper).into_hash()))
}
