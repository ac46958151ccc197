//! Geometry values carried through the codecs and functions.
//!
//! This module provides:
//! - `SpatialGeometry`: a 2-D `geo_types::Geometry` tagged with an SRID and
//!   optional Z ordinates
//! - WKT / EWKT parsing and formatting
//! - `GeometryType` classification
//!
//! # Design
//!
//! The planar algebra (`geo`) is strictly 2-D. Z ordinates ride alongside
//! the geometry as a flat list in coordinate traversal order, which is the
//! order the WKB codec reads and writes coordinates. Operations that build
//! new geometries drop Z.

use crate::bbox::BBox;
use crate::error::{Result, SpatialError};
use geo::CoordsIter;
use geo_types::{Geometry, GeometryCollection, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// SRID of geometries built without an explicit reference system.
pub const DEFAULT_SRID: i32 = 0;

/// SRID assigned to EWKT without an `SRID=` prefix.
pub const UNKNOWN_SRID: i32 = -1;

/// Geometry type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeometryType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl GeometryType {
    /// Classify a geo-types Geometry.
    pub fn from_geometry(geom: &Geometry<f64>) -> Self {
        match geom {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryType::Polygon
            }
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// OGC WKB type code (without dimension or SRID flags).
    pub fn wkb_code(&self) -> u32 {
        *self as u32
    }

    pub fn from_wkb_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(GeometryType::Point),
            2 => Some(GeometryType::LineString),
            3 => Some(GeometryType::Polygon),
            4 => Some(GeometryType::MultiPoint),
            5 => Some(GeometryType::MultiLineString),
            6 => Some(GeometryType::MultiPolygon),
            7 => Some(GeometryType::GeometryCollection),
            _ => None,
        }
    }

    /// Upper-case OGC name, e.g. `MULTIPOLYGON`.
    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Point => "POINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::Polygon => "POLYGON",
            GeometryType::MultiPoint => "MULTIPOINT",
            GeometryType::MultiLineString => "MULTILINESTRING",
            GeometryType::MultiPolygon => "MULTIPOLYGON",
            GeometryType::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }

    /// Check if this is a point type.
    pub fn is_point(&self) -> bool {
        matches!(self, GeometryType::Point | GeometryType::MultiPoint)
    }

    /// Check if this is a polygonal type.
    pub fn is_polygonal(&self) -> bool {
        matches!(self, GeometryType::Polygon | GeometryType::MultiPolygon)
    }
}

/// A geometry with its spatial reference identifier and optional Z values.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGeometry {
    geometry: Geometry<f64>,
    srid: i32,
    z: Option<Vec<f64>>,
}

impl SpatialGeometry {
    /// Wrap a 2-D geometry with the default SRID.
    ///
    /// `Line`, `Rect` and `Triangle` are normalized to the LineString and
    /// Polygon forms the binary format can represent.
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: normalize(geometry),
            srid: DEFAULT_SRID,
            z: None,
        }
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self::new(Geometry::Point(Point::new(x, y)))
    }

    pub fn point_z(x: f64, y: f64, z: f64) -> Self {
        Self {
            geometry: Geometry::Point(Point::new(x, y)),
            srid: DEFAULT_SRID,
            z: Some(vec![z]),
        }
    }

    /// Parse WKT and tag it with `srid`.
    ///
    /// Z ordinates are kept when every coordinate has one, whether tagged
    /// (`POINT Z (1 2 3)`) or not (`POINT (1 2 3)`). M ordinates are dropped.
    pub fn from_wkt(wkt: &str, srid: i32) -> Result<Self> {
        let parsed = read_wkt(wkt)?;
        let z = flat_z(&parsed);
        let geometry = Self::new(convert_wkt(parsed)?).with_srid(srid);
        match z {
            Some(z) => geometry.with_z(z),
            None => Ok(geometry),
        }
    }

    /// Parse `SRID=<srid>;<WKT>` or plain WKT (SRID [`UNKNOWN_SRID`]).
    pub fn from_ewkt(ewkt: &str) -> Result<Self> {
        let trimmed = ewkt.trim();
        let has_prefix = trimmed
            .get(..5)
            .map(|p| p.eq_ignore_ascii_case("SRID="))
            .unwrap_or(false);
        if !has_prefix {
            return Self::from_wkt(trimmed, UNKNOWN_SRID);
        }

        let (prefix, wkt) = trimmed.split_once(';').ok_or_else(|| {
            SpatialError::WktParse(
                "Could not read EWKT format, should be 'SRID=<srid>;<WKT>'".to_string(),
            )
        })?;
        let srid = prefix[5..]
            .trim()
            .parse::<i32>()
            .map_err(|e| SpatialError::WktParse(format!("invalid SRID {:?}: {}", prefix, e)))?;
        Self::from_wkt(wkt, srid)
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    pub fn set_srid(&mut self, srid: i32) {
        self.srid = srid;
    }

    /// Attach Z ordinates, one per coordinate in traversal order.
    pub fn with_z(mut self, z: Vec<f64>) -> Result<Self> {
        let expected = self.geometry.coords_count();
        if z.len() != expected {
            return Err(SpatialError::InvalidGeometry(format!(
                "{} Z values for {} coordinates",
                z.len(),
                expected
            )));
        }
        self.z = Some(z);
        Ok(self)
    }

    /// Drop Z ordinates.
    pub fn force_2d(mut self) -> Self {
        self.z = None;
        self
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn into_geometry(self) -> Geometry<f64> {
        self.geometry
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn z(&self) -> Option<&[f64]> {
        self.z.as_deref()
    }

    pub fn has_z(&self) -> bool {
        self.z.is_some()
    }

    pub fn geometry_type(&self) -> GeometryType {
        GeometryType::from_geometry(&self.geometry)
    }

    /// Bounding box; [`BBox::EMPTY`] for empty geometries.
    pub fn envelope(&self) -> BBox {
        BBox::from_geometry(&self.geometry)
    }

    pub fn is_empty(&self) -> bool {
        use geo::HasDimensions;
        self.geometry.is_empty()
    }

    /// 2-D WKT, e.g. `POINT(10 10)`.
    pub fn to_wkt(&self) -> String {
        use wkt::ToWkt;
        self.geometry.wkt_string()
    }

    /// `SRID=<srid>;<WKT>`.
    pub fn to_ewkt(&self) -> String {
        format!("SRID={};{}", self.srid, self.to_wkt())
    }
}

impl From<Geometry<f64>> for SpatialGeometry {
    fn from(geometry: Geometry<f64>) -> Self {
        Self::new(geometry)
    }
}

fn normalize(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Line(line) => Geometry::LineString(LineString::from(vec![line.start, line.end])),
        Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon()),
        Geometry::Triangle(tri) => Geometry::Polygon(tri.to_polygon()),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection(
            gc.0.into_iter().map(normalize).collect(),
        )),
        other => other,
    }
}

/// Parse WKT string to geo-types Geometry.
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    read_wkt(wkt).and_then(convert_wkt)
}

fn read_wkt(wkt: &str) -> Result<wkt::Wkt<f64>> {
    use std::str::FromStr;
    wkt::Wkt::from_str(&tag_dimensions(wkt.trim()))
        .map_err(|e| SpatialError::WktParse(format!("{:?}", e)))
}

fn convert_wkt(wkt: wkt::Wkt<f64>) -> Result<Geometry<f64>> {
    wkt.try_into()
        .map_err(|e: wkt::conversion::Error| SpatialError::WktParse(format!("{:?}", e)))
}

const DIMENSIONED_KEYWORDS: [&str; 7] = [
    "POINT",
    "LINESTRING",
    "LINEARRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
];

/// Insert a `Z` or `ZM` tag after every untagged geometry keyword whose
/// first coordinate has three or four ordinates.
///
/// The `wkt` reader only accepts extra ordinates after an explicit tag.
fn tag_dimensions(wkt: &str) -> Cow<'_, str> {
    let bytes = wkt.as_bytes();
    let mut tagged: Option<String> = None;
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_alphabetic() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let word = &wkt[start..i];
        if !DIMENSIONED_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(word))
        {
            continue;
        }
        let rest = wkt[i..].trim_start();
        if !rest.starts_with('(') {
            continue;
        }
        let tag = match first_coordinate_width(rest) {
            3 => " Z",
            4 => " ZM",
            _ => continue,
        };
        let out = tagged.get_or_insert_with(|| String::with_capacity(wkt.len() + 8));
        out.push_str(&wkt[copied..i]);
        out.push_str(tag);
        copied = i;
    }
    match tagged {
        Some(mut out) => {
            out.push_str(&wkt[copied..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(wkt),
    }
}

fn first_coordinate_width(body: &str) -> usize {
    body.trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .split(|c| c == ',' || c == ')')
        .next()
        .map(|coord| coord.split_whitespace().count())
        .unwrap_or(0)
}

/// Z ordinates in traversal order, when every coordinate carries one.
fn flat_z(wkt: &wkt::Wkt<f64>) -> Option<Vec<f64>> {
    let mut z = Vec::new();
    collect_z(wkt, &mut z);
    if z.is_empty() {
        return None;
    }
    z.into_iter().collect()
}

fn collect_z(wkt: &wkt::Wkt<f64>, out: &mut Vec<Option<f64>>) {
    use wkt::Wkt;
    match wkt {
        Wkt::Point(p) => out.extend(p.0.iter().map(|c| c.z)),
        Wkt::LineString(ls) => out.extend(ls.0.iter().map(|c| c.z)),
        Wkt::Polygon(p) => p.0.iter().for_each(|ring| ring_z(&ring.0, out)),
        Wkt::MultiPoint(mp) => mp
            .0
            .iter()
            .for_each(|p| out.extend(p.0.iter().map(|c| c.z))),
        Wkt::MultiLineString(mls) => mls
            .0
            .iter()
            .for_each(|ls| out.extend(ls.0.iter().map(|c| c.z))),
        Wkt::MultiPolygon(mp) => mp
            .0
            .iter()
            .flat_map(|p| p.0.iter())
            .for_each(|ring| ring_z(&ring.0, out)),
        Wkt::GeometryCollection(gc) => gc.0.iter().for_each(|g| collect_z(g, out)),
    }
}

/// Polygon rings are closed on conversion, repeating the first coordinate.
fn ring_z(ring: &[wkt::types::Coord<f64>], out: &mut Vec<Option<f64>>) {
    out.extend(ring.iter().map(|c| c.z));
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if first.x != last.x || first.y != last.y {
            out.push(first.z);
        }
    }
}

/// Polygonal parts of a geometry; empty when it has none.
pub(crate) fn polygonal_parts(geom: &Geometry<f64>) -> Vec<Polygon<f64>> {
    match geom {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(polygonal_parts).collect(),
        _ => Vec::new(),
    }
}
