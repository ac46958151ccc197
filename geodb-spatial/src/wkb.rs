//! WKB reader and writer on top of the georust `wkb` crate.
//!
//! Reads OGC WKB (type codes 1-7), ISO dimensioned codes (1000 / 2000 /
//! 3000 offsets) and PostGIS EWKB flags:
//!
//! | flag         | meaning            |
//! |--------------|--------------------|
//! | `0x80000000` | coordinates have Z |
//! | `0x40000000` | coordinates have M |
//! | `0x20000000` | SRID follows       |
//!
//! Input is walked once with a bounds-checked scan before it reaches
//! `wkb::reader::read_wkb`, which assumes well-formed buffers. Members of
//! multi-geometries must share the parent's byte order and dimensions;
//! collection members are free to differ.
//!
//! M values are discarded. Z values are collected in coordinate traversal
//! order into [`SpatialGeometry::z`].
//!
//! The writer emits ISO WKB through `wkb::writer::write_geometry`. EWKB
//! output rewrites the top-level type word to the PostGIS flag form and
//! inserts the SRID after it.

use crate::cursor::{ByteOrder, ByteReader, ByteWriter};
use crate::error::{Result, SpatialError};
use crate::geometry::{GeometryType, SpatialGeometry, DEFAULT_SRID};
use geo_traits::{
    CoordTrait, Dimensions, GeometryCollectionTrait, GeometryTrait, LineStringTrait,
    MultiLineStringTrait, MultiPointTrait, MultiPolygonTrait, PointTrait, PolygonTrait,
};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use ::wkb::Endianness;

pub const WKB_Z_FLAG: u32 = 0x8000_0000;
pub const WKB_M_FLAG: u32 = 0x4000_0000;
pub const WKB_SRID_FLAG: u32 = 0x2000_0000;

const FLAG_MASK: u32 = WKB_Z_FLAG | WKB_M_FLAG | WKB_SRID_FLAG;

/// Byte-order marker plus type word.
const HEADER_LEN: usize = 5;

/// Collections nested deeper than this are rejected.
const MAX_NESTING: usize = 64;

/// Decoded geometry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WkbHeader {
    pub byte_order: ByteOrder,
    pub geometry_type: GeometryType,
    pub has_z: bool,
    pub has_m: bool,
    pub has_srid: bool,
}

impl WkbHeader {
    fn from_type_word(byte_order: ByteOrder, word: u32) -> Result<Self> {
        let base = word & !FLAG_MASK;
        let (iso_z, iso_m) = match base / 1000 {
            0 => (false, false),
            1 => (true, false),
            2 => (false, true),
            3 => (true, true),
            _ => return Err(unknown_type(word)),
        };
        let geometry_type =
            GeometryType::from_wkb_code(base % 1000).ok_or_else(|| unknown_type(word))?;

        Ok(Self {
            byte_order,
            geometry_type,
            has_z: iso_z || word & WKB_Z_FLAG != 0,
            has_m: iso_m || word & WKB_M_FLAG != 0,
            has_srid: word & WKB_SRID_FLAG != 0,
        })
    }

    fn read(cursor: &mut ByteReader<'_>) -> Result<Self> {
        let byte_order = cursor.read_byte_order()?;
        let word = cursor.read_u32(byte_order)?;
        Self::from_type_word(byte_order, word)
    }

    fn coord_len(&self) -> usize {
        8 * (2 + self.has_z as usize + self.has_m as usize)
    }

    /// PostGIS-style type word: base code plus flags.
    fn ewkb_word(&self, with_srid: bool) -> u32 {
        let mut word = self.geometry_type.wkb_code();
        if self.has_z {
            word |= WKB_Z_FLAG;
        }
        if self.has_m {
            word |= WKB_M_FLAG;
        }
        if with_srid {
            word |= WKB_SRID_FLAG;
        }
        word
    }
}

fn unknown_type(word: u32) -> SpatialError {
    SpatialError::Decode(format!("unknown WKB geometry type: {:#010x}", word))
}

/// Read only the leading header of a WKB buffer.
pub fn read_header(data: &[u8]) -> Result<WkbHeader> {
    WkbHeader::read(&mut ByteReader::new(data))
}

/// Decode a WKB or EWKB buffer.
///
/// The SRID of the top-level header is restored when present; otherwise the
/// geometry gets [`DEFAULT_SRID`]. Bytes after the geometry are ignored.
pub fn read_wkb(data: &[u8]) -> Result<SpatialGeometry> {
    let mut scan = Scan {
        cursor: ByteReader::new(data),
    };
    let (header, srid) = scan.geometry(0)?;
    let len = scan.cursor.position();

    let parsed = ::wkb::reader::read_wkb(&data[..len])
        .map_err(|e| SpatialError::Decode(format!("WKB: {}", e)))?;
    let mut collector = ZCollector::default();
    let geometry = collector.geometry(&parsed)?;

    let mut out = SpatialGeometry::new(geometry).with_srid(srid.unwrap_or(DEFAULT_SRID));
    if collector.any_z {
        out = out.with_z(collector.z)?;
    }
    tracing::trace!(
        geometry_type = header.geometry_type.name(),
        has_z = header.has_z,
        bytes = len,
        "decoded WKB"
    );
    Ok(out)
}

/// Structural pass over untrusted input: byte orders, type words, counts
/// against the remaining length, member types and nesting depth.
struct Scan<'a> {
    cursor: ByteReader<'a>,
}

impl Scan<'_> {
    fn geometry(&mut self, nesting: usize) -> Result<(WkbHeader, Option<i32>)> {
        if nesting > MAX_NESTING {
            return Err(SpatialError::Decode(format!(
                "geometry nesting exceeds {} levels",
                MAX_NESTING
            )));
        }

        let header = WkbHeader::read(&mut self.cursor)?;
        let srid = if header.has_srid {
            Some(self.cursor.read_i32(header.byte_order)?)
        } else {
            None
        };

        match header.geometry_type {
            GeometryType::Point => self.skip(header.coord_len())?,
            GeometryType::LineString => self.coords(&header)?,
            GeometryType::Polygon => {
                let rings = self.count(&header, 4)?;
                for _ in 0..rings {
                    self.coords(&header)?;
                }
            }
            GeometryType::MultiPoint => self.members(&header, GeometryType::Point, nesting)?,
            GeometryType::MultiLineString => {
                self.members(&header, GeometryType::LineString, nesting)?
            }
            GeometryType::MultiPolygon => {
                self.members(&header, GeometryType::Polygon, nesting)?
            }
            GeometryType::GeometryCollection => {
                let n = self.count(&header, HEADER_LEN)?;
                for _ in 0..n {
                    self.geometry(nesting + 1)?;
                }
            }
        }
        Ok((header, srid))
    }

    /// Members of a multi-geometry, laid out with the parent's byte order
    /// and dimensions and without SRIDs of their own.
    fn members(&mut self, parent: &WkbHeader, expected: GeometryType, nesting: usize) -> Result<()> {
        let n = self.count(parent, HEADER_LEN)?;
        for _ in 0..n {
            let start = self.cursor.position();
            let (member, srid) = self.geometry(nesting + 1)?;
            if member.geometry_type != expected {
                return Err(SpatialError::Decode(format!(
                    "{} member cannot be {}",
                    parent.geometry_type.name(),
                    member.geometry_type.name()
                )));
            }
            if member.byte_order != parent.byte_order
                || member.has_z != parent.has_z
                || member.has_m != parent.has_m
                || srid.is_some()
            {
                return Err(SpatialError::Decode(format!(
                    "{} member at byte {} does not match its parent layout",
                    parent.geometry_type.name(),
                    start
                )));
            }
        }
        Ok(())
    }

    /// Element count, bounded by what the remaining buffer could hold.
    fn count(&mut self, header: &WkbHeader, min_element_len: usize) -> Result<usize> {
        let n = self.cursor.read_u32(header.byte_order)? as usize;
        let available = self.cursor.remaining();
        if n.saturating_mul(min_element_len) > available {
            return Err(SpatialError::Decode(format!(
                "element count {} exceeds remaining {} bytes",
                n, available
            )));
        }
        Ok(n)
    }

    fn coords(&mut self, header: &WkbHeader) -> Result<()> {
        let n = self.count(header, header.coord_len())?;
        self.skip(n * header.coord_len())
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.cursor.skip(len, "WKB coordinates")
    }
}

/// Builds geo-types geometries from a parsed WKB view, gathering Z values
/// in traversal order (NaN where a coordinate has none).
#[derive(Default)]
struct ZCollector {
    z: Vec<f64>,
    any_z: bool,
}

impl ZCollector {
    fn geometry<G: GeometryTrait<T = f64>>(&mut self, geom: &G) -> Result<Geometry<f64>> {
        use geo_traits::GeometryType as Shape;
        Ok(match geom.as_type() {
            Shape::Point(p) => Geometry::Point(self.point(p)),
            Shape::LineString(ls) => Geometry::LineString(self.line_string(ls)),
            Shape::Polygon(p) => Geometry::Polygon(self.polygon(p)),
            Shape::MultiPoint(mp) => {
                Geometry::MultiPoint(MultiPoint(mp.points().map(|p| self.point(&p)).collect()))
            }
            Shape::MultiLineString(mls) => Geometry::MultiLineString(MultiLineString(
                mls.line_strings().map(|ls| self.line_string(&ls)).collect(),
            )),
            Shape::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon(
                mp.polygons().map(|p| self.polygon(&p)).collect(),
            )),
            Shape::GeometryCollection(gc) => {
                let mut members = Vec::with_capacity(gc.num_geometries());
                for member in gc.geometries() {
                    members.push(self.geometry(&member)?);
                }
                Geometry::GeometryCollection(GeometryCollection(members))
            }
            Shape::Rect(_) | Shape::Triangle(_) | Shape::Line(_) => {
                return Err(SpatialError::Decode(
                    "WKB reader produced a non-OGC geometry".to_string(),
                ))
            }
        })
    }

    fn coord<C: CoordTrait<T = f64>>(&mut self, c: &C) -> Coord<f64> {
        let z = match c.dim() {
            Dimensions::Xyz | Dimensions::Xyzm => c.nth(2),
            _ => None,
        };
        match z {
            Some(z) => {
                self.z.push(z);
                self.any_z = true;
            }
            None => self.z.push(f64::NAN),
        }
        Coord { x: c.x(), y: c.y() }
    }

    /// An empty point reads back as NaN ordinates.
    fn point<P: PointTrait<T = f64>>(&mut self, p: &P) -> Point<f64> {
        match p.coord() {
            Some(c) => Point(self.coord(&c)),
            None => {
                self.z.push(f64::NAN);
                Point::new(f64::NAN, f64::NAN)
            }
        }
    }

    fn line_string<L: LineStringTrait<T = f64>>(&mut self, ls: &L) -> LineString<f64> {
        LineString(ls.coords().map(|c| self.coord(&c)).collect())
    }

    /// Rings are closed on read so the Z list stays aligned with the
    /// coordinates of the resulting polygon.
    fn ring<L: LineStringTrait<T = f64>>(&mut self, ring: &L) -> LineString<f64> {
        let z_start = self.z.len();
        let mut ring = self.line_string(ring);
        if let (Some(&first), Some(&last)) = (ring.0.first(), ring.0.last()) {
            if first != last {
                ring.0.push(first);
                self.z.push(self.z[z_start]);
            }
        }
        ring
    }

    fn polygon<P: PolygonTrait<T = f64>>(&mut self, p: &P) -> Polygon<f64> {
        let Some(exterior) = p.exterior() else {
            return Polygon::new(LineString(Vec::new()), Vec::new());
        };
        let exterior = self.ring(&exterior);
        let interiors = p.interiors().map(|r| self.ring(&r)).collect();
        Polygon::new(exterior, interiors)
    }
}

/// Encode as ISO WKB in the given byte order, without an SRID.
pub fn write_wkb(geom: &SpatialGeometry, order: ByteOrder) -> Result<Vec<u8>> {
    let mut out = ByteWriter::new();
    write_into(&mut out, geom, order, false)?;
    Ok(out.into_inner())
}

/// Encode as EWKB: the top-level type word carries the PostGIS flags and
/// the SRID follows it.
pub fn write_ewkb(geom: &SpatialGeometry, order: ByteOrder) -> Result<Vec<u8>> {
    let mut out = ByteWriter::new();
    write_into(&mut out, geom, order, true)?;
    Ok(out.into_inner())
}

pub(crate) fn write_into(
    out: &mut ByteWriter,
    geom: &SpatialGeometry,
    order: ByteOrder,
    with_srid: bool,
) -> Result<()> {
    let endianness = match order {
        ByteOrder::BigEndian => Endianness::BigEndian,
        ByteOrder::LittleEndian => Endianness::LittleEndian,
    };
    let mut iso = Vec::new();
    let written = match geom.z() {
        None => ::wkb::writer::write_geometry(&mut iso, geom.geometry(), endianness),
        Some(z) => {
            let mut feed = ZFeed { z, next: 0 };
            let with_z = feed.geometry(geom.geometry())?;
            if feed.next != z.len() {
                return Err(SpatialError::Encode(format!(
                    "{} Z values for {} coordinates",
                    z.len(),
                    feed.next
                )));
            }
            ::wkb::writer::write_geometry(&mut iso, &with_z, endianness)
        }
    };
    written.map_err(|e| SpatialError::Encode(format!("WKB: {}", e)))?;

    if !with_srid {
        out.write_bytes(&iso);
        return Ok(());
    }
    let header = read_header(&iso)?;
    out.write_u8(order as u8);
    out.write_u32(header.ewkb_word(true), order);
    out.write_i32(geom.srid(), order);
    out.write_bytes(&iso[HEADER_LEN..]);
    Ok(())
}

/// Rebuilds a geometry as `wkt` values so the writer sees Z ordinates.
struct ZFeed<'a> {
    z: &'a [f64],
    next: usize,
}

impl ZFeed<'_> {
    fn geometry(&mut self, geom: &Geometry<f64>) -> Result<wkt::Wkt<f64>> {
        use wkt::types;
        Ok(match geom {
            Geometry::Point(p) => wkt::Wkt::Point(types::Point(Some(self.coord(p.0)?))),
            Geometry::Line(line) => wkt::Wkt::LineString(self.line_string(&[line.start, line.end])?),
            Geometry::LineString(ls) => wkt::Wkt::LineString(self.line_string(&ls.0)?),
            Geometry::Polygon(p) => wkt::Wkt::Polygon(self.polygon(p)?),
            Geometry::Rect(r) => wkt::Wkt::Polygon(self.polygon(&r.to_polygon())?),
            Geometry::Triangle(t) => wkt::Wkt::Polygon(self.polygon(&t.to_polygon())?),
            Geometry::MultiPoint(mp) => wkt::Wkt::MultiPoint(types::MultiPoint(
                mp.0.iter()
                    .map(|p| Ok(types::Point(Some(self.coord(p.0)?))))
                    .collect::<Result<_>>()?,
            )),
            Geometry::MultiLineString(mls) => wkt::Wkt::MultiLineString(types::MultiLineString(
                mls.0.iter()
                    .map(|ls| self.line_string(&ls.0))
                    .collect::<Result<_>>()?,
            )),
            Geometry::MultiPolygon(mp) => wkt::Wkt::MultiPolygon(types::MultiPolygon(
                mp.0.iter().map(|p| self.polygon(p)).collect::<Result<_>>()?,
            )),
            Geometry::GeometryCollection(gc) => {
                wkt::Wkt::GeometryCollection(types::GeometryCollection(
                    gc.0.iter().map(|g| self.geometry(g)).collect::<Result<_>>()?,
                ))
            }
        })
    }

    fn coord(&mut self, c: Coord<f64>) -> Result<wkt::types::Coord<f64>> {
        let z = self.z.get(self.next).copied().ok_or_else(|| {
            SpatialError::Encode(format!("missing Z value for coordinate {}", self.next))
        })?;
        self.next += 1;
        Ok(wkt::types::Coord {
            x: c.x,
            y: c.y,
            z: Some(z),
            m: None,
        })
    }

    fn line_string(&mut self, coords: &[Coord<f64>]) -> Result<wkt::types::LineString<f64>> {
        Ok(wkt::types::LineString(
            coords.iter().map(|c| self.coord(*c)).collect::<Result<_>>()?,
        ))
    }

    fn polygon(&mut self, p: &Polygon<f64>) -> Result<wkt::types::Polygon<f64>> {
        if p.exterior().0.is_empty() {
            return Ok(wkt::types::Polygon(Vec::new()));
        }
        let mut rings = Vec::with_capacity(1 + p.interiors().len());
        rings.push(self.line_string(&p.exterior().0)?);
        for ring in p.interiors() {
            rings.push(self.line_string(&ring.0)?);
        }
        Ok(wkt::types::Polygon(rings))
    }
}
