//! SQL-callable spatial functions over envelope-prefixed geometry values.
//!
//! Every geometry argument and result is the binary format of
//! [`crate::ewkb`]. SQL NULL is `None`: a null argument yields a null
//! result, except predicates, which answer `false`.
//!
//! Results built from two inputs carry the SRID of the first.

use crate::aggregate::{AggregateKind, GeometryAggregate};
use crate::bbox::BBox;
use crate::cursor::ByteOrder;
use crate::error::{Result, SpatialError};
use crate::ewkb;
use crate::geohash::geohash_bbox;
use crate::geometry::{polygonal_parts, SpatialGeometry, DEFAULT_SRID};
use crate::wkb;
use geo::coordinate_position::CoordPos;
use geo::dimensions::Dimensions;
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::relate::IntersectionMatrix;
use geo::{
    Area, BooleanOps, Centroid, ConvexHull, Distance, Euclidean, HasDimensions, Relate, Simplify,
    Validation,
};
use geo_types::{
    Coord, Geometry, GeometryCollection, Line, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Polygon,
};
use rustc_hash::FxHashSet;

type Bytes<'a> = Option<&'a [u8]>;

fn encode(geom: SpatialGeometry) -> Result<Option<Vec<u8>>> {
    ewkb::encode(&geom).map(Some)
}

/// Decode, apply, and re-encode a single geometry.
fn map_geometry<F>(value: Bytes<'_>, f: F) -> Result<Option<Vec<u8>>>
where
    F: FnOnce(SpatialGeometry) -> Result<SpatialGeometry>,
{
    match ewkb::decode_opt(value)? {
        Some(geom) => encode(f(geom)?),
        None => Ok(None),
    }
}

fn decode_pair(a: Bytes<'_>, b: Bytes<'_>) -> Result<Option<(SpatialGeometry, SpatialGeometry)>> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(Some((ewkb::decode(a)?, ewkb::decode(b)?))),
        _ => Ok(None),
    }
}

fn relate(a: Bytes<'_>, b: Bytes<'_>, test: impl FnOnce(&IntersectionMatrix) -> bool) -> Result<bool> {
    Ok(match decode_pair(a, b)? {
        Some((a, b)) => test(&a.geometry().relate(b.geometry())),
        None => false,
    })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// WKT without SRID.
pub fn st_as_text(value: Bytes<'_>) -> Result<Option<String>> {
    Ok(ewkb::decode_opt(value)?.map(|g| g.to_wkt()))
}

/// `SRID=<srid>;<WKT>`.
pub fn st_as_ewkt(value: Bytes<'_>) -> Result<Option<String>> {
    Ok(ewkb::decode_opt(value)?.map(|g| g.to_ewkt()))
}

/// Plain big-endian EWKB with SRID, without the envelope prefix.
pub fn st_as_ewkb(value: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    ewkb::decode_opt(value)?
        .map(|g| wkb::write_ewkb(&g, ByteOrder::BigEndian))
        .transpose()
}

/// [`st_as_ewkb`] as upper-case hex.
pub fn st_as_hex_ewkb(value: Bytes<'_>) -> Result<Option<String>> {
    Ok(st_as_ewkb(value)?.map(hex::encode_upper))
}

/// Geohash of the stored envelope; null for empty geometries.
pub fn st_geohash(value: Bytes<'_>) -> Result<Option<String>> {
    Ok(ewkb::decode_envelope_opt(value)?.and_then(|envelope| geohash_bbox(&envelope)))
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

pub fn st_geom_from_text(wkt: Option<&str>, srid: i32) -> Result<Option<Vec<u8>>> {
    match wkt {
        Some(wkt) => encode(SpatialGeometry::from_wkt(wkt, srid)?),
        None => Ok(None),
    }
}

pub fn st_geom_from_ewkt(ewkt: Option<&str>) -> Result<Option<Vec<u8>>> {
    match ewkt {
        Some(ewkt) => encode(SpatialGeometry::from_ewkt(ewkt)?),
        None => Ok(None),
    }
}

/// Build from WKB, replacing any embedded SRID with `srid`.
pub fn st_geom_from_wkb(wkb_bytes: Bytes<'_>, srid: i32) -> Result<Option<Vec<u8>>> {
    match wkb_bytes {
        Some(bytes) => encode(wkb::read_wkb(bytes)?.with_srid(srid)),
        None => Ok(None),
    }
}

/// Build from EWKB, keeping its SRID.
pub fn st_geom_from_ewkb(ewkb_bytes: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    match ewkb_bytes {
        Some(bytes) => encode(wkb::read_wkb(bytes)?),
        None => Ok(None),
    }
}

pub fn st_make_point(x: f64, y: f64) -> Result<Vec<u8>> {
    ewkb::encode(&SpatialGeometry::point(x, y))
}

pub fn st_make_point_z(x: f64, y: f64, z: f64) -> Result<Vec<u8>> {
    ewkb::encode(&SpatialGeometry::point_z(x, y, z))
}

/// Box spanned by two points.
pub fn st_make_box2d(lower_left: Bytes<'_>, upper_right: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    let Some((a, b)) = decode_pair(lower_left, upper_right)? else {
        return Ok(None);
    };
    let (Geometry::Point(p1), Geometry::Point(p2)) = (a.geometry(), b.geometry()) else {
        return Err(SpatialError::InvalidGeometry(
            "ST_MakeBox2D expects two points".to_string(),
        ));
    };
    let srid = a.srid();
    box_geometry(BBox::from_corners(p1.x(), p1.y(), p2.x(), p2.y()), srid).map(Some)
}

/// Box spanned by four ordinates.
pub fn st_make_box2d_xy(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Vec<u8>> {
    box_geometry(BBox::from_corners(x1, y1, x2, y2), DEFAULT_SRID)
}

fn box_geometry(bbox: BBox, srid: i32) -> Result<Vec<u8>> {
    let geometry = bbox.to_geometry().ok_or_else(|| {
        SpatialError::InvalidGeometry(format!("box {} has no extent", bbox))
    })?;
    ewkb::encode(&SpatialGeometry::new(geometry).with_srid(srid))
}

// ---------------------------------------------------------------------------
// Accessors and editors
// ---------------------------------------------------------------------------

/// Upper-case type name, e.g. `POLYGON`.
pub fn geometry_type(value: Bytes<'_>) -> Result<Option<String>> {
    Ok(ewkb::decode_opt(value)?.map(|g| g.geometry_type().name().to_string()))
}

/// Envelope as a geometry.
pub fn st_envelope(value: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    let Some(bytes) = value else { return Ok(None) };
    let envelope = ewkb::decode_envelope(bytes)?;
    let srid = ewkb::decode_srid(bytes)?;
    match envelope.to_geometry() {
        Some(g) => encode(SpatialGeometry::new(g).with_srid(srid)),
        None => encode(
            SpatialGeometry::new(Geometry::GeometryCollection(GeometryCollection(Vec::new())))
                .with_srid(srid),
        ),
    }
}

/// `(minx,miny,maxx,maxy)` from the envelope prefix alone.
pub fn envelope_as_text(value: Bytes<'_>) -> Result<Option<String>> {
    Ok(ewkb::decode_envelope_opt(value)?.map(|b| b.to_string()))
}

pub fn st_srid(value: Bytes<'_>) -> Result<Option<i32>> {
    value.map(ewkb::decode_srid).transpose()
}

pub fn st_is_empty(value: Bytes<'_>) -> Result<Option<bool>> {
    Ok(ewkb::decode_opt(value)?.map(|g| g.is_empty()))
}

/// Topological dimension: 0 points, 1 lines, 2 areas. Empty is 0.
pub fn st_dimension(value: Bytes<'_>) -> Result<Option<i32>> {
    Ok(ewkb::decode_opt(value)?.map(|g| match g.geometry().dimensions() {
        Dimensions::Empty | Dimensions::ZeroDimensional => 0,
        Dimensions::OneDimensional => 1,
        Dimensions::TwoDimensional => 2,
    }))
}

/// X of a point; null for other geometries.
pub fn st_x(value: Bytes<'_>) -> Result<Option<f64>> {
    Ok(ewkb::decode_opt(value)?.and_then(|g| match g.geometry() {
        Geometry::Point(p) => Some(p.x()),
        _ => None,
    }))
}

pub fn st_y(value: Bytes<'_>) -> Result<Option<f64>> {
    Ok(ewkb::decode_opt(value)?.and_then(|g| match g.geometry() {
        Geometry::Point(p) => Some(p.y()),
        _ => None,
    }))
}

/// Z of a point; null when absent.
pub fn st_z(value: Bytes<'_>) -> Result<Option<f64>> {
    Ok(ewkb::decode_opt(value)?.and_then(|g| match (g.geometry(), g.z()) {
        (Geometry::Point(_), Some([z])) if !z.is_nan() => Some(*z),
        _ => None,
    }))
}

pub fn st_set_srid(value: Bytes<'_>, srid: i32) -> Result<Option<Vec<u8>>> {
    map_geometry(value, |g| Ok(g.with_srid(srid)))
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Envelope overlap, read from the prefixes only.
pub fn st_bbox(a: Bytes<'_>, b: Bytes<'_>) -> Result<bool> {
    match (a, b) {
        (Some(a), Some(b)) => {
            Ok(ewkb::decode_envelope(a)?.intersects(&ewkb::decode_envelope(b)?))
        }
        _ => Ok(false),
    }
}

pub fn st_contains(a: Bytes<'_>, b: Bytes<'_>) -> Result<bool> {
    relate(a, b, IntersectionMatrix::is_contains)
}

pub fn st_crosses(a: Bytes<'_>, b: Bytes<'_>) -> Result<bool> {
    relate(a, b, IntersectionMatrix::is_crosses)
}

pub fn st_disjoint(a: Bytes<'_>, b: Bytes<'_>) -> Result<bool> {
    relate(a, b, IntersectionMatrix::is_disjoint)
}

pub fn st_equals(a: Bytes<'_>, b: Bytes<'_>) -> Result<bool> {
    relate(a, b, IntersectionMatrix::is_equal_topo)
}

pub fn st_intersects(a: Bytes<'_>, b: Bytes<'_>) -> Result<bool> {
    if !st_bbox(a, b)? {
        return Ok(false);
    }
    relate(a, b, IntersectionMatrix::is_intersects)
}

pub fn st_overlaps(a: Bytes<'_>, b: Bytes<'_>) -> Result<bool> {
    relate(a, b, IntersectionMatrix::is_overlaps)
}

pub fn st_touches(a: Bytes<'_>, b: Bytes<'_>) -> Result<bool> {
    relate(a, b, IntersectionMatrix::is_touches)
}

pub fn st_within(a: Bytes<'_>, b: Bytes<'_>) -> Result<bool> {
    relate(a, b, IntersectionMatrix::is_within)
}

/// True when the geometries are within `distance` of each other.
pub fn st_dwithin(a: Bytes<'_>, b: Bytes<'_>, distance: f64) -> Result<bool> {
    Ok(st_distance(a, b)?.is_some_and(|d| d <= distance))
}

/// Match the DE-9IM matrix against a pattern such as `T*F**F***`.
pub fn st_relate_pattern(a: Bytes<'_>, b: Bytes<'_>, pattern: &str) -> Result<bool> {
    let Some((a, b)) = decode_pair(a, b)? else {
        return Ok(false);
    };
    a.geometry()
        .relate(b.geometry())
        .matches(pattern)
        .map_err(|e| SpatialError::InvalidGeometry(format!("DE-9IM pattern {:?}: {:?}", pattern, e)))
}

/// Full DE-9IM matrix as its nine-character string, e.g. `0F2FF1FF2`.
pub fn st_relate(a: Bytes<'_>, b: Bytes<'_>) -> Result<Option<String>> {
    Ok(decode_pair(a, b)?.map(|(a, b)| matrix_string(&a.geometry().relate(b.geometry()))))
}

fn matrix_string(matrix: &IntersectionMatrix) -> String {
    const POSITIONS: [CoordPos; 3] = [CoordPos::Inside, CoordPos::OnBoundary, CoordPos::Outside];
    POSITIONS
        .iter()
        .flat_map(|lhs| {
            POSITIONS.iter().map(move |rhs| match matrix.get(*lhs, *rhs) {
                Dimensions::Empty => 'F',
                Dimensions::ZeroDimensional => '0',
                Dimensions::OneDimensional => '1',
                Dimensions::TwoDimensional => '2',
            })
        })
        .collect()
}

/// OGC validity: closed non-degenerate rings, holes inside shells, no
/// self-intersecting polygon boundaries.
pub fn st_is_valid(value: Bytes<'_>) -> Result<Option<bool>> {
    Ok(ewkb::decode_opt(value)?.map(|g| g.geometry().is_valid()))
}

/// OGC simplicity: no self-intersection or self-tangency.
///
/// Lines may only touch themselves at consecutive vertices (and at the
/// closing vertex of a ring), members of a multi-line only at endpoints,
/// and a multi-point may not repeat a point.
pub fn st_is_simple(value: Bytes<'_>) -> Result<Option<bool>> {
    Ok(ewkb::decode_opt(value)?.map(|g| is_simple(g.geometry())))
}

fn is_simple(geom: &Geometry<f64>) -> bool {
    match geom {
        Geometry::Point(_) | Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => true,
        Geometry::MultiPoint(mp) => {
            let mut seen = FxHashSet::default();
            mp.0.iter().all(|p| seen.insert((p.x().to_bits(), p.y().to_bits())))
        }
        Geometry::LineString(ls) => line_is_simple(ls),
        Geometry::MultiLineString(mls) => {
            mls.0.iter().all(line_is_simple) && lines_touch_at_boundaries(&mls.0)
        }
        Geometry::Polygon(p) => rings_are_simple(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().all(rings_are_simple),
        Geometry::GeometryCollection(gc) => gc.0.iter().all(is_simple),
    }
}

fn segments(line: &LineString<f64>) -> Vec<Line<f64>> {
    let mut coords = line.0.clone();
    coords.dedup();
    coords.windows(2).map(|w| Line::new(w[0], w[1])).collect()
}

fn line_is_simple(line: &LineString<f64>) -> bool {
    let segments = segments(line);
    let last = segments.len().saturating_sub(1);
    let closed = segments.len() > 2 && line.is_closed();
    for (i, a) in segments.iter().enumerate() {
        for (j, b) in segments.iter().enumerate().skip(i + 1) {
            let allowed = match line_intersection(*a, *b) {
                None => true,
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    (j == i + 1 && intersection == a.end)
                        || (closed && i == 0 && j == last && intersection == a.start)
                }
                Some(LineIntersection::Collinear { .. }) => false,
            };
            if !allowed {
                return false;
            }
        }
    }
    true
}

/// Endpoints of an open line; a closed line has no boundary.
fn line_boundary(line: &LineString<f64>) -> Vec<Coord<f64>> {
    match (line.0.first(), line.0.last()) {
        (Some(first), Some(last)) if first != last => vec![*first, *last],
        _ => Vec::new(),
    }
}

fn lines_touch_at_boundaries(lines: &[LineString<f64>]) -> bool {
    lines.iter().enumerate().all(|(i, a)| {
        let a_boundary = line_boundary(a);
        lines[i + 1..].iter().all(|b| {
            let b_boundary = line_boundary(b);
            segments(a).iter().all(|sa| {
                segments(b).iter().all(|sb| match line_intersection(*sa, *sb) {
                    None => true,
                    Some(LineIntersection::SinglePoint { intersection, .. }) => {
                        a_boundary.contains(&intersection) && b_boundary.contains(&intersection)
                    }
                    Some(LineIntersection::Collinear { .. }) => false,
                })
            })
        })
    })
}

fn rings_are_simple(polygon: &Polygon<f64>) -> bool {
    line_is_simple(polygon.exterior()) && polygon.interiors().iter().all(line_is_simple)
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

pub fn st_area(value: Bytes<'_>) -> Result<Option<f64>> {
    Ok(ewkb::decode_opt(value)?.map(|g| g.geometry().unsigned_area()))
}

/// Minimum planar distance.
pub fn st_distance(a: Bytes<'_>, b: Bytes<'_>) -> Result<Option<f64>> {
    Ok(decode_pair(a, b)?.map(|(a, b)| Euclidean.distance(a.geometry(), b.geometry())))
}

/// Centroid; null for empty geometries.
pub fn st_centroid(value: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    let Some(geom) = ewkb::decode_opt(value)? else {
        return Ok(None);
    };
    match geom.geometry().centroid() {
        Some(c) => encode(SpatialGeometry::new(Geometry::Point(c)).with_srid(geom.srid())),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

/// Douglas-Peucker simplification of lines and polygons; points pass
/// through.
pub fn st_simplify(value: Bytes<'_>, tolerance: f64) -> Result<Option<Vec<u8>>> {
    if !(tolerance >= 0.0) {
        return Err(SpatialError::InvalidGeometry(format!(
            "simplify tolerance must be non-negative, got {}",
            tolerance
        )));
    }
    map_geometry(value, |g| {
        let srid = g.srid();
        Ok(SpatialGeometry::new(simplify(g.into_geometry(), tolerance)).with_srid(srid))
    })
}

fn simplify(geom: Geometry<f64>, tolerance: f64) -> Geometry<f64> {
    match geom {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify(&tolerance)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls.simplify(&tolerance)),
        Geometry::Polygon(p) => Geometry::Polygon(p.simplify(&tolerance)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(&tolerance)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection(
            gc.0.into_iter().map(|g| simplify(g, tolerance)).collect(),
        )),
        other => other,
    }
}

pub fn st_convex_hull(value: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    map_geometry(value, |g| {
        let hull = g.geometry().convex_hull();
        Ok(SpatialGeometry::new(Geometry::Polygon(hull)).with_srid(g.srid()))
    })
}

/// Rings of polygons, endpoints of open lines; points have an empty
/// boundary.
pub fn st_boundary(value: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    map_geometry(value, |g| {
        let boundary = boundary(g.geometry());
        Ok(SpatialGeometry::new(boundary).with_srid(g.srid()))
    })
}

fn boundary(geom: &Geometry<f64>) -> Geometry<f64> {
    fn endpoints(lines: &[LineString<f64>]) -> Geometry<f64> {
        let points = lines
            .iter()
            .filter(|ls| !ls.is_closed())
            .flat_map(|ls| ls.points().next().into_iter().chain(ls.points().last()))
            .collect();
        Geometry::MultiPoint(MultiPoint(points))
    }

    match geom {
        Geometry::LineString(ls) => endpoints(std::slice::from_ref(ls)),
        Geometry::MultiLineString(mls) => endpoints(&mls.0),
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {
            let rings = polygonal_parts(geom)
                .iter()
                .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
                .cloned()
                .collect();
            Geometry::MultiLineString(MultiLineString(rings))
        }
        _ => Geometry::GeometryCollection(GeometryCollection(Vec::new())),
    }
}

fn polygonal(geom: &SpatialGeometry, function: &str) -> Result<MultiPolygon<f64>> {
    let parts = polygonal_parts(geom.geometry());
    if parts.is_empty() && !geom.is_empty() {
        return Err(SpatialError::InvalidGeometry(format!(
            "{} supports polygonal geometries, got {}",
            function,
            geom.geometry_type().name()
        )));
    }
    Ok(MultiPolygon(parts))
}

fn overlay<F>(a: Bytes<'_>, b: Bytes<'_>, function: &str, op: F) -> Result<Option<Vec<u8>>>
where
    F: FnOnce(&MultiPolygon<f64>, &MultiPolygon<f64>) -> MultiPolygon<f64>,
{
    let Some((a, b)) = decode_pair(a, b)? else {
        return Ok(None);
    };
    let result = op(&polygonal(&a, function)?, &polygonal(&b, function)?);
    encode(SpatialGeometry::new(Geometry::MultiPolygon(result)).with_srid(a.srid()))
}

pub fn st_intersection(a: Bytes<'_>, b: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    overlay(a, b, "ST_Intersection", |a, b| a.intersection(b))
}

pub fn st_difference(a: Bytes<'_>, b: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    overlay(a, b, "ST_Difference", |a, b| a.difference(b))
}

pub fn st_sym_difference(a: Bytes<'_>, b: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    overlay(a, b, "ST_SymDifference", |a, b| a.xor(b))
}

/// Union of two values; a null side yields the other side.
pub fn st_union(a: Bytes<'_>, b: Bytes<'_>) -> Result<Option<Vec<u8>>> {
    match (a, b) {
        (None, None) => Ok(None),
        (Some(only), None) | (None, Some(only)) => Ok(Some(only.to_vec())),
        (Some(_), Some(_)) => {
            let mut agg = GeometryAggregate::new(AggregateKind::Union);
            agg.add_bytes(a)?;
            agg.add_bytes(b)?;
            agg.to_bytes()
        }
    }
}
