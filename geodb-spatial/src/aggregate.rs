//! Streaming geometry aggregates.
//!
//! Two reducers share one contract: `Extent` keeps the running envelope of
//! its inputs, `Union` the running geometric union. Accumulators start
//! empty, absorb values one at a time with [`GeometryAggregate::add`], and
//! combine partial states with [`GeometryAggregate::merge`], so a scan can
//! be split across workers ([`fold_parallel`]) and merged afterwards.
//!
//! Null and empty inputs contribute nothing; an aggregate that saw no
//! contributing input has no result. The result carries the SRID of the
//! first contributing input.

use crate::bbox::BBox;
use crate::error::{Result, SpatialError};
use crate::ewkb;
use crate::geometry::{polygonal_parts, SpatialGeometry};
use geo::{BooleanOps, Intersects};
use geo_types::{
    Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon,
};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Aggregate reducer selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateKind {
    Extent,
    Union,
}

impl AggregateKind {
    /// SQL-facing function name.
    pub fn name(&self) -> &'static str {
        match self {
            AggregateKind::Extent => "ST_Extent",
            AggregateKind::Union => "ST_Union",
        }
    }
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    /// Running envelope and the SRID of the first input.
    Extent(Option<(BBox, i32)>),
    /// Running union.
    Union(Option<SpatialGeometry>),
}

/// Accumulator for one aggregate over a group of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryAggregate {
    state: State,
}

impl GeometryAggregate {
    pub fn new(kind: AggregateKind) -> Self {
        let state = match kind {
            AggregateKind::Extent => State::Extent(None),
            AggregateKind::Union => State::Union(None),
        };
        Self { state }
    }

    pub fn kind(&self) -> AggregateKind {
        match self.state {
            State::Extent(_) => AggregateKind::Extent,
            State::Union(_) => AggregateKind::Union,
        }
    }

    /// True until a contributing input has been added.
    pub fn is_empty(&self) -> bool {
        match &self.state {
            State::Extent(acc) => acc.is_none(),
            State::Union(acc) => acc.is_none(),
        }
    }

    /// Absorb one value.
    pub fn add(&mut self, geom: Option<&SpatialGeometry>) {
        let Some(geom) = geom else { return };
        if geom.is_empty() {
            return;
        }
        match &mut self.state {
            State::Extent(acc) => absorb_envelope(acc, geom.envelope(), geom.srid()),
            State::Union(acc) => {
                *acc = Some(match acc.take() {
                    None => geom.clone(),
                    Some(prev) => union_pair(&prev, geom),
                });
            }
        }
    }

    /// Absorb one value in the envelope-prefixed binary format.
    ///
    /// `Extent` reads only the envelope and header; `Union` decodes fully.
    pub fn add_bytes(&mut self, bytes: Option<&[u8]>) -> Result<()> {
        let Some(bytes) = bytes else { return Ok(()) };
        match &mut self.state {
            State::Extent(acc) => {
                let envelope = ewkb::decode_envelope(bytes)?;
                if !envelope.is_empty() {
                    absorb_envelope(acc, envelope, ewkb::decode_srid(bytes)?);
                }
                Ok(())
            }
            State::Union(_) => {
                let geom = ewkb::decode(bytes)?;
                self.add(Some(&geom));
                Ok(())
            }
        }
    }

    /// Fold another partial state of the same kind into this one.
    ///
    /// `self` is treated as the earlier partition: its SRID wins when both
    /// sides have contributed.
    pub fn merge(&mut self, other: GeometryAggregate) -> Result<()> {
        let (kind, other_kind) = (self.kind(), other.kind());
        match (&mut self.state, other.state) {
            (State::Extent(acc), State::Extent(rhs)) => {
                if let Some((envelope, srid)) = rhs {
                    absorb_envelope(acc, envelope, srid);
                }
                Ok(())
            }
            (State::Union(acc), State::Union(rhs)) => {
                if let Some(rhs) = rhs {
                    *acc = Some(match acc.take() {
                        None => rhs,
                        Some(prev) => union_pair(&prev, &rhs),
                    });
                }
                Ok(())
            }
            _ => Err(SpatialError::InvalidGeometry(format!(
                "cannot merge {} state into {}",
                other_kind, kind
            ))),
        }
    }

    /// Final value; `None` when nothing contributed.
    pub fn result(&self) -> Option<SpatialGeometry> {
        match &self.state {
            State::Extent(acc) => acc.and_then(|(envelope, srid)| {
                envelope
                    .to_geometry()
                    .map(|g| SpatialGeometry::new(g).with_srid(srid))
            }),
            State::Union(acc) => acc.clone(),
        }
    }

    /// Serialize the partial state.
    pub fn to_bytes(&self) -> Result<Option<Vec<u8>>> {
        ewkb::encode_opt(self.result().as_ref())
    }

    /// Restore a partial state written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(kind: AggregateKind, bytes: Option<&[u8]>) -> Result<Self> {
        let mut agg = Self::new(kind);
        agg.add_bytes(bytes)?;
        Ok(agg)
    }
}

fn absorb_envelope(acc: &mut Option<(BBox, i32)>, envelope: BBox, srid: i32) {
    if envelope.is_empty() {
        return;
    }
    *acc = Some(match acc.take() {
        None => (envelope, srid),
        Some((prev, first_srid)) => (prev.combine(&envelope), first_srid),
    });
}

/// Components of a geometry split by dimension.
#[derive(Default)]
struct Parts {
    polygons: Vec<Polygon<f64>>,
    lines: Vec<LineString<f64>>,
    points: Vec<Point<f64>>,
}

impl Parts {
    fn collect(&mut self, geom: &Geometry<f64>) {
        match geom {
            Geometry::Point(p) => self.points.push(*p),
            Geometry::MultiPoint(mp) => self.points.extend(mp.0.iter().copied()),
            Geometry::Line(l) => self.lines.push(LineString::from(vec![l.start, l.end])),
            Geometry::LineString(ls) => self.lines.push(ls.clone()),
            Geometry::MultiLineString(mls) => self.lines.extend(mls.0.iter().cloned()),
            Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| self.collect(g)),
            polygonal => self.polygons.extend(polygonal_parts(polygonal)),
        }
    }
}

/// Union of two non-empty geometries. Z is not carried into the result.
///
/// Lines are clipped to the parts outside the polygons and points are kept
/// only when no polygon or line covers them, so lower-dimensional inputs
/// never survive inside higher-dimensional ones.
fn union_pair(a: &SpatialGeometry, b: &SpatialGeometry) -> SpatialGeometry {
    let mut lhs = Parts::default();
    lhs.collect(a.geometry());
    let mut rhs = Parts::default();
    rhs.collect(b.geometry());

    let polygons = match (lhs.polygons.is_empty(), rhs.polygons.is_empty()) {
        (true, true) => MultiPolygon(Vec::new()),
        (false, true) => MultiPolygon(lhs.polygons),
        (true, false) => MultiPolygon(rhs.polygons),
        (false, false) => MultiPolygon(lhs.polygons).union(&MultiPolygon(rhs.polygons)),
    };

    let mut lines = MultiLineString(lhs.lines);
    lines.0.extend(rhs.lines);
    if !polygons.0.is_empty() && !lines.0.is_empty() {
        lines = polygons.clip(&lines, true);
    }
    let mut seen_lines = FxHashSet::default();
    let mut lines: Vec<LineString<f64>> = lines
        .0
        .into_iter()
        .filter(|ls| ls.0.len() > 1 && seen_lines.insert(line_key(ls)))
        .collect();
    let line_cover = MultiLineString(lines.clone());

    let mut seen = FxHashSet::default();
    let points: Vec<Point<f64>> = lhs
        .points
        .into_iter()
        .chain(rhs.points)
        .filter(|p| seen.insert((p.x().to_bits(), p.y().to_bits())))
        .filter(|p| !polygons.intersects(p) && !line_cover.intersects(p))
        .collect();

    let mut members = Vec::with_capacity(3);
    if !polygons.0.is_empty() {
        members.push(collapse_polygons(polygons));
    }
    if !lines.is_empty() {
        members.push(if lines.len() == 1 {
            Geometry::LineString(lines.remove(0))
        } else {
            Geometry::MultiLineString(MultiLineString(lines))
        });
    }
    if !points.is_empty() {
        members.push(if points.len() == 1 {
            Geometry::Point(points[0])
        } else {
            Geometry::MultiPoint(MultiPoint(points))
        });
    }

    let geometry = match members.len() {
        0 => Geometry::GeometryCollection(GeometryCollection(Vec::new())),
        1 => members.remove(0),
        _ => Geometry::GeometryCollection(GeometryCollection(members)),
    };
    SpatialGeometry::new(geometry).with_srid(a.srid())
}

/// Direction-independent identity of a line's vertex sequence.
fn line_key(line: &LineString<f64>) -> Vec<(u64, u64)> {
    let forward: Vec<(u64, u64)> = line
        .0
        .iter()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    let mut reversed = forward.clone();
    reversed.reverse();
    forward.min(reversed)
}

fn collapse_polygons(mut polygons: MultiPolygon<f64>) -> Geometry<f64> {
    if polygons.0.len() == 1 {
        Geometry::Polygon(polygons.0.remove(0))
    } else {
        Geometry::MultiPolygon(polygons)
    }
}

/// Aggregate a slice across the rayon pool and merge the partial states in
/// input order.
pub fn fold_parallel(kind: AggregateKind, geoms: &[SpatialGeometry]) -> Result<GeometryAggregate> {
    let span = tracing::debug_span!(
        "aggregate_fold_parallel",
        kind = kind.name(),
        input_count = geoms.len(),
        rayon_threads = rayon::current_num_threads()
    );
    let _guard = span.enter();

    let agg = geoms
        .par_iter()
        .fold(
            || GeometryAggregate::new(kind),
            |mut acc, geom| {
                acc.add(Some(geom));
                acc
            },
        )
        .map(Ok::<_, SpatialError>)
        .try_reduce(
            || GeometryAggregate::new(kind),
            |mut lhs, rhs| {
                lhs.merge(rhs)?;
                Ok(lhs)
            },
        )?;

    tracing::debug!(empty = agg.is_empty(), "parallel aggregate folded");
    Ok(agg)
}

pub fn extent_init() -> GeometryAggregate {
    GeometryAggregate::new(AggregateKind::Extent)
}

pub fn extent_add(state: &mut GeometryAggregate, value: Option<&[u8]>) -> Result<()> {
    state.add_bytes(value)
}

pub fn extent_merge(state: &mut GeometryAggregate, other: GeometryAggregate) -> Result<()> {
    state.merge(other)
}

pub fn extent_result(state: &GeometryAggregate) -> Result<Option<Vec<u8>>> {
    state.to_bytes()
}

pub fn union_init() -> GeometryAggregate {
    GeometryAggregate::new(AggregateKind::Union)
}

pub fn union_add(state: &mut GeometryAggregate, value: Option<&[u8]>) -> Result<()> {
    state.add_bytes(value)
}

pub fn union_merge(state: &mut GeometryAggregate, other: GeometryAggregate) -> Result<()> {
    state.merge(other)
}

pub fn union_result(state: &GeometryAggregate) -> Result<Option<Vec<u8>>> {
    state.to_bytes()
}
