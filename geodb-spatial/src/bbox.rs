//! Axis-aligned bounding box arithmetic.
//!
//! `BBox` is both the reference frame of the geohash codec and the envelope
//! exchanged with the geometry library. An empty geometry has the all-NaN
//! [`BBox::EMPTY`] envelope, which intersects nothing and is absorbed by
//! [`BBox::combine`].

use geo_types::{coord, Geometry, LineString, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    /// World-geographic reference frame `(-180, -90, 180, 90)`.
    pub const WGS84: BBox = BBox {
        min_x: -180.0,
        min_y: -90.0,
        max_x: 180.0,
        max_y: 90.0,
    };

    /// Envelope of an empty geometry.
    pub const EMPTY: BBox = BBox {
        min_x: f64::NAN,
        min_y: f64::NAN,
        max_x: f64::NAN,
        max_y: f64::NAN,
    };

    /// Create a new bounding box.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Box spanning two arbitrary corners.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2))
    }

    /// Degenerate box of a single point.
    pub fn from_point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    pub fn from_rect(rect: &Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    /// Envelope of a geometry; `EMPTY` when it has no coordinates.
    pub fn from_geometry(geom: &Geometry<f64>) -> Self {
        use geo::BoundingRect;
        geom.bounding_rect()
            .map(|rect| Self::from_rect(&rect))
            .unwrap_or(Self::EMPTY)
    }

    /// True for the envelope of an empty geometry.
    pub fn is_empty(&self) -> bool {
        self.min_x.is_nan() || self.min_y.is_nan() || self.max_x.is_nan() || self.max_y.is_nan()
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.width() * self.height()
    }

    /// Check if this bbox intersects another (touching edges count).
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Check if this bbox contains a point.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if this bbox fully contains another bbox.
    pub fn contains_bbox(&self, other: &BBox) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Smallest box enclosing both; an empty side is the identity.
    pub fn combine(&self, other: &BBox) -> BBox {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        BBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Overlapping region, `None` when the boxes are disjoint.
    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        if !self.intersects(other) {
            return None;
        }
        Some(BBox::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        ))
    }

    /// The box as a geometry: Point when degenerate in both axes, LineString
    /// when degenerate in one, Polygon otherwise.
    pub fn to_geometry(&self) -> Option<Geometry<f64>> {
        if self.is_empty() {
            return None;
        }
        let zero_w = self.width() == 0.0;
        let zero_h = self.height() == 0.0;
        let geom = match (zero_w, zero_h) {
            (true, true) => Geometry::Point(Point::new(self.min_x, self.min_y)),
            (true, false) | (false, true) => Geometry::LineString(LineString::new(vec![
                coord! { x: self.min_x, y: self.min_y },
                coord! { x: self.max_x, y: self.max_y },
            ])),
            (false, false) => Geometry::Polygon(self.to_polygon()),
        };
        Some(geom)
    }

    /// Closed counter-clockwise ring starting at the lower-left corner.
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::new(vec![
                coord! { x: self.min_x, y: self.min_y },
                coord! { x: self.max_x, y: self.min_y },
                coord! { x: self.max_x, y: self.max_y },
                coord! { x: self.min_x, y: self.max_y },
                coord! { x: self.min_x, y: self.min_y },
            ]),
            vec![],
        )
    }
}

impl std::fmt::Display for BBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{},{},{})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
