//! Bit-interleaved geohash strings.
//!
//! A `GeoString` names a cell of a recursive quadtree subdivision of a
//! reference rectangle. Each level contributes one x bit and one y bit, so
//! the hash of a point at depth `d` is `2d` characters of `'0'`/`'1'`:
//!
//! ```text
//! level:   0     1     2    ...
//! chars:  x0 y0 x1 y1 x2 y2 ...
//! ```
//!
//! A cell's hash is a prefix of the hash of every point inside it, which
//! turns spatial containment into string-prefix comparison over an ordinary
//! sorted index.

use crate::bbox::BBox;
use crate::config::{validate_depth, GeoHashConfig};
use crate::error::{Result, SpatialError};

/// Decimal digits kept when denormalizing a decoded cell.
const DECODE_PRECISION: i32 = 6;

/// An immutable geohash bound to a reference box and depth.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoString {
    reference: BBox,
    depth: u32,
    hash: String,
}

impl GeoString {
    /// Encode a point against `reference` at `depth` levels.
    pub fn encode(x: f64, y: f64, reference: BBox, depth: u32) -> Result<Self> {
        validate_depth(depth)?;
        Ok(Self::encode_unchecked(x, y, reference, depth))
    }

    /// Encode a point with the reference box and depth of `config`.
    pub fn encode_with(x: f64, y: f64, config: &GeoHashConfig) -> Result<Self> {
        Self::encode(x, y, config.reference, config.depth)
    }

    pub(crate) fn encode_unchecked(x: f64, y: f64, reference: BBox, depth: u32) -> Self {
        let x_bits = to_bits((x - reference.min_x) / reference.width(), depth);
        let y_bits = to_bits((y - reference.min_y) / reference.height(), depth);

        let mut hash = String::with_capacity(2 * depth as usize);
        for (xb, yb) in x_bits.zip(y_bits) {
            hash.push(if xb { '1' } else { '0' });
            hash.push(if yb { '1' } else { '0' });
        }

        Self {
            reference,
            depth,
            hash,
        }
    }

    /// Wrap an existing hash string for decoding.
    pub fn from_hash(hash: impl Into<String>, reference: BBox, depth: u32) -> Result<Self> {
        validate_depth(depth)?;
        let hash = hash.into();
        if hash.len() > 2 * depth as usize {
            return Err(SpatialError::Decode(format!(
                "geohash of length {} exceeds depth {}",
                hash.len(),
                depth
            )));
        }
        if let Some(bad) = hash.chars().find(|c| *c != '0' && *c != '1') {
            return Err(SpatialError::Decode(format!(
                "invalid geohash character {:?}",
                bad
            )));
        }
        Ok(Self {
            reference,
            depth,
            hash,
        })
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn reference(&self) -> &BBox {
        &self.reference
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }

    pub fn into_hash(self) -> String {
        self.hash
    }

    /// Cell covered by the whole hash.
    pub fn bbox(&self) -> BBox {
        decode_bbox(&self.hash, &self.reference)
    }

    /// Cell covered by the first `prefix_len` characters.
    pub fn bbox_at(&self, prefix_len: usize) -> BBox {
        let end = prefix_len.min(self.hash.len());
        decode_bbox(&self.hash[..end], &self.reference)
    }

    /// Smallest common ancestor cell: the longest common prefix of both
    /// hashes, bound to this string's reference box and depth.
    pub fn union(&self, other: &GeoString) -> GeoString {
        let common = self
            .hash
            .bytes()
            .zip(other.hash.bytes())
            .take_while(|(a, b)| a == b)
            .count();

        GeoString {
            reference: self.reference,
            depth: self.depth,
            hash: self.hash[..common].to_string(),
        }
    }

    /// True when this cell contains (or equals) the cell of `other`.
    pub fn is_ancestor_of(&self, other: &GeoString) -> bool {
        other.hash.starts_with(&self.hash)
    }
}

impl std::fmt::Display for GeoString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hash)
    }
}

/// Fixed-point binary expansion of a normalized coordinate, most
/// significant bit first.
///
/// The scaled value saturates into `[0, 2^depth - 1]`: the far edge of the
/// reference box and coordinates outside it fall into the nearest edge cell.
fn to_bits(normalized: f64, depth: u32) -> impl Iterator<Item = bool> {
    let max = (1u64 << depth) - 1;
    // `as` saturates: NaN and negatives become 0.
    let scaled = ((normalized * (1u64 << depth) as f64) as u64).min(max);
    (1..=depth).map(move |i| (scaled >> (depth - i)) & 1 == 1)
}

/// Reconstruct the cell of a hash prefix in the reference frame.
///
/// Odd-length prefixes carry a trailing x bit with no matching y bit; the
/// cell width still follows the number of complete levels. A single
/// character halves the box horizontally and the empty prefix is the whole
/// reference box.
pub fn decode_bbox(prefix: &str, reference: &BBox) -> BBox {
    let len = prefix.len();
    let finished = len / 2;

    let mut min_x = 0.0;
    let mut min_y = 0.0;
    for (i, c) in prefix.bytes().enumerate() {
        if c != b'1' {
            continue;
        }
        let contribution = 1.0 / 2f64.powi((i / 2) as i32 + 1);
        if i % 2 == 0 {
            min_x += contribution;
        } else {
            min_y += contribution;
        }
    }

    let (max_x, max_y) = if finished > 0 {
        let width = 1.0 / 2f64.powi(finished as i32);
        ((min_x + width).min(1.0), (min_y + width).min(1.0))
    } else if len == 1 {
        ((min_x + 0.5).min(1.0), 1.0)
    } else {
        (1.0, 1.0)
    };

    BBox::new(
        round(reference.min_x + min_x * reference.width()),
        round(reference.min_y + min_y * reference.height()),
        round(reference.min_x + max_x * reference.width()),
        round(reference.min_y + max_y * reference.height()),
    )
}

/// Decode a literal hash against a reference box and depth.
pub fn geostring_bbox(hash: &str, reference: BBox, depth: u32) -> Result<BBox> {
    Ok(GeoString::from_hash(hash, reference, depth)?.bbox())
}

/// Round to `DECODE_PRECISION` decimals, ties toward positive infinity.
fn round(value: f64) -> f64 {
    let scale = 10f64.powi(DECODE_PRECISION);
    (value * scale + 0.5).floor() / scale
}
