//! Envelope-prefixed binary geometry storage format.
//!
//! ```text
//! offset  size  content
//! 0       32    envelope: min_x, min_y, max_x, max_y as big-endian f64
//! 32      1     0x00 (big-endian payload)
//! 33      4     type word; byte 33 carries the SRID flag 0x20
//! 37      4     SRID, big-endian i32
//! 41      ...   coordinates and members, big-endian WKB
//! ```
//!
//! Bytes 32.. are a self-contained EWKB geometry, so any EWKB reader can
//! consume the payload after skipping the envelope. The envelope alone is
//! enough for bounding-box filters and index maintenance, which read
//! [`decode_envelope`] without touching the payload.

use crate::bbox::BBox;
use crate::cursor::{ByteOrder, ByteReader, ByteWriter};
use crate::error::{Result, SpatialError};
use crate::geometry::SpatialGeometry;
use crate::wkb;

/// Length of the envelope prefix.
pub const ENVELOPE_LEN: usize = 32;

/// Envelope plus byte-order marker, type word and SRID.
pub const HEADER_LEN: usize = ENVELOPE_LEN + 9;

/// Encode a geometry with its envelope prefix.
///
/// Empty geometries get an all-NaN envelope.
pub fn encode(geom: &SpatialGeometry) -> Result<Vec<u8>> {
    let envelope = geom.envelope();
    let mut out = ByteWriter::with_capacity(HEADER_LEN + 16 * geom_size_hint(geom));
    for v in [envelope.min_x, envelope.min_y, envelope.max_x, envelope.max_y] {
        out.write_f64(v, ByteOrder::BigEndian);
    }
    wkb::write_into(&mut out, geom, ByteOrder::BigEndian, true)?;
    Ok(out.into_inner())
}

fn geom_size_hint(geom: &SpatialGeometry) -> usize {
    use geo::CoordsIter;
    geom.geometry().coords_count()
}

/// Decode a full geometry, restoring its SRID.
pub fn decode(bytes: &[u8]) -> Result<SpatialGeometry> {
    if bytes.len() < HEADER_LEN {
        return Err(SpatialError::truncated(
            "envelope geometry",
            HEADER_LEN,
            bytes.len(),
        ));
    }
    let payload = &bytes[ENVELOPE_LEN..];
    if !wkb::read_header(payload)?.has_srid {
        return Err(SpatialError::Decode(
            "geometry payload has no SRID".to_string(),
        ));
    }
    wkb::read_wkb(payload)
}

/// Decode only the 32-byte envelope prefix.
pub fn decode_envelope(bytes: &[u8]) -> Result<BBox> {
    let mut cursor = ByteReader::new(bytes);
    if cursor.remaining() < ENVELOPE_LEN {
        return Err(SpatialError::truncated(
            "envelope",
            ENVELOPE_LEN,
            cursor.remaining(),
        ));
    }
    let min_x = cursor.read_f64(ByteOrder::BigEndian)?;
    let min_y = cursor.read_f64(ByteOrder::BigEndian)?;
    let max_x = cursor.read_f64(ByteOrder::BigEndian)?;
    let max_y = cursor.read_f64(ByteOrder::BigEndian)?;
    Ok(BBox::new(min_x, min_y, max_x, max_y))
}

/// Read the SRID from the payload header without decoding coordinates.
pub fn decode_srid(bytes: &[u8]) -> Result<i32> {
    let payload = bytes
        .get(ENVELOPE_LEN..)
        .ok_or_else(|| SpatialError::truncated("envelope", ENVELOPE_LEN, bytes.len()))?;
    let mut cursor = ByteReader::new(payload);
    let order = cursor.read_byte_order()?;
    let word = cursor.read_u32(order)?;
    if word & wkb::WKB_SRID_FLAG == 0 {
        return Err(SpatialError::Decode(
            "geometry payload has no SRID".to_string(),
        ));
    }
    cursor.read_i32(order)
}

/// IEEE-754 binary64, big-endian.
pub fn f64_to_be_bytes(value: f64) -> [u8; 8] {
    value.to_be_bytes()
}

pub fn f64_from_be_bytes(bytes: [u8; 8]) -> f64 {
    f64::from_be_bytes(bytes)
}

/// [`encode`] with null passthrough.
pub fn encode_opt(geom: Option<&SpatialGeometry>) -> Result<Option<Vec<u8>>> {
    geom.map(encode).transpose()
}

/// [`decode`] with null passthrough.
pub fn decode_opt(bytes: Option<&[u8]>) -> Result<Option<SpatialGeometry>> {
    bytes.map(decode).transpose()
}

/// [`decode_envelope`] with null passthrough.
pub fn decode_envelope_opt(bytes: Option<&[u8]>) -> Result<Option<BBox>> {
    bytes.map(decode_envelope).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::parse_wkt;
    use crate::wkb::WKB_SRID_FLAG;

    #[test]
    fn test_point_z_with_srid_roundtrip() {
        let g = SpatialGeometry::point_z(10.0, 10.0, -5.0).with_srid(4326);
        let bytes = encode(&g).unwrap();

        assert_eq!(decode_envelope(&bytes).unwrap(), BBox::new(10.0, 10.0, 10.0, 10.0));
        assert_eq!(bytes[32], 0x00);
        assert_eq!(bytes[33] & 0x20, 0x20);
        assert_eq!(&bytes[37..41], &4326i32.to_be_bytes());

        let back = decode(&bytes).unwrap();
        assert_eq!(back.srid(), 4326);
        assert_eq!(back.z(), Some(&[-5.0][..]));
        assert_eq!(back.to_ewkt(), "SRID=4326;POINT(10 10)");
    }

    #[test]
    fn test_envelope_prefix_matches_geometry() {
        let g = SpatialGeometry::new(
            parse_wkt("LINESTRING(-75.2 39.9, -75.1 40.0, -74.9 39.95)").unwrap(),
        );
        let bytes = encode(&g).unwrap();
        assert_eq!(decode_envelope(&bytes).unwrap(), g.envelope());
        assert_eq!(decode(&bytes).unwrap(), g);
    }

    #[test]
    fn test_envelope_only_needs_prefix() {
        let bytes = encode(&SpatialGeometry::point(1.0, 2.0)).unwrap();
        let envelope = decode_envelope(&bytes[..ENVELOPE_LEN]).unwrap();
        assert_eq!(envelope, BBox::new(1.0, 2.0, 1.0, 2.0));
        assert!(decode(&bytes[..ENVELOPE_LEN]).is_err());
    }

    #[test]
    fn test_payload_is_plain_ewkb() {
        let g = SpatialGeometry::point(3.0, 4.0).with_srid(3857);
        let bytes = encode(&g).unwrap();
        assert_eq!(
            &bytes[ENVELOPE_LEN..],
            &wkb::write_ewkb(&g, ByteOrder::BigEndian).unwrap()[..]
        );
    }

    #[test]
    fn test_empty_geometry_has_nan_envelope() {
        let g = SpatialGeometry::new(parse_wkt("GEOMETRYCOLLECTION EMPTY").unwrap());
        let bytes = encode(&g).unwrap();
        assert!(decode_envelope(&bytes).unwrap().is_empty());
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_buffers() {
        assert!(matches!(decode_envelope(&[0u8; 31]), Err(SpatialError::Decode(_))));
        assert!(matches!(decode(&[0u8; 40]), Err(SpatialError::Decode(_))));
    }

    #[test]
    fn test_invalid_type_word() {
        let mut bytes = encode(&SpatialGeometry::point(1.0, 1.0)).unwrap();
        bytes[36] = 0x09;
        assert!(matches!(decode(&bytes), Err(SpatialError::Decode(_))));
    }

    #[test]
    fn test_missing_srid_flag_rejected() {
        let mut bytes = encode(&SpatialGeometry::point(1.0, 1.0)).unwrap();
        bytes[33] &= !((WKB_SRID_FLAG >> 24) as u8);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_srid_from_header() {
        let bytes = encode(&SpatialGeometry::point(1.0, 1.0).with_srid(27700)).unwrap();
        assert_eq!(decode_srid(&bytes).unwrap(), 27700);
        assert!(decode_srid(&bytes[..38]).is_err());
    }

    #[test]
    fn test_envelope_doubles_are_big_endian() {
        let bytes = encode(&SpatialGeometry::point(-0.25, 51.5)).unwrap();
        let mut min_x = [0u8; 8];
        min_x.copy_from_slice(&bytes[0..8]);
        assert_eq!(min_x, f64_to_be_bytes(-0.25));
        assert_eq!(f64_from_be_bytes(min_x), -0.25);
    }

    #[test]
    fn test_null_passthrough() {
        assert!(encode_opt(None).unwrap().is_none());
        assert!(decode_opt(None).unwrap().is_none());
        assert!(decode_envelope_opt(None).unwrap().is_none());

        let bytes = encode_opt(Some(&SpatialGeometry::point(0.0, 0.0)))
            .unwrap()
            .unwrap();
        assert!(decode_opt(Some(&bytes)).unwrap().is_some());
    }
}
