//! End-to-end tests for the stored geometry format.
//!
//! Geometries travel WKT → envelope-prefixed bytes → functions / aggregates
//! and back, the way column values do inside the engine.

use geodb_spatial::functions::{
    st_as_ewkt, st_as_text, st_contains, st_geohash, st_geom_from_ewkt, st_geom_from_text,
    st_intersects, st_srid, st_z,
};
use geodb_spatial::{
    decode_bbox, ewkb, geohash, AggregateKind, BBox, GeometryAggregate, SpatialGeometry,
};

const SAMPLES: &[&str] = &[
    "SRID=4326;POINT(-0.1278 51.5074)",
    "SRID=4326;LINESTRING(-75.2 39.9,-75.1 40,-74.9 39.95)",
    "SRID=3857;POLYGON((0 0,10 0,10 10,0 10,0 0),(2 2,4 2,4 4,2 4,2 2))",
    "SRID=4326;MULTIPOINT((1 1),(2 2),(3 3))",
    "SRID=4326;MULTIPOLYGON(((0 0,1 0,1 1,0 0)),((5 5,6 5,6 6,5 5)))",
    "SRID=27700;GEOMETRYCOLLECTION(POINT(1 2),LINESTRING(0 0,5 5))",
];

#[test]
fn stored_values_round_trip_through_text() {
    for ewkt in SAMPLES {
        let stored = st_geom_from_ewkt(Some(ewkt)).unwrap().unwrap();
        let text = st_as_ewkt(Some(&stored)).unwrap().unwrap();
        let again = st_geom_from_ewkt(Some(&text)).unwrap().unwrap();
        assert_eq!(stored, again, "{}", ewkt);
    }
}

#[test]
fn envelope_prefix_agrees_with_full_decode() {
    for ewkt in SAMPLES {
        let geom = SpatialGeometry::from_ewkt(ewkt).unwrap();
        let bytes = ewkb::encode(&geom).unwrap();
        let envelope = ewkb::decode_envelope(&bytes).unwrap();
        assert_eq!(envelope, geom.envelope(), "{}", ewkt);
        assert_eq!(ewkb::decode(&bytes).unwrap().envelope(), envelope);
        assert_eq!(st_srid(Some(&bytes)).unwrap(), Some(geom.srid()));
    }
}

#[test]
fn geohash_cell_covers_stored_envelope() {
    for ewkt in SAMPLES.iter().filter(|s| s.starts_with("SRID=4326")) {
        let bytes = st_geom_from_ewkt(Some(ewkt)).unwrap().unwrap();
        let hash = st_geohash(Some(&bytes)).unwrap().unwrap();
        let cell = decode_bbox(&hash, &BBox::WGS84);
        let envelope = ewkb::decode_envelope(&bytes).unwrap();
        assert!(cell.contains_bbox(&envelope), "{} not covered by {}", ewkt, cell);
    }
}

#[test]
fn point_geohash_prefix_nests_inside_query_cell() {
    let query = geohash(-1.0, 51.0, 0.0, 52.0);
    let point = geohash(-0.1278, 51.5074, -0.1278, 51.5074);
    assert!(point.starts_with(&query));
}

#[test]
fn z_survives_storage() {
    let g = SpatialGeometry::point_z(10.0, 10.0, -5.0).with_srid(4326);
    let back = ewkb::decode(&ewkb::encode(&g).unwrap()).unwrap();
    assert_eq!(back, g);
    // Text output is 2-D.
    let bytes = ewkb::encode(&g).unwrap();
    assert_eq!(st_as_text(Some(&bytes)).unwrap().unwrap(), "POINT(10 10)");
}

#[test]
fn z_from_text_survives_storage() {
    let bytes = st_geom_from_text(Some("POINT (10 10 -5)"), 4326)
        .unwrap()
        .unwrap();
    assert_eq!(st_z(Some(&bytes)).unwrap(), Some(-5.0));
    assert_eq!(st_srid(Some(&bytes)).unwrap(), Some(4326));
    assert_eq!(ewkb::decode(&bytes).unwrap(), SpatialGeometry::point_z(10.0, 10.0, -5.0).with_srid(4326));

    let tagged = st_geom_from_ewkt(Some("SRID=4326;POINT Z (10 10 -5)")).unwrap().unwrap();
    assert_eq!(tagged, bytes);
}

#[test]
fn aggregates_over_stored_values() {
    let cells: Vec<Vec<u8>> = (0..4)
        .map(|i| {
            let x = (i % 2) as f64;
            let y = (i / 2) as f64;
            let wkt = format!(
                "SRID=4326;POLYGON(({x} {y},{x1} {y},{x1} {y1},{x} {y1},{x} {y}))",
                x = x,
                y = y,
                x1 = x + 1.0,
                y1 = y + 1.0
            );
            st_geom_from_ewkt(Some(&wkt)).unwrap().unwrap()
        })
        .collect();

    let mut extent = GeometryAggregate::new(AggregateKind::Extent);
    let mut union = GeometryAggregate::new(AggregateKind::Union);
    for bytes in &cells {
        extent.add_bytes(Some(bytes)).unwrap();
        union.add_bytes(Some(bytes)).unwrap();
    }
    extent.add_bytes(None).unwrap();

    let extent_bytes = extent.to_bytes().unwrap().unwrap();
    let union_bytes = union.to_bytes().unwrap().unwrap();
    assert_eq!(
        ewkb::decode_envelope(&extent_bytes).unwrap(),
        BBox::new(0.0, 0.0, 2.0, 2.0)
    );
    assert_eq!(
        ewkb::decode_envelope(&union_bytes).unwrap(),
        BBox::new(0.0, 0.0, 2.0, 2.0)
    );

    let sample = st_geom_from_ewkt(Some("SRID=4326;POINT(1.5 0.5)")).unwrap().unwrap();
    assert!(st_contains(Some(&union_bytes), Some(&sample)).unwrap());
    assert!(st_intersects(Some(&extent_bytes), Some(&sample)).unwrap());
}
