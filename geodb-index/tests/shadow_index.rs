//! End-to-end shadow index behavior over an in-memory table.

mod support;

use geodb_index::{
    create_spatial_index, drop_spatial_index, spatial_candidates, IndexError, MemoryTable, RowId,
    SpatialIndexConfig, SpatialTable, Value,
};
use geodb_spatial::functions::{st_geohash, st_make_point};
use geodb_spatial::{ewkb, BBox, GeoHashConfig, SpatialGeometry};
use support::init_test_tracing;

fn geometry(wkt: &str) -> Value {
    let g = SpatialGeometry::from_wkt(wkt, 4326).unwrap();
    Value::Bytes(ewkb::encode(&g).unwrap())
}

/// A 20x20 grid of points spaced 3 degrees apart around the origin.
fn grid(config: SpatialIndexConfig) -> MemoryTable {
    let mut table = MemoryTable::with_config("GRID", ["ID", "GEOM"], config);
    let mut id = 0i64;
    for i in -10..10 {
        for j in -10..10 {
            let point = st_make_point(i as f64 * 3.0 + 0.5, j as f64 * 3.0 + 0.25).unwrap();
            table.insert(vec![Value::Integer(id), Value::Bytes(point)]).unwrap();
            id += 1;
        }
    }
    table
}

fn brute_force(table: &MemoryTable, query: &BBox) -> Vec<RowId> {
    table
        .row_ids()
        .into_iter()
        .filter(|id| {
            table
                .value(*id, "GEOM")
                .and_then(Value::as_bytes)
                .map(|b| ewkb::decode_envelope(b).unwrap().intersects(query))
                .unwrap_or(false)
        })
        .collect()
}

const QUERIES: [BBox; 6] = [
    BBox { min_x: 0.0, min_y: 0.0, max_x: 10.0, max_y: 10.0 },
    BBox { min_x: -29.0, min_y: -29.0, max_x: -20.0, max_y: -25.0 },
    BBox { min_x: -5.0, min_y: 2.0, max_x: 5.0, max_y: 3.0 },
    BBox { min_x: 6.4, min_y: 6.2, max_x: 6.6, max_y: 6.3 },
    BBox { min_x: 100.0, min_y: 60.0, max_x: 120.0, max_y: 80.0 },
    BBox { min_x: -180.0, min_y: -90.0, max_x: 180.0, max_y: 90.0 },
];

#[test]
fn indexed_query_matches_brute_force() {
    let mut table = grid(SpatialIndexConfig::default());
    create_spatial_index(&mut table, "GEOM").unwrap();

    for query in &QUERIES {
        assert_eq!(
            spatial_candidates(&table, "GEOM", query).unwrap(),
            brute_force(&table, query),
            "query {}",
            query
        );
    }
    assert_eq!(spatial_candidates(&table, "GEOM", &QUERIES[5]).unwrap().len(), 400);
    assert_eq!(spatial_candidates(&table, "GEOM", &QUERIES[3]).unwrap().len(), 1);
}

#[test]
fn coarse_depth_still_exact() {
    let config = SpatialIndexConfig::default().with_geohash(GeoHashConfig::default().with_depth(6));
    let mut table = grid(config);
    create_spatial_index(&mut table, "GEOM").unwrap();

    for id in table.row_ids() {
        let hash = table.value(id, "_GEOM_GEOHASH").and_then(Value::as_text).unwrap();
        assert!(hash.len() <= 12);
    }
    for query in &QUERIES {
        assert_eq!(
            spatial_candidates(&table, "GEOM", query).unwrap(),
            brute_force(&table, query)
        );
    }
}

#[test]
fn shadow_matches_st_geohash() {
    let mut table = MemoryTable::new("SHAPES", ["ID", "GEOM"]);
    create_spatial_index(&mut table, "GEOM").unwrap();

    for wkt in [
        "POINT(-75.16 39.95)",
        "LINESTRING(10 10, 10.001 10.002)",
        "POLYGON((1 1, 2 1, 2 2, 1 2, 1 1))",
        "MULTIPOINT((-1 -1), (1 1))",
    ] {
        let value = geometry(wkt);
        let expected = st_geohash(value.as_bytes()).unwrap();
        let id = table
            .insert(vec![Value::Null, value, Value::Null])
            .unwrap();
        assert_eq!(
            table.value(id, "_GEOM_GEOHASH").and_then(Value::as_text),
            expected.as_deref(),
            "{}",
            wkt
        );
    }
}

#[test]
fn moved_rows_follow_their_geometry() {
    let mut table = grid(SpatialIndexConfig::default());
    create_spatial_index(&mut table, "GEOM").unwrap();
    let target = BBox::new(150.0, 40.0, 151.0, 41.0);
    assert!(spatial_candidates(&table, "GEOM", &target).unwrap().is_empty());

    table
        .update_value(17, "GEOM", geometry("POINT(150.5 40.5)"))
        .unwrap();
    assert_eq!(spatial_candidates(&table, "GEOM", &target).unwrap(), vec![17]);

    table.update_value(17, "GEOM", Value::Null).unwrap();
    assert!(spatial_candidates(&table, "GEOM", &target).unwrap().is_empty());
    assert_eq!(table.value(17, "_GEOM_GEOHASH"), Some(&Value::Null));
}

#[test]
fn undecodable_geometry_leaves_table_unchanged() {
    let mut table = grid(SpatialIndexConfig::default());
    create_spatial_index(&mut table, "GEOM").unwrap();
    let before = table.len();
    let indexed = table.index("_GEOM_GEOHASH_INDEX").unwrap().len();

    let err = table
        .insert(vec![Value::Integer(-1), Value::Bytes(vec![0u8; 12]), Value::Null])
        .unwrap_err();
    assert!(matches!(err, IndexError::Indexing(_)));

    let original = table.row(3).unwrap().to_vec();
    assert!(table
        .update_value(3, "GEOM", Value::Bytes(vec![7u8; 20]))
        .is_err());

    assert_eq!(table.len(), before);
    assert_eq!(table.index("_GEOM_GEOHASH_INDEX").unwrap().len(), indexed);
    assert_eq!(table.row(3).unwrap(), original.as_slice());
}

#[test]
fn drop_falls_back_to_full_scan() {
    let mut table = grid(SpatialIndexConfig::default());
    create_spatial_index(&mut table, "GEOM").unwrap();
    let indexed = spatial_candidates(&table, "GEOM", &QUERIES[0]).unwrap();

    drop_spatial_index(&mut table, "GEOM").unwrap();
    assert_eq!(table.columns().len(), 2);
    assert_eq!(spatial_candidates(&table, "GEOM", &QUERIES[0]).unwrap(), indexed);

    create_spatial_index(&mut table, "GEOM").unwrap();
    assert_eq!(spatial_candidates(&table, "GEOM", &QUERIES[0]).unwrap(), indexed);
}

#[test]
fn lifecycle_commands_are_instrumented() {
    let (store, _guard) = init_test_tracing();
    let mut table = grid(SpatialIndexConfig::default());

    create_spatial_index(&mut table, "geom").unwrap();
    let span = store.find_span("create_spatial_index").unwrap();
    assert_eq!(span.level, tracing::Level::INFO);
    assert_eq!(span.fields.get("table").map(String::as_str), Some("GRID"));
    assert_eq!(span.fields.get("column").map(String::as_str), Some("GEOM"));

    drop_spatial_index(&mut table, "GEOM").unwrap();
    assert!(store.has_span("drop_spatial_index"));
}
