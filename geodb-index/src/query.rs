//! Bounding-box candidate search over a geohash index.
//!
//! A row's geohash names the smallest quadtree cell holding its envelope,
//! and so does the query's. Two cells overlap only if one contains the
//! other, so every row that can intersect the query has a key that is
//! either a prefix of the query key (an ancestor cell) or extends it (a
//! descendant cell):
//!
//! ```text
//!   query key  0110
//!   ancestors  "" , 0 , 01 , 011 , 0110    exact lookups
//!   descendants 0110*                       one range scan
//! ```
//!
//! Candidates are then checked against their stored envelopes.

use crate::binding::index_name;
use crate::error::{IndexError, Result};
use crate::table::{RowId, SpatialTable};
use crate::value::Value;
use geodb_spatial::{ewkb, geohash_with, BBox};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

/// Rows of `table` whose `column` envelope intersects `query`, in row order.
///
/// Uses the column's geohash index when it has one and scans every row
/// otherwise. Rows with null or empty geometries never match.
pub fn spatial_candidates<T: SpatialTable + ?Sized>(
    table: &T,
    column: &str,
    query: &BBox,
) -> Result<Vec<RowId>> {
    let geometry_column = table
        .column_index(column)
        .ok_or_else(|| IndexError::UnknownColumn(column.to_string()))?;
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let index = table.index(&index_name(&table.columns()[geometry_column]));
    let candidates: Vec<RowId> = match index {
        Some(index) => {
            let key = geohash_with(&table.index_config().geohash, query)?.unwrap_or_default();
            let mut seen: FxHashSet<RowId> = FxHashSet::default();
            for len in 0..=key.len() {
                seen.extend(index.lookup(&key[..len]));
            }
            seen.extend(index.prefix_scan(&key));
            let mut ids: Vec<RowId> = seen.into_iter().collect();
            ids.sort_unstable();
            trace!(key = %key, candidates = ids.len(), "geohash lookup");
            ids
        }
        None => {
            debug!(
                table = table.name(),
                column,
                "no spatial index; scanning all rows"
            );
            table.row_ids()
        }
    };

    let mut matches = Vec::with_capacity(candidates.len());
    for id in candidates {
        let Some(envelope) = row_envelope(table, id, geometry_column)? else {
            continue;
        };
        if envelope.intersects(query) {
            matches.push(id);
        }
    }
    Ok(matches)
}

fn row_envelope<T: SpatialTable + ?Sized>(
    table: &T,
    id: RowId,
    geometry_column: usize,
) -> Result<Option<BBox>> {
    match table.row(id).and_then(|row| row.get(geometry_column)) {
        Some(Value::Bytes(bytes)) if !bytes.is_empty() => Ok(Some(ewkb::decode_envelope(bytes)?)),
        Some(Value::Bytes(_)) | Some(Value::Null) | None => Ok(None),
        Some(other) => Err(IndexError::Indexing(format!(
            "row {} holds {} instead of a geometry",
            id,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::create_spatial_index;
    use crate::table::MemoryTable;
    use geodb_spatial::SpatialGeometry;

    fn geom(wkt: &str) -> Value {
        let g = SpatialGeometry::from_wkt(wkt, 4326).unwrap();
        Value::Bytes(ewkb::encode(&g).unwrap())
    }

    fn places() -> MemoryTable {
        let mut table = MemoryTable::new("PLACES", ["ID", "GEOM"]);
        for (id, wkt) in [
            (1, "POINT(10 10)"),
            (2, "POINT(10.5 10.5)"),
            (3, "POINT(-10 -10)"),
            (4, "POLYGON((9 9, 12 9, 12 12, 9 12, 9 9))"),
            (5, "LINESTRING(-1 -1, 1 1)"),
        ] {
            table.insert(vec![Value::Integer(id), geom(wkt)]).unwrap();
        }
        table.insert(vec![Value::Integer(6), Value::Null]).unwrap();
        table
    }

    #[test]
    fn test_indexed_matches_full_scan() {
        let plain = places();
        let mut indexed = places();
        create_spatial_index(&mut indexed, "GEOM").unwrap();

        for query in [
            BBox::new(9.9, 9.9, 10.1, 10.1),
            BBox::new(10.4, 10.4, 10.6, 10.6),
            BBox::new(-20.0, -20.0, 0.5, 0.5),
            BBox::new(-180.0, -90.0, 180.0, 90.0),
            BBox::new(50.0, 50.0, 51.0, 51.0),
        ] {
            assert_eq!(
                spatial_candidates(&indexed, "GEOM", &query).unwrap(),
                spatial_candidates(&plain, "GEOM", &query).unwrap(),
                "query {}",
                query
            );
        }
    }

    #[test]
    fn test_exact_results() {
        let mut table = places();
        create_spatial_index(&mut table, "GEOM").unwrap();

        let hits = spatial_candidates(&table, "geom", &BBox::new(9.9, 9.9, 10.1, 10.1)).unwrap();
        assert_eq!(hits, vec![0, 3]);

        let hits = spatial_candidates(&table, "GEOM", &BBox::new(-0.5, -0.5, 0.5, 0.5)).unwrap();
        assert_eq!(hits, vec![4]);

        let hits = spatial_candidates(&table, "GEOM", &BBox::new(100.0, 0.0, 101.0, 1.0)).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_rows_inserted_after_create_are_found() {
        let mut table = places();
        create_spatial_index(&mut table, "GEOM").unwrap();
        let id = table
            .insert(vec![Value::Integer(7), geom("POINT(100.5 0.5)"), Value::Null])
            .unwrap();

        let hits = spatial_candidates(&table, "GEOM", &BBox::new(100.0, 0.0, 101.0, 1.0)).unwrap();
        assert_eq!(hits, vec![id]);
    }

    #[test]
    fn test_empty_query_and_unknown_column() {
        let table = places();
        assert!(spatial_candidates(&table, "GEOM", &BBox::EMPTY).unwrap().is_empty());
        assert!(matches!(
            spatial_candidates(&table, "NOPE", &BBox::new(0.0, 0.0, 1.0, 1.0)),
            Err(IndexError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_non_geometry_cell_is_error() {
        let mut table = MemoryTable::new("T", ["GEOM"]);
        table.insert(vec![Value::from("POINT(0 0)")]).unwrap();
        assert!(matches!(
            spatial_candidates(&table, "GEOM", &BBox::new(-1.0, -1.0, 1.0, 1.0)),
            Err(IndexError::Indexing(_))
        ));
    }
}
