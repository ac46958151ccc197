//! Row trigger keeping shadow columns in sync with geometry columns.

use crate::binding::ShadowIndexBinding;
use crate::error::{IndexError, Result};
use crate::value::Value;
use geodb_spatial::{ewkb, geohash_with, GeoHashConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Row mutation that fires the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowEvent {
    Insert,
    Update,
}

impl fmt::Display for RowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowEvent::Insert => write!(f, "INSERT"),
            RowEvent::Update => write!(f, "UPDATE"),
        }
    }
}

/// Recomputes every shadow cell of a row from its geometry cell.
#[derive(Debug, Clone)]
pub struct GeoHashTrigger {
    binding: Arc<ShadowIndexBinding>,
    config: GeoHashConfig,
}

impl GeoHashTrigger {
    /// Trigger over the world frame at full depth.
    pub fn new(binding: Arc<ShadowIndexBinding>) -> Self {
        Self::with_config(binding, GeoHashConfig::default())
    }

    pub fn with_config(binding: Arc<ShadowIndexBinding>, config: GeoHashConfig) -> Self {
        Self { binding, config }
    }

    pub fn binding(&self) -> &Arc<ShadowIndexBinding> {
        &self.binding
    }

    pub fn config(&self) -> &GeoHashConfig {
        &self.config
    }

    /// Fire for one row mutation.
    ///
    /// `new_row` is written in place for both events. On error the row may
    /// be partially updated; callers fire on a staged copy.
    pub fn fire(&self, event: RowEvent, old_row: Option<&[Value]>, new_row: &mut [Value]) -> Result<()> {
        let width = self.binding.min_width();
        if new_row.len() < width {
            return Err(IndexError::Arity {
                expected: width,
                actual: new_row.len(),
            });
        }

        for pair in self.binding.pairs() {
            let shadow = self
                .shadow_value(&new_row[pair.geometry_column])
                .map_err(|e| match e {
                    IndexError::Spatial(inner) => IndexError::Indexing(format!(
                        "column {}: {}",
                        pair.geometry_name, inner
                    )),
                    other => other,
                })?;
            trace!(
                %event,
                column = %pair.geometry_name,
                geometry_changed = old_row
                    .and_then(|row| row.get(pair.geometry_column))
                    .map(|old| old != &new_row[pair.geometry_column]),
                shadow = %shadow,
                "recomputed shadow geohash"
            );
            new_row[pair.shadow_column] = shadow;
        }
        Ok(())
    }

    /// Shadow cell for a geometry cell.
    ///
    /// Null, empty bytes and empty envelopes map to null.
    pub fn shadow_value(&self, geometry: &Value) -> Result<Value> {
        let bytes = match geometry {
            Value::Null => return Ok(Value::Null),
            Value::Bytes(b) if b.is_empty() => return Ok(Value::Null),
            Value::Bytes(b) => b,
            other => {
                return Err(IndexError::Indexing(format!(
                    "expected a geometry value, found {}",
                    other.type_name()
                )))
            }
        };
        let envelope = ewkb::decode_envelope(bytes)?;
        Ok(geohash_with(&self.config, &envelope)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodb_spatial::{geohash, SpatialGeometry};

    fn trigger() -> GeoHashTrigger {
        let binding = ShadowIndexBinding::discover(&["ID", "GEOM", "_GEOM_GEOHASH"]).unwrap();
        GeoHashTrigger::new(Arc::new(binding))
    }

    fn point_bytes(x: f64, y: f64) -> Value {
        Value::Bytes(ewkb::encode(&SpatialGeometry::point(x, y)).unwrap())
    }

    #[test]
    fn test_insert_writes_geohash() {
        let mut row = vec![Value::Integer(1), point_bytes(10.0, 10.0), Value::Null];
        trigger().fire(RowEvent::Insert, None, &mut row).unwrap();
        assert_eq!(row[2], Value::Text(geohash(10.0, 10.0, 10.0, 10.0)));
    }

    #[test]
    fn test_update_reads_new_row() {
        let old = vec![Value::Integer(1), point_bytes(10.0, 10.0), Value::from("stale")];
        let mut new = vec![Value::Integer(1), point_bytes(-20.0, 5.0), Value::from("stale")];
        trigger().fire(RowEvent::Update, Some(old.as_slice()), &mut new).unwrap();
        assert_eq!(new[2], Value::Text(geohash(-20.0, 5.0, -20.0, 5.0)));
    }

    #[test]
    fn test_null_and_empty_geometry() {
        let t = trigger();
        let mut row = vec![Value::Integer(1), Value::Null, Value::from("x")];
        t.fire(RowEvent::Insert, None, &mut row).unwrap();
        assert_eq!(row[2], Value::Null);

        let mut row = vec![Value::Integer(1), Value::Bytes(Vec::new()), Value::from("x")];
        t.fire(RowEvent::Insert, None, &mut row).unwrap();
        assert_eq!(row[2], Value::Null);

        let empty = SpatialGeometry::from_wkt("GEOMETRYCOLLECTION EMPTY", 0).unwrap();
        let mut row = vec![
            Value::Integer(1),
            Value::Bytes(ewkb::encode(&empty).unwrap()),
            Value::from("x"),
        ];
        t.fire(RowEvent::Insert, None, &mut row).unwrap();
        assert_eq!(row[2], Value::Null);
    }

    #[test]
    fn test_bad_geometry_is_indexing_error() {
        let t = trigger();
        let mut row = vec![Value::Integer(1), Value::Bytes(vec![1, 2, 3]), Value::Null];
        assert!(matches!(
            t.fire(RowEvent::Insert, None, &mut row),
            Err(IndexError::Indexing(_))
        ));

        let mut row = vec![Value::Integer(1), Value::from("POINT(1 1)"), Value::Null];
        assert!(matches!(
            t.fire(RowEvent::Insert, None, &mut row),
            Err(IndexError::Indexing(_))
        ));
    }

    #[test]
    fn test_short_row_is_arity_error() {
        let mut row = vec![Value::Integer(1)];
        assert!(matches!(
            trigger().fire(RowEvent::Insert, None, &mut row),
            Err(IndexError::Arity { expected: 3, actual: 1 })
        ));
    }

    #[test]
    fn test_configured_depth() {
        let binding = ShadowIndexBinding::discover(&["G", "_G_GEOHASH"]).unwrap();
        let t = GeoHashTrigger::with_config(Arc::new(binding), GeoHashConfig::default().with_depth(4));
        let mut row = vec![point_bytes(10.0, 10.0), Value::Null];
        t.fire(RowEvent::Insert, None, &mut row).unwrap();
        assert_eq!(row[1].as_text().map(str::len), Some(8));
    }
}
