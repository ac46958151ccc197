//! Creating and dropping geohash spatial indexes.

use crate::binding::{index_name, shadow_column_name, ShadowIndexBinding};
use crate::error::{IndexError, Result};
use crate::table::SpatialTable;
use crate::trigger::GeoHashTrigger;
use std::sync::Arc;
use tracing::{debug, info};

/// Index a geometry column.
///
/// Adds `_<column>_GEOHASH`, backfills it for every existing row, creates
/// `_<column>_GEOHASH_INDEX` over it and reinstalls the trigger. If the
/// backfill or the index creation fails the shadow column is dropped again.
pub fn create_spatial_index<T: SpatialTable + ?Sized>(table: &mut T, column: &str) -> Result<()> {
    table.index_config().validate()?;
    let geometry_column = table
        .column_index(column)
        .ok_or_else(|| IndexError::UnknownColumn(column.to_string()))?;
    let column = table.columns()[geometry_column].clone();
    let shadow = shadow_column_name(&column);
    if table.column_index(&shadow).is_some() {
        return Err(IndexError::AlreadyIndexed(column));
    }

    let _span = tracing::info_span!(
        "create_spatial_index",
        table = table.name(),
        column = %column
    )
    .entered();

    let shadow_column = table.add_column(&shadow)?;
    let built = backfill(table, geometry_column, shadow_column)
        .and_then(|rows| table.create_index(&index_name(&column), &shadow).map(|_| rows));
    let rows = match built {
        Ok(rows) => rows,
        Err(e) => {
            table.drop_column(&shadow)?;
            return Err(e);
        }
    };

    rebind(table)?;
    info!(rows, shadow = %shadow, "spatial index created");
    Ok(())
}

/// Remove a geometry column's spatial index and shadow column.
pub fn drop_spatial_index<T: SpatialTable + ?Sized>(table: &mut T, column: &str) -> Result<()> {
    let geometry_column = table
        .column_index(column)
        .ok_or_else(|| IndexError::UnknownColumn(column.to_string()))?;
    let column = table.columns()[geometry_column].clone();
    let shadow = shadow_column_name(&column);
    if table.column_index(&shadow).is_none() {
        return Err(IndexError::NotIndexed(column));
    }

    let _span = tracing::info_span!(
        "drop_spatial_index",
        table = table.name(),
        column = %column
    )
    .entered();

    let index = index_name(&column);
    if table.index(&index).is_some() {
        table.drop_index(&index)?;
    }
    table.drop_column(&shadow)?;
    rebind(table)?;
    info!(shadow = %shadow, "spatial index dropped");
    Ok(())
}

/// Rediscover shadow columns and install the matching trigger.
///
/// Call after any schema change that adds, removes or reorders columns.
pub fn rebind<T: SpatialTable + ?Sized>(table: &mut T) -> Result<()> {
    let binding = ShadowIndexBinding::discover(table.columns())?;
    debug!(table = table.name(), pairs = binding.len(), "rebinding geohash trigger");
    let trigger = if binding.is_empty() {
        None
    } else {
        Some(GeoHashTrigger::with_config(
            Arc::new(binding),
            table.index_config().geohash,
        ))
    };
    table.install_trigger(trigger);
    Ok(())
}

fn backfill<T: SpatialTable + ?Sized>(
    table: &mut T,
    geometry_column: usize,
    shadow_column: usize,
) -> Result<usize> {
    let config = *table.index_config();
    let trigger = GeoHashTrigger::with_config(Arc::default(), config.geohash);
    let interval = config.progress_interval.max(1);
    let ids = table.row_ids();
    let total = ids.len();

    for (done, id) in ids.into_iter().enumerate() {
        let geometry = table
            .row(id)
            .and_then(|row| row.get(geometry_column))
            .ok_or(IndexError::RowNotFound(id))?;
        let value = trigger.shadow_value(geometry).map_err(|e| {
            IndexError::Indexing(format!("backfill of row {} failed: {}", id, e))
        })?;
        table.set_value(id, shadow_column, value)?;

        if (done + 1) % interval == 0 {
            debug!(done = done + 1, total, "backfill progress");
        }
    }
    Ok(total)
}
