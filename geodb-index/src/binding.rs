//! Shadow column discovery.
//!
//! A geometry column `<name>` is indexed by a text column `_<name>_GEOHASH`
//! holding the geohash of each row's envelope. Discovery pairs every such
//! shadow column with its source by name, once per schema.

use crate::error::{IndexError, Result};
use rustc_hash::FxHashMap;

const SHADOW_PREFIX: &str = "_";
const SHADOW_SUFFIX: &str = "_GEOHASH";
const INDEX_SUFFIX: &str = "_INDEX";

/// Name of the shadow column for a geometry column.
pub fn shadow_column_name(column: &str) -> String {
    format!("{}{}{}", SHADOW_PREFIX, column, SHADOW_SUFFIX)
}

/// Name of the ordered index over a geometry column's shadow column.
pub fn index_name(column: &str) -> String {
    format!("{}{}", shadow_column_name(column), INDEX_SUFFIX)
}

/// Source column name if `name` is a shadow column.
fn shadow_source(name: &str) -> Option<&str> {
    let upper = name.to_ascii_uppercase();
    if name.len() <= SHADOW_PREFIX.len() + SHADOW_SUFFIX.len()
        || !upper.starts_with(SHADOW_PREFIX)
        || !upper.ends_with(SHADOW_SUFFIX)
    {
        return None;
    }
    Some(&name[SHADOW_PREFIX.len()..name.len() - SHADOW_SUFFIX.len()])
}

/// A geometry column and the shadow column it feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowPair {
    pub geometry_column: usize,
    pub shadow_column: usize,
    pub geometry_name: String,
}

/// Geometry/shadow column pairs of one table schema.
///
/// Immutable once discovered; schema changes produce a new binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowIndexBinding {
    pairs: Vec<ShadowPair>,
}

impl ShadowIndexBinding {
    /// Pair every `_<name>_GEOHASH` column with `<name>`.
    ///
    /// Names match case-insensitively. A shadow column without a source
    /// column is an error.
    pub fn discover<S: AsRef<str>>(columns: &[S]) -> Result<Self> {
        let mut ordinals: FxHashMap<String, usize> = FxHashMap::default();
        for (ordinal, name) in columns.iter().enumerate() {
            ordinals
                .entry(name.as_ref().to_ascii_uppercase())
                .or_insert(ordinal);
        }

        let mut pairs = Vec::new();
        for (shadow_column, name) in columns.iter().enumerate() {
            let name = name.as_ref();
            let Some(source) = shadow_source(name) else {
                continue;
            };
            let geometry_column = *ordinals
                .get(&source.to_ascii_uppercase())
                .ok_or_else(|| {
                    IndexError::Indexing(format!(
                        "shadow column {} has no source column {}",
                        name, source
                    ))
                })?;
            pairs.push(ShadowPair {
                geometry_column,
                shadow_column,
                geometry_name: columns[geometry_column].as_ref().to_string(),
            });
        }

        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[ShadowPair] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Shadow ordinal for a geometry ordinal.
    pub fn shadow_for(&self, geometry_column: usize) -> Option<usize> {
        self.pairs
            .iter()
            .find(|p| p.geometry_column == geometry_column)
            .map(|p| p.shadow_column)
    }

    /// Widest ordinal referenced, plus one.
    pub(crate) fn min_width(&self) -> usize {
        self.pairs
            .iter()
            .map(|p| p.geometry_column.max(p.shadow_column) + 1)
            .max()
            .unwrap_or(0)
    }
}
