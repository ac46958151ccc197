//! Table abstraction the shadow index runs against, plus an in-memory table.
//!
//! Lifecycle commands and candidate queries only need schema edits, raw cell
//! writes and ordered string indexes, so they are written against
//! [`SpatialTable`]. [`MemoryTable`] implements it and fires the installed
//! [`GeoHashTrigger`] on every insert and update.

use crate::config::SpatialIndexConfig;
use crate::error::{IndexError, Result};
use crate::trigger::{GeoHashTrigger, RowEvent};
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Stable row identifier.
pub type RowId = usize;

/// Ordered index over the text values of one column.
///
/// Entries sort by key then row id, so exact lookups and prefix scans are
/// both range scans. Non-text cells are not indexed.
#[derive(Debug, Clone, Default)]
pub struct OrderedIndex {
    name: String,
    column: String,
    entries: BTreeSet<(String, RowId)>,
}

impl OrderedIndex {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            entries: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indexed column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: &str, id: RowId) {
        self.entries.insert((key.to_string(), id));
    }

    pub fn remove(&mut self, key: &str, id: RowId) {
        self.entries.remove(&(key.to_string(), id));
    }

    /// Rows whose key equals `key`.
    pub fn lookup(&self, key: &str) -> impl Iterator<Item = RowId> + '_ {
        self.entries
            .range((key.to_string(), RowId::MIN)..=(key.to_string(), RowId::MAX))
            .map(|(_, id)| *id)
    }

    /// Rows whose key starts with `prefix`, in key order.
    pub fn prefix_scan<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = RowId> + 'a {
        self.entries
            .range((prefix.to_string(), RowId::MIN)..)
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(|(_, id)| *id)
    }
}

/// Storage operations required by shadow-index maintenance.
///
/// Column and index names resolve case-insensitively.
pub trait SpatialTable {
    fn name(&self) -> &str;

    fn columns(&self) -> &[String];

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns()
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Geohash settings shared by the trigger, backfill and queries.
    fn index_config(&self) -> &SpatialIndexConfig;

    fn row_ids(&self) -> Vec<RowId>;

    fn row(&self, id: RowId) -> Option<&[Value]>;

    /// Append a column, null in every existing row. Returns its ordinal.
    fn add_column(&mut self, name: &str) -> Result<usize>;

    /// Remove a column and any index over it.
    fn drop_column(&mut self, name: &str) -> Result<()>;

    /// Write one cell without firing the trigger. Indexes are maintained.
    fn set_value(&mut self, id: RowId, column: usize, value: Value) -> Result<()>;

    fn create_index(&mut self, name: &str, column: &str) -> Result<()>;

    fn drop_index(&mut self, name: &str) -> Result<()>;

    fn index(&self, name: &str) -> Option<&OrderedIndex>;

    /// Replace the row trigger; `None` uninstalls it.
    fn install_trigger(&mut self, trigger: Option<GeoHashTrigger>);
}

/// In-memory table with ordered indexes and an optional geohash trigger.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    columns: Vec<String>,
    rows: BTreeMap<RowId, Vec<Value>>,
    next_id: RowId,
    indexes: FxHashMap<String, OrderedIndex>,
    trigger: Option<GeoHashTrigger>,
    config: SpatialIndexConfig,
}

impl MemoryTable {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(name, columns, SpatialIndexConfig::default())
    }

    pub fn with_config<I, S>(name: impl Into<String>, columns: I, config: SpatialIndexConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: BTreeMap::new(),
            next_id: 0,
            indexes: FxHashMap::default(),
            trigger: None,
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn trigger(&self) -> Option<&GeoHashTrigger> {
        self.trigger.as_ref()
    }

    /// Cell by column name.
    pub fn value(&self, id: RowId, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(&id)?.get(col)
    }

    /// Insert a full row.
    ///
    /// The trigger runs on a staged copy; nothing is stored if it fails.
    pub fn insert(&mut self, row: Vec<Value>) -> Result<RowId> {
        self.check_arity(&row)?;
        let mut staged = row;
        if let Some(trigger) = &self.trigger {
            trigger.fire(RowEvent::Insert, None, &mut staged)?;
        }

        let id = self.next_id;
        self.next_id += 1;
        maintain_indexes(&self.columns, &mut self.indexes, id, None, Some(staged.as_slice()));
        self.rows.insert(id, staged);
        Ok(id)
    }

    /// Replace a full row.
    ///
    /// The trigger runs on a staged copy; the stored row is unchanged if it
    /// fails.
    pub fn update(&mut self, id: RowId, row: Vec<Value>) -> Result<()> {
        self.check_arity(&row)?;
        let old = self.rows.get(&id).ok_or(IndexError::RowNotFound(id))?;
        let mut staged = row;
        if let Some(trigger) = &self.trigger {
            trigger.fire(RowEvent::Update, Some(old.as_slice()), &mut staged)?;
        }

        maintain_indexes(
            &self.columns,
            &mut self.indexes,
            id,
            Some(old.as_slice()),
            Some(staged.as_slice()),
        );
        self.rows.insert(id, staged);
        Ok(())
    }

    /// Update one named cell, firing the trigger for the whole row.
    pub fn update_value(&mut self, id: RowId, column: &str, value: Value) -> Result<()> {
        let col = self
            .column_index(column)
            .ok_or_else(|| IndexError::UnknownColumn(column.to_string()))?;
        let mut row = self
            .rows
            .get(&id)
            .cloned()
            .ok_or(IndexError::RowNotFound(id))?;
        row[col] = value;
        self.update(id, row)
    }

    pub fn delete(&mut self, id: RowId) -> Result<Vec<Value>> {
        let old = self.rows.remove(&id).ok_or(IndexError::RowNotFound(id))?;
        maintain_indexes(&self.columns, &mut self.indexes, id, Some(old.as_slice()), None);
        Ok(old)
    }

    fn check_arity(&self, row: &[Value]) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(IndexError::Arity {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        Ok(())
    }
}

fn maintain_indexes(
    columns: &[String],
    indexes: &mut FxHashMap<String, OrderedIndex>,
    id: RowId,
    old: Option<&[Value]>,
    new: Option<&[Value]>,
) {
    for index in indexes.values_mut() {
        let Some(col) = columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(index.column()))
        else {
            continue;
        };
        let old_key = old.and_then(|row| row.get(col)).and_then(Value::as_text);
        let new_key = new.and_then(|row| row.get(col)).and_then(Value::as_text);
        if old_key == new_key {
            continue;
        }
        if let Some(key) = old_key {
            index.remove(key, id);
        }
        if let Some(key) = new_key {
            index.insert(key, id);
        }
    }
}

impl SpatialTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn index_config(&self) -> &SpatialIndexConfig {
        &self.config
    }

    fn row_ids(&self) -> Vec<RowId> {
        self.rows.keys().copied().collect()
    }

    fn row(&self, id: RowId) -> Option<&[Value]> {
        self.rows.get(&id).map(Vec::as_slice)
    }

    fn add_column(&mut self, name: &str) -> Result<usize> {
        if self.column_index(name).is_some() {
            return Err(IndexError::Indexing(format!(
                "column {} already exists in {}",
                name, self.name
            )));
        }
        self.columns.push(name.to_string());
        for row in self.rows.values_mut() {
            row.push(Value::Null);
        }
        Ok(self.columns.len() - 1)
    }

    fn drop_column(&mut self, name: &str) -> Result<()> {
        let col = self
            .column_index(name)
            .ok_or_else(|| IndexError::UnknownColumn(name.to_string()))?;
        self.indexes
            .retain(|_, index| !index.column().eq_ignore_ascii_case(name));
        self.columns.remove(col);
        for row in self.rows.values_mut() {
            row.remove(col);
        }
        Ok(())
    }

    fn set_value(&mut self, id: RowId, column: usize, value: Value) -> Result<()> {
        let row = self.rows.get_mut(&id).ok_or(IndexError::RowNotFound(id))?;
        let name = self
            .columns
            .get(column)
            .ok_or_else(|| IndexError::UnknownColumn(format!("#{}", column)))?;
        let old = std::mem::replace(&mut row[column], value);
        for index in self
            .indexes
            .values_mut()
            .filter(|index| index.column().eq_ignore_ascii_case(name))
        {
            if let Some(key) = old.as_text() {
                index.remove(key, id);
            }
            if let Some(key) = row[column].as_text() {
                index.insert(key, id);
            }
        }
        Ok(())
    }

    fn create_index(&mut self, name: &str, column: &str) -> Result<()> {
        let key = name.to_ascii_uppercase();
        if self.indexes.contains_key(&key) {
            return Err(IndexError::AlreadyIndexed(name.to_string()));
        }
        let col = self
            .column_index(column)
            .ok_or_else(|| IndexError::UnknownColumn(column.to_string()))?;

        let mut index = OrderedIndex::new(name, self.columns[col].clone());
        for (id, row) in &self.rows {
            if let Some(value) = row[col].as_text() {
                index.insert(value, *id);
            }
        }
        debug!(table = %self.name, index = name, entries = index.len(), "created index");
        self.indexes.insert(key, index);
        Ok(())
    }

    fn drop_index(&mut self, name: &str) -> Result<()> {
        self.indexes
            .remove(&name.to_ascii_uppercase())
            .map(|_| debug!(table = %self.name, index = name, "dropped index"))
            .ok_or_else(|| IndexError::NotIndexed(name.to_string()))
    }

    fn index(&self, name: &str) -> Option<&OrderedIndex> {
        self.indexes.get(&name.to_ascii_uppercase())
    }

    fn install_trigger(&mut self, trigger: Option<GeoHashTrigger>) {
        self.trigger = trigger;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> MemoryTable {
        let mut table = MemoryTable::new("PEOPLE", ["ID", "NAME"]);
        table.insert(vec![1i64.into(), "ann".into()]).unwrap();
        table.insert(vec![2i64.into(), "bob".into()]).unwrap();
        table.insert(vec![3i64.into(), "anna".into()]).unwrap();
        table
    }

    #[test]
    fn test_ordered_index_lookup_and_prefix() {
        let mut index = OrderedIndex::new("I", "C");
        index.insert("01", 7);
        index.insert("0110", 3);
        index.insert("0111", 1);
        index.insert("10", 2);
        index.insert("01", 4);

        assert_eq!(index.lookup("01").collect::<Vec<_>>(), vec![4, 7]);
        assert_eq!(index.lookup("").count(), 0);
        assert_eq!(index.prefix_scan("011").collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(index.prefix_scan("").count(), 5);

        index.remove("01", 7);
        assert_eq!(index.lookup("01").collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_insert_update_delete() {
        let mut table = people();
        assert_eq!(table.len(), 3);
        table.update_value(1, "name", "beth".into()).unwrap();
        assert_eq!(table.value(1, "NAME"), Some(&Value::from("beth")));

        let removed = table.delete(0).unwrap();
        assert_eq!(removed[1], Value::from("ann"));
        assert!(table.row(0).is_none());
        assert!(matches!(table.delete(0), Err(IndexError::RowNotFound(0))));
    }

    #[test]
    fn test_arity_checked() {
        let mut table = people();
        assert!(matches!(
            table.insert(vec![Value::Null]),
            Err(IndexError::Arity { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            table.update(0, vec![Value::Null; 3]),
            Err(IndexError::Arity { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_index_follows_mutations() {
        let mut table = people();
        table.create_index("NAME_INDEX", "name").unwrap();
        let index = |t: &MemoryTable| {
            t.index("name_index")
                .unwrap()
                .prefix_scan("ann")
                .collect::<Vec<_>>()
        };
        assert_eq!(index(&table), vec![0, 2]);

        table.update_value(0, "NAME", "zed".into()).unwrap();
        assert_eq!(index(&table), vec![2]);

        table.set_value(1, 1, "annie".into()).unwrap();
        assert_eq!(index(&table), vec![2, 1]);

        table.delete(2).unwrap();
        assert_eq!(index(&table), vec![1]);

        let id = table.insert(vec![9i64.into(), "ann".into()]).unwrap();
        assert_eq!(index(&table), vec![id, 1]);
    }

    #[test]
    fn test_index_name_conflicts() {
        let mut table = people();
        table.create_index("I", "NAME").unwrap();
        assert!(matches!(table.create_index("i", "ID"), Err(IndexError::AlreadyIndexed(_))));
        assert!(matches!(table.create_index("J", "NOPE"), Err(IndexError::UnknownColumn(_))));
        table.drop_index("I").unwrap();
        assert!(matches!(table.drop_index("I"), Err(IndexError::NotIndexed(_))));
    }

    #[test]
    fn test_add_and_drop_column() {
        let mut table = people();
        assert_eq!(table.add_column("EXTRA").unwrap(), 2);
        assert_eq!(table.row(0).unwrap().len(), 3);
        assert!(table.row(0).unwrap()[2].is_null());
        assert!(table.add_column("extra").is_err());

        table.create_index("EXTRA_INDEX", "EXTRA").unwrap();
        table.drop_column("EXTRA").unwrap();
        assert!(table.index("EXTRA_INDEX").is_none());
        assert_eq!(table.columns(), &["ID".to_string(), "NAME".to_string()]);
        assert_eq!(table.row(1).unwrap().len(), 2);
        assert!(matches!(table.drop_column("EXTRA"), Err(IndexError::UnknownColumn(_))));
    }

    #[test]
    fn test_set_value_bounds() {
        let mut table = people();
        assert!(matches!(
            table.set_value(0, 5, Value::Null),
            Err(IndexError::UnknownColumn(_))
        ));
        assert!(matches!(
            table.set_value(42, 0, Value::Null),
            Err(IndexError::RowNotFound(42))
        ));
    }
}
