//! Model instances.
//!
//! A [`Record`] is an ordered field-name to value map. It carries no
//! reference to its model; persistence goes through a [`Manager`] passed to
//! [`save`](Record::save), [`update`](Record::update) or
//! [`delete`](Record::delete).

use crate::error::Result;
use crate::manager::Manager;
use crate::schema::Schema;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: IndexMap::with_capacity(capacity),
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a value, keeping the key's position if it was already present.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(field.to_string(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// The primary-key value, if the record carries a non-null one.
    pub fn pk(&self, schema: &Schema) -> Option<&Value> {
        self.get(schema.primary_key()).filter(|value| !value.is_null())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Inserts the record, creating the table first if it does not exist.
    pub fn save(&self, objects: &Manager) -> Result<i64> {
        if !objects.table_exists()? {
            objects.create_table()?;
        }
        objects.add(self)
    }

    pub fn update(&self, objects: &Manager) -> Result<i64> {
        objects.update(self)
    }

    pub fn delete(&self, objects: &Manager) -> Result<i64> {
        objects.remove(self)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::schema::SchemaBuilder;

    #[test]
    fn test_keeps_insertion_order() {
        let mut record = Record::new().with("b", 2).with("a", 1);
        record.set("b", 3);
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(record.get("b"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_null_primary_key_counts_as_absent() {
        let schema = SchemaBuilder::new("Game")
            .field(Field::integer("id").primary_key())
            .build()
            .unwrap();
        assert_eq!(Record::new().with("id", Value::Null).pk(&schema), None);
        assert_eq!(
            Record::new().with("id", 4).pk(&schema),
            Some(&Value::Integer(4))
        );
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let record: Record = [("id", Value::Integer(1)), ("name", Value::from("Alice"))]
            .into_iter()
            .collect();
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"id":1,"name":"Alice"}"#
        );
        let back: Record = serde_json::from_str(r#"{"id":1,"name":"Alice"}"#).unwrap();
        assert_eq!(back, record);
    }
}
