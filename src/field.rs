//! Field descriptors.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic column type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Integer,
    Real,
}

impl FieldType {
    /// The SQL type token used in `CREATE TABLE`.
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Real => "REAL",
        }
    }

    fn kind(self) -> &'static str {
        match self {
            FieldType::Text => "StringField",
            FieldType::Integer => "IntegerField",
            FieldType::Real => "FloatField",
        }
    }

    /// Zero value of the type.
    pub fn zero(self) -> Value {
        match self {
            FieldType::Text => Value::Text(String::new()),
            FieldType::Integer => Value::Integer(0),
            FieldType::Real => Value::Real(0.0),
        }
    }
}

/// One declared column: name, type, default and primary-key flag.
///
/// Construction never fails. Whether the declaration makes sense (an
/// integer primary key, a default of the right type) is checked by
/// [`SchemaBuilder::build`](crate::SchemaBuilder::build).
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    field_type: FieldType,
    default: Value,
    primary_key: bool,
}

impl Field {
    fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            default: field_type.zero(),
            primary_key: false,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Real)
    }

    /// Marks the field as the model's primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Overrides the zero default.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Whether the default is a value of the field's own type.
    pub fn default_matches_type(&self) -> bool {
        matches!(
            (self.field_type, &self.default),
            (FieldType::Text, Value::Text(_))
                | (FieldType::Integer, Value::Integer(_))
                | (FieldType::Real, Value::Real(_))
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn default(&self) -> &Value {
        &self.default
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// `"name TYPE"`, as it appears in a column list.
    pub fn column(&self) -> String {
        format!("{} {}", self.name, self.field_type.sql_type())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}, {} {}>",
            self.field_type.kind(),
            self.name,
            self.field_type.sql_type()
        )
    }
}
