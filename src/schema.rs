//! Model declaration and schema derivation.
//!
//! A model is declared as an ordered list of [`Field`]s fed to a
//! [`SchemaBuilder`]. Building partitions the fields into the single primary
//! key and the regular fields, and freezes the result into a [`Schema`] that
//! the [`Manager`](crate::Manager) uses to generate SQL.
//!
//! Types implementing [`Model`] get their schema derived once per process
//! and cached by type identity, see [`schema_of`].

use crate::error::{DeclarationError, Error, Result};
use crate::field::{Field, FieldType};
use indexmap::IndexMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::info;

/// Derived, immutable description of a model's table.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    model: String,
    table: String,
    primary_key: String,
    fields: Vec<String>,
    columns: Vec<String>,
    mappings: IndexMap<String, Field>,
}

impl Schema {
    /// Name of the model type the schema was declared for.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Non-primary-key field names, in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// `"name TYPE"` strings matching [`fields`](Self::fields).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// One `?` per regular field.
    pub fn placeholders(&self) -> Vec<&'static str> {
        vec!["?"; self.fields.len()]
    }

    /// Every declared field, primary key included, in declaration order.
    pub fn mappings(&self) -> &IndexMap<String, Field> {
        &self.mappings
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.mappings.get(name)
    }

    /// Resolves a filter key to a column name.
    ///
    /// Accepts the regular fields and `pk`, which stands for the primary key.
    /// The primary key's own name is not a filter key.
    pub fn resolve(&self, key: &str) -> Result<&str> {
        if key == "pk" {
            return Ok(&self.primary_key);
        }
        self.fields
            .iter()
            .find(|field| field.as_str() == key)
            .map(String::as_str)
            .ok_or_else(|| Error::FieldNotExist(key.to_string()))
    }
}

/// Collects field declarations for one model.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    model: String,
    table: Option<String>,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    /// Sets an explicit table name instead of the lower-cased model name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Derives the schema.
    ///
    /// Fails unless exactly one field is a primary key, that key is an
    /// integer, every default matches its field's type, and no name repeats.
    pub fn build(self) -> Result<Schema> {
        Ok(self.derive()?)
    }

    fn derive(self) -> std::result::Result<Schema, DeclarationError> {
        let table = self
            .table
            .unwrap_or_else(|| self.model.to_lowercase());
        info!(model = %self.model, table = %table, "model found");

        let mut mappings = IndexMap::with_capacity(self.fields.len());
        let mut primary_key: Option<String> = None;
        let mut fields = Vec::new();
        let mut columns = Vec::new();

        for field in self.fields {
            info!(mapping = %field.name(), field = %field, "mapping found");
            if mappings.contains_key(field.name()) {
                return Err(DeclarationError::DuplicateField {
                    model: self.model,
                    field: field.name().to_string(),
                });
            }
            if !field.default_matches_type() {
                return Err(DeclarationError::DefaultTypeMismatch {
                    model: self.model,
                    field: field.name().to_string(),
                });
            }
            if field.is_primary_key() {
                if field.field_type() != FieldType::Integer {
                    return Err(DeclarationError::NonIntegerPrimaryKey {
                        model: self.model,
                        field: field.name().to_string(),
                    });
                }
                if primary_key.is_some() {
                    return Err(DeclarationError::DuplicatePrimaryKey {
                        model: self.model,
                        field: field.name().to_string(),
                    });
                }
                primary_key = Some(field.name().to_string());
            } else {
                fields.push(field.name().to_string());
                columns.push(field.column());
            }
            mappings.insert(field.name().to_string(), field);
        }

        let primary_key = primary_key.ok_or_else(|| DeclarationError::MissingPrimaryKey {
            model: self.model.clone(),
        })?;

        Ok(Schema {
            model: self.model,
            table,
            primary_key,
            fields,
            columns,
            mappings,
        })
    }
}

/// A record type with a statically declared schema.
///
/// ```
/// use orm_sqlite::{Field, Model, SchemaBuilder};
///
/// struct Game;
///
/// impl Model for Game {
///     fn declare() -> SchemaBuilder {
///         SchemaBuilder::new("Game")
///             .table("games")
///             .field(Field::integer("id").primary_key())
///             .field(Field::text("name"))
///     }
/// }
///
/// let schema = orm_sqlite::schema_of::<Game>().unwrap();
/// assert_eq!(schema.table(), "games");
/// ```
pub trait Model: 'static {
    fn declare() -> SchemaBuilder;
}

type Derived = std::result::Result<Arc<Schema>, DeclarationError>;
type Registry = RwLock<HashMap<TypeId, Derived>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

/// Returns the schema of `M`, deriving it on first use.
///
/// The outcome of the first derivation, success or declaration error, is
/// cached for the rest of the process; later calls only take the read lock.
pub fn schema_of<M: Model>() -> Result<Arc<Schema>> {
    let id = TypeId::of::<M>();
    if let Some(derived) = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
    {
        return Ok(derived.clone()?);
    }

    let mut schemas = registry().write().unwrap_or_else(PoisonError::into_inner);
    let derived = schemas
        .entry(id)
        .or_insert_with(|| M::declare().derive().map(Arc::new));
    Ok(derived.clone()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn game() -> SchemaBuilder {
        SchemaBuilder::new("Game")
            .field(Field::integer("id").primary_key())
            .field(Field::text("name"))
            .field(Field::integer("level"))
            .field(Field::real("score"))
    }

    #[test]
    fn test_derives_metadata_in_declaration_order() {
        let schema = game().build().unwrap();
        assert_eq!(schema.table(), "game");
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(schema.fields(), ["name", "level", "score"]);
        assert_eq!(
            schema.columns(),
            ["name TEXT", "level INTEGER", "score REAL"]
        );
        assert_eq!(schema.placeholders(), ["?", "?", "?"]);
        assert_eq!(
            schema.mappings().keys().collect::<Vec<_>>(),
            ["id", "name", "level", "score"]
        );
    }

    #[test]
    fn test_explicit_table_name() {
        let schema = game().table("games").build().unwrap();
        assert_eq!(schema.table(), "games");
    }

    #[test]
    fn test_primary_key_need_not_come_first() {
        let schema = SchemaBuilder::new("Tag")
            .field(Field::text("label"))
            .field(Field::integer("tag_id").primary_key())
            .build()
            .unwrap();
        assert_eq!(schema.primary_key(), "tag_id");
        assert_eq!(schema.fields(), ["label"]);
    }

    #[test]
    fn test_missing_primary_key_fails() {
        let err = SchemaBuilder::new("Game")
            .field(Field::text("name"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Declaration(DeclarationError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_duplicate_primary_key_fails() {
        let err = game()
            .field(Field::integer("other_id").primary_key())
            .build()
            .unwrap_err();
        match err {
            Error::Declaration(DeclarationError::DuplicatePrimaryKey { field, .. }) => {
                assert_eq!(field, "other_id")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_field_fails() {
        let err = game().field(Field::text("name")).build().unwrap_err();
        assert!(matches!(
            err,
            Error::Declaration(DeclarationError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_resolve_filter_keys() {
        let schema = game().build().unwrap();
        assert_eq!(schema.resolve("pk").unwrap(), "id");
        assert_eq!(schema.resolve("level").unwrap(), "level");
        assert!(matches!(
            schema.resolve("missing"),
            Err(Error::FieldNotExist(key)) if key == "missing"
        ));
        // The key is only reachable through `pk`.
        assert!(matches!(schema.resolve("id"), Err(Error::FieldNotExist(_))));
    }

    #[test]
    fn test_text_primary_key_fails() {
        let err = SchemaBuilder::new("Ticket")
            .field(Field::text("code").primary_key())
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "primary key `code` in model `Ticket` must be an integer field"
        );
        assert!(matches!(
            err,
            Error::Declaration(DeclarationError::NonIntegerPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_mismatched_default_fails() {
        let err = game()
            .field(Field::integer("lives").with_default("five"))
            .build()
            .unwrap_err();
        match err {
            Error::Declaration(DeclarationError::DefaultTypeMismatch { field, .. }) => {
                assert_eq!(field, "lives")
            }
            other => panic!("unexpected error: {other}"),
        }

        let schema = game()
            .field(Field::real("speed").with_default(2.5))
            .build()
            .unwrap();
        assert_eq!(schema.field("speed").unwrap().default(), &Value::Real(2.5));
    }

    struct Player;

    impl Model for Player {
        fn declare() -> SchemaBuilder {
            SchemaBuilder::new("Player")
                .field(Field::integer("id").primary_key())
                .field(Field::text("nick"))
        }
    }

    static BROKEN_DECLARATIONS: AtomicUsize = AtomicUsize::new(0);

    struct Broken;

    impl Model for Broken {
        fn declare() -> SchemaBuilder {
            BROKEN_DECLARATIONS.fetch_add(1, Ordering::SeqCst);
            SchemaBuilder::new("Broken").field(Field::text("nick"))
        }
    }

    #[test]
    fn test_registry_derives_once() {
        let first = schema_of::<Player>().unwrap();
        let second = schema_of::<Player>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.table(), "player");
    }

    #[test]
    fn test_registry_caches_declaration_errors() {
        for _ in 0..3 {
            assert!(matches!(
                schema_of::<Broken>(),
                Err(Error::Declaration(DeclarationError::MissingPrimaryKey { .. }))
            ));
        }
        assert_eq!(BROKEN_DECLARATIONS.load(Ordering::SeqCst), 1);
    }
}
