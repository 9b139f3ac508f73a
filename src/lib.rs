//! A lightweight declarative ORM over SQLite.
//!
//! # Intention
//!
//! - Declare a record shape once (typed fields, one primary key) and get
//!   CRUD without hand-written SQL for the common cases.
//! - Generate parameterized statements from the declared schema so that
//!   values never end up in SQL text.
//!
//! # Architectural Boundaries
//!
//! - [`schema`] derives immutable table metadata from field declarations.
//! - [`manager`] turns operations into SQL and bind arguments.
//! - [`database`] is the only module that talks to `rusqlite`.
//! - No joins, migrations, pooling or multi-statement transactions.
//!
//! ```
//! use orm_sqlite::{Database, Field, Manager, Record, SchemaBuilder};
//! use std::sync::Arc;
//!
//! # fn main() -> orm_sqlite::Result<()> {
//! let schema = SchemaBuilder::new("Game")
//!     .field(Field::integer("id").primary_key())
//!     .field(Field::text("name"))
//!     .build()?;
//! let games = Manager::new(Arc::new(schema), Database::open_in_memory()?);
//!
//! Record::new().with("name", "Alice").save(&games)?;
//! let alice = games.filter("name", "Alice")?.get(None)?;
//! assert!(alice.is_some());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod error;
pub mod field;
pub mod manager;
pub mod record;
pub mod schema;
pub mod value;

pub use database::{Database, DatabaseConfig};
pub use error::{DeclarationError, Error, Result};
pub use field::{Field, FieldType};
pub use manager::{Manager, Query, SKIPPED};
pub use record::Record;
pub use schema::{schema_of, Model, Schema, SchemaBuilder};
pub use value::Value;
