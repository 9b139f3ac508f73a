//! Error types for model declaration, query validation and storage access.
//!
//! Write operations whose existence precondition fails do not error; they
//! return [`SKIPPED`](crate::manager::SKIPPED) instead.

use thiserror::Error;

/// A model declaration that cannot be turned into a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// No field was marked as primary key.
    #[error("primary key not found for model `{model}`")]
    MissingPrimaryKey { model: String },

    /// More than one field was marked as primary key.
    #[error("duplicate primary key for field `{field}` in model `{model}`")]
    DuplicatePrimaryKey { model: String, field: String },

    /// The same field name was declared twice.
    #[error("field `{field}` declared twice in model `{model}`")]
    DuplicateField { model: String, field: String },

    /// A primary key was declared on a field that is not an integer.
    #[error("primary key `{field}` in model `{model}` must be an integer field")]
    NonIntegerPrimaryKey { model: String, field: String },

    /// A field's default value does not match its declared type.
    #[error("default of field `{field}` in model `{model}` does not match its type")]
    DefaultTypeMismatch { model: String, field: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// A filter referenced a name that is neither a regular field nor `pk`.
    #[error("field `{0}` does not exist")]
    FieldNotExist(String),

    #[error("database connection is closed")]
    NotConnected,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
