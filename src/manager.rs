//! SQL generation and execution for one model.
//!
//! Table and column names come from the declared [`Schema`] and are
//! embedded in the statement text; values are always bound to `?`
//! placeholders. The one exception is [`Manager::aggregate`], whose
//! expression and filter are raw SQL supplied by the caller.

use crate::database::Database;
use crate::error::Result;
use crate::record::Record;
use crate::schema::{schema_of, Model, Schema};
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Returned by [`Manager::add`], [`Manager::update`] and
/// [`Manager::remove`] when the existence precondition fails and nothing
/// was written.
pub const SKIPPED: i64 = -1;

/// Query manager bound to one model and one storage adapter.
#[derive(Debug)]
pub struct Manager {
    schema: Arc<Schema>,
    database: Database,
}

impl Manager {
    pub fn new(schema: Arc<Schema>, database: Database) -> Self {
        Self { schema, database }
    }

    /// Binds a manager to the registered schema of `M`.
    pub fn for_model<M: Model>(database: Database) -> Result<Self> {
        Ok(Self::new(schema_of::<M>()?, database))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn backend(&self) -> &Database {
        &self.database
    }

    fn table(&self) -> &str {
        self.schema.table()
    }

    fn select(&self, sql: &str, args: &[Value], limit: Option<usize>) -> Result<Vec<Record>> {
        debug!(sql, args = ?args, "select");
        self.database.select(sql, args, limit)
    }

    fn execute(&self, sql: &str, args: &[Value], autocommit: bool) -> Result<i64> {
        debug!(sql, args = ?args, autocommit, "execute");
        let rows_affected = self.database.execute(sql, args, autocommit)?;
        Ok(i64::try_from(rows_affected).unwrap_or(i64::MAX))
    }

    fn skipped(&self, operation: &str) -> i64 {
        info!(table = %self.table(), operation, rows_affected = SKIPPED, "rows affected");
        SKIPPED
    }

    pub fn table_exists(&self) -> Result<bool> {
        let sql = "SELECT name FROM sqlite_master WHERE type='table' AND name=?;";
        let rows = self.select(sql, &[Value::from(self.table())], None)?;
        Ok(rows.len() == 1)
    }

    fn create_table_sql(&self) -> String {
        let mut definitions = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            self.schema.primary_key()
        )];
        definitions.extend(self.schema.columns().iter().cloned());
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            self.table(),
            definitions.join(", ")
        )
    }

    fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", self.table())
    }

    fn select_all_sql(&self) -> String {
        format!("SELECT * FROM {};", self.table())
    }

    /// Column list and placeholders follow declaration order, with the
    /// primary key first when the caller supplies it.
    fn insert_sql(&self, with_pk: bool) -> String {
        let mut columns: Vec<&str> = Vec::with_capacity(self.schema.fields().len() + 1);
        let mut placeholders = Vec::with_capacity(columns.capacity());
        if with_pk {
            columns.push(self.schema.primary_key());
            placeholders.push("?");
        }
        columns.extend(self.schema.fields().iter().map(String::as_str));
        placeholders.extend(self.schema.placeholders());

        if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES;", self.table())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({});",
                self.table(),
                columns.join(", "),
                placeholders.join(", ")
            )
        }
    }

    fn update_sql(&self) -> String {
        let assignments: Vec<String> = self
            .schema
            .fields()
            .iter()
            .map(|field| format!("{field} = ?"))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE {} = ?;",
            self.table(),
            assignments.join(", "),
            self.schema.primary_key()
        )
    }

    fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} = ?;",
            self.table(),
            self.schema.primary_key()
        )
    }

    fn clear_sql(&self) -> String {
        format!("DELETE FROM {};", self.table())
    }

    pub fn create_table(&self) -> Result<i64> {
        self.execute(&self.create_table_sql(), &[], true)
    }

    /// Drops the table. The drop is left uncommitted.
    pub fn drop_table(&self) -> Result<i64> {
        self.execute(&self.drop_table_sql(), &[], false)
    }

    pub fn all(&self) -> Result<Vec<Record>> {
        self.select(&self.select_all_sql(), &[], None)
    }

    /// Starts an empty filter chain.
    pub fn query(&self) -> Query<'_> {
        Query {
            manager: self,
            predicates: Vec::new(),
        }
    }

    /// Starts a filter chain with `key = value`. `key` is a regular field
    /// name, or `pk` for the primary key; the key's own column name is
    /// rejected like any other unknown field.
    pub fn filter(&self, key: &str, value: impl Into<Value>) -> Result<Query<'_>> {
        self.query().filter(key, value)
    }

    pub fn find(&self, pk: Option<Value>) -> Result<Vec<Record>> {
        self.query().find(pk)
    }

    pub fn get(&self, pk: impl Into<Value>) -> Result<Option<Record>> {
        self.query().get(Some(pk.into()))
    }

    pub fn exists(&self, pk: impl Into<Value>) -> Result<bool> {
        Ok(self.get(pk)?.is_some())
    }

    /// Runs `SELECT <expression> FROM <table> [WHERE <filter>]`.
    ///
    /// Both `expression` and `filter` are pasted into the statement as-is and
    /// must not carry untrusted input.
    pub fn aggregate(&self, expression: &str, filter: Option<&str>) -> Result<Option<Record>> {
        let mut sql = format!("SELECT {} FROM {}", expression, self.table());
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        sql.push(';');
        let mut rows = self.select(&sql, &[], None)?;
        Ok(if rows.len() == 1 { rows.pop() } else { None })
    }

    fn field_value(&self, record: &Record, field: &str) -> Value {
        record
            .get(field)
            .or_else(|| self.schema.field(field).map(|f| f.default()))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Inserts `record`. Returns [`SKIPPED`] when it carries a primary key
    /// that is already taken.
    pub fn add(&self, record: &Record) -> Result<i64> {
        let pk = record.pk(&self.schema);
        if let Some(pk) = pk {
            if self.exists(pk.clone())? {
                return Ok(self.skipped("add"));
            }
        }
        let args = self.insert_args(record);
        self.execute(&self.insert_sql(pk.is_some()), &args, true)
    }

    /// Bind arguments for [`insert_sql`](Self::insert_sql): the key when
    /// present, then every regular field by name in declaration order.
    fn insert_args(&self, record: &Record) -> Vec<Value> {
        record
            .pk(&self.schema)
            .cloned()
            .into_iter()
            .chain(
                self.schema
                    .fields()
                    .iter()
                    .map(|field| self.field_value(record, field)),
            )
            .collect()
    }

    /// Bind arguments for [`update_sql`](Self::update_sql): every regular
    /// field by name in declaration order, then the key.
    fn update_args(&self, record: &Record, pk: &Value) -> Vec<Value> {
        let mut args: Vec<Value> = self
            .schema
            .fields()
            .iter()
            .map(|field| self.field_value(record, field))
            .collect();
        args.push(pk.clone());
        args
    }

    /// Rewrites every regular field of an existing row. Returns [`SKIPPED`]
    /// when the record has no primary key or no row has that key.
    pub fn update(&self, record: &Record) -> Result<i64> {
        let Some(pk) = record.pk(&self.schema) else {
            return Ok(self.skipped("update"));
        };
        if !self.exists(pk.clone())? {
            return Ok(self.skipped("update"));
        }
        if self.schema.fields().is_empty() {
            return Ok(0);
        }

        let args = self.update_args(record, pk);
        self.execute(&self.update_sql(), &args, true)
    }

    /// Deletes the row with the record's primary key. Returns [`SKIPPED`]
    /// when the record has no primary key or no row has that key.
    pub fn remove(&self, record: &Record) -> Result<i64> {
        let Some(pk) = record.pk(&self.schema) else {
            return Ok(self.skipped("remove"));
        };
        if !self.exists(pk.clone())? {
            return Ok(self.skipped("remove"));
        }
        self.execute(&self.delete_sql(), &[pk.clone()], true)
    }

    /// Deletes every row. The delete is left uncommitted.
    pub fn clear(&self) -> Result<i64> {
        self.execute(&self.clear_sql(), &[], false)
    }

    pub fn commit(&self) -> Result<()> {
        self.database.commit()
    }

    /// Key assigned by the most recent successful insert.
    pub fn last_insert_id(&self) -> Result<i64> {
        self.database.last_insert_rowid()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    column: String,
    operator: &'static str,
    value: Value,
}

/// Equality filters over one model, ANDed together.
///
/// Each chain starts fresh from [`Manager::query`] or [`Manager::filter`]
/// and is consumed by [`find`](Query::find) or [`get`](Query::get).
#[derive(Debug, Clone)]
pub struct Query<'m> {
    manager: &'m Manager,
    predicates: Vec<Predicate>,
}

impl<'m> Query<'m> {
    /// Adds `key = value`. Fails if `key` is neither a declared field nor `pk`.
    pub fn filter(mut self, key: &str, value: impl Into<Value>) -> Result<Self> {
        let column = self.manager.schema.resolve(key)?.to_string();
        self.predicates.push(Predicate {
            column,
            operator: "=",
            value: value.into(),
        });
        Ok(self)
    }

    /// Renders the WHERE clause and its arguments. An explicit primary key
    /// goes first; later conditions on an already constrained column are
    /// dropped.
    fn where_clause(&self, pk: Option<Value>) -> (String, Vec<Value>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut columns: Vec<&str> = Vec::new();
        let mut args = Vec::new();

        if let Some(pk) = pk {
            let column = self.manager.schema.primary_key();
            conditions.push(format!("{column} = ?"));
            columns.push(column);
            args.push(pk);
        }
        for predicate in &self.predicates {
            if columns.contains(&predicate.column.as_str()) {
                continue;
            }
            conditions.push(format!("{} {} ?", predicate.column, predicate.operator));
            columns.push(&predicate.column);
            args.push(predicate.value.clone());
        }

        if conditions.is_empty() {
            (String::new(), args)
        } else {
            (format!(" WHERE {}", conditions.join(" and ")), args)
        }
    }

    pub fn find(self, pk: Option<Value>) -> Result<Vec<Record>> {
        let (clause, args) = self.where_clause(pk);
        let sql = format!("SELECT * FROM {}{};", self.manager.table(), clause);
        self.manager.select(&sql, &args, None)
    }

    /// The single matching row, or `None` when there is none.
    pub fn get(self, pk: Option<Value>) -> Result<Option<Record>> {
        let (clause, args) = self.where_clause(pk);
        let sql = format!("SELECT * FROM {}{} LIMIT 1;", self.manager.table(), clause);
        let mut rows = self.manager.select(&sql, &args, Some(1))?;
        Ok(if rows.len() == 1 { rows.pop() } else { None })
    }
}
