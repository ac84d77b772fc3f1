// ABOUTME: In-process database driver backed by plain vectors
// ABOUTME: Evaluates paging queries structurally; used for dry runs and engine tests

//! A supported [`Driver`] over tables held in memory.
//!
//! Hosts use it to rehearse a job (filters, actions, batching, output
//! rotation) without a server, and to feed rows they already hold. Besides
//! the driver operations it records executed statements and paging
//! queries, and can be told to fail specific statements, `SHOW CREATE`
//! lookups, or every metadata query, so error handling can be exercised.
//!
//! ```
//! use sliced_db_backup::config::Configuration;
//! use sliced_db_backup::database::memory::{MemoryDriver, MemoryTable};
//! use sliced_db_backup::database::{ColumnMeta, Row, TableMeta, Value};
//! use sliced_db_backup::engine::{BackupJob, EngineContext};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let db = MemoryDriver::new("shop");
//! db.add_table(
//!     MemoryTable::new(TableMeta::new("items", "InnoDB"), vec![ColumnMeta::new("id", "int")])
//!         .with_rows(vec![Row::from_pairs([("id", Value::Int(1))])])
//!         .with_create("CREATE TABLE `items` (`id` int)"),
//! );
//!
//! let ctx = EngineContext::new(Box::new(db.clone()), Configuration::default());
//! let mut job = BackupJob::new(ctx);
//! let status = job.run_to_completion(|_| {}).await;
//!
//! assert!(status.done && status.error.is_none());
//! assert_eq!(db.selects().len(), 2);
//! # }
//! ```

use super::{
    quote_identifier, quote_value, ColumnMeta, DatabaseMeta, Driver, DriverError, Row,
    SelectQuery, TableMeta, Value,
};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// A table (or view) held by [`MemoryDriver`]
#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub meta: TableMeta,
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
    pub create_statement: String,
}

impl MemoryTable {
    pub fn new(meta: TableMeta, columns: Vec<ColumnMeta>) -> Self {
        Self {
            meta,
            columns,
            rows: Vec::new(),
            create_statement: String::new(),
        }
    }

    pub fn with_create(mut self, create_statement: impl Into<String>) -> Self {
        self.create_statement = create_statement.into();
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }
}

#[derive(Debug, Default)]
struct MemoryStore {
    database: DatabaseMeta,
    tables: BTreeMap<String, MemoryTable>,
    executed: Vec<String>,
    selects: Vec<SelectQuery>,
    failing_statements: Vec<String>,
    failing_show_create: HashSet<String>,
    deny_information_schema: bool,
    secondaries_opened: usize,
}

/// Driver over in-memory tables
///
/// Clones and secondary handles share the same store, so rows inserted
/// through one handle are visible to all of them.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    database_name: String,
    store: Arc<Mutex<MemoryStore>>,
}

impl MemoryDriver {
    pub fn new(database_name: impl Into<String>) -> Self {
        let database_name = database_name.into();
        let store = MemoryStore {
            database: DatabaseMeta {
                name: database_name.clone(),
                character_set: "utf8mb4".to_string(),
                collation: "utf8mb4_unicode_ci".to_string(),
            },
            ..MemoryStore::default()
        };

        Self {
            database_name,
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn store(&self) -> MutexGuard<'_, MemoryStore> {
        // A panicking test thread must not hide the data from the remaining assertions
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_table(&self, table: MemoryTable) {
        self.store().tables.insert(table.meta.name.clone(), table);
    }

    pub fn insert_row(&self, table: &str, row: Row) -> Result<(), DriverError> {
        self.store()
            .tables
            .get_mut(table)
            .map(|t| t.rows.push(row))
            .ok_or_else(|| DriverError::UnknownTable(table.to_string()))
    }

    /// Delete every row of `table` whose `column` equals `value`; returns the number removed
    pub fn delete_rows(&self, table: &str, column: &str, value: &Value) -> usize {
        let mut store = self.store();
        let Some(t) = store.tables.get_mut(table) else {
            return 0;
        };
        let before = t.rows.len();
        t.rows.retain(|row| row.get(column) != Some(value));
        before - t.rows.len()
    }

    /// Make `execute()` fail for statements starting with `prefix`
    pub fn fail_statements_starting_with(&self, prefix: impl Into<String>) {
        self.store().failing_statements.push(prefix.into());
    }

    pub fn fail_show_create(&self, table: impl Into<String>) {
        self.store().failing_show_create.insert(table.into());
    }

    /// Simulate a user without INFORMATION_SCHEMA privileges
    pub fn deny_information_schema(&self) {
        self.store().deny_information_schema = true;
    }

    /// Statements passed to `execute()`, in order
    pub fn executed(&self) -> Vec<String> {
        self.store().executed.clone()
    }

    /// Paging queries passed to `select()`, in order
    pub fn selects(&self) -> Vec<SelectQuery> {
        self.store().selects.clone()
    }

    pub fn secondaries_opened(&self) -> usize {
        self.store().secondaries_opened
    }

    fn check_information_schema(&self) -> Result<(), DriverError> {
        if self.store().deny_information_schema {
            return Err(DriverError::NoInformationSchemaAccess(format!(
                "SELECT command denied on database '{}'",
                self.database_name
            )));
        }
        Ok(())
    }
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_integer(), right.as_integer()) {
        return Some(l.cmp(&r));
    }

    match (left.as_text(), right.as_text()) {
        (Some(l), Some(r)) => Some(l.cmp(&r)),
        _ => None,
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    fn quote_name(&self, name: &str) -> String {
        quote_identifier(name)
    }

    fn quote(&self, value: &Value) -> String {
        quote_value(value)
    }

    async fn execute(&mut self, sql: &str) -> Result<(), DriverError> {
        let mut store = self.store();
        store.executed.push(sql.to_string());

        if store.failing_statements.iter().any(|p| sql.starts_with(p)) {
            return Err(DriverError::Query {
                sql: sql.to_string(),
                message: "statement rejected".to_string(),
            });
        }

        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DriverError> {
        Err(DriverError::Unsupported(format!(
            "the in-memory driver cannot run free-form SQL: {}",
            sql
        )))
    }

    async fn select(&mut self, query: &SelectQuery) -> Result<Vec<Row>, DriverError> {
        let mut store = self.store();
        store.selects.push(query.clone());

        let table = store
            .tables
            .get(&query.table)
            .ok_or_else(|| DriverError::UnknownTable(query.table.clone()))?;

        let mut rows: Vec<Row> = table
            .rows
            .iter()
            .filter(|row| match &query.after {
                Some((column, bookmark)) => row
                    .get(column)
                    .and_then(|v| compare_values(v, bookmark))
                    .map(|o| o == Ordering::Greater)
                    .unwrap_or(false),
                None => true,
            })
            .cloned()
            .collect();

        if let Some(column) = &query.order_by {
            rows.sort_by(|a, b| match (a.get(column), b.get(column)) {
                (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            });
        }

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);

        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn show_create(&mut self, table: &str) -> Result<String, DriverError> {
        let store = self.store();

        if store.failing_show_create.contains(table) {
            return Err(DriverError::Query {
                sql: format!("SHOW CREATE TABLE {}", quote_identifier(table)),
                message: "SHOW VIEW command denied".to_string(),
            });
        }

        store
            .tables
            .get(table)
            .map(|t| t.create_statement.clone())
            .ok_or_else(|| DriverError::UnknownTable(table.to_string()))
    }

    async fn table_list(&mut self) -> Result<Vec<String>, DriverError> {
        self.check_information_schema()?;
        Ok(self.store().tables.keys().cloned().collect())
    }

    async fn table_meta(&mut self, table: &str) -> Result<TableMeta, DriverError> {
        self.check_information_schema()?;
        self.store()
            .tables
            .get(table)
            .map(|t| t.meta.clone())
            .ok_or_else(|| DriverError::UnknownTable(table.to_string()))
    }

    async fn columns_meta(&mut self, table: &str) -> Result<Vec<ColumnMeta>, DriverError> {
        self.check_information_schema()?;
        self.store()
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| DriverError::UnknownTable(table.to_string()))
    }

    async fn database_meta(&mut self) -> Result<DatabaseMeta, DriverError> {
        self.check_information_schema()?;
        Ok(self.store().database.clone())
    }

    async fn secondary(&mut self) -> Result<Box<dyn Driver>, DriverError> {
        self.store().secondaries_opened += 1;
        Ok(Box::new(self.clone()))
    }
}
