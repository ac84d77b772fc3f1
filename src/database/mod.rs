// ABOUTME: Database capability consumed by the backup engine
// ABOUTME: Defines the Driver trait, row values, the paging query builder and driver errors

pub mod memory;
pub mod metadata;
pub mod mysql;

pub use metadata::{ColumnMeta, DatabaseMeta, KeyRole, TableMeta};

use async_trait::async_trait;

/// A single column value as returned by a driver
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual rendering of the value, `None` for SQL NULL
    ///
    /// Binary values which are not valid UTF-8 are rendered lossily.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int(i) => Some(i.to_string()),
            Value::UInt(u) => Some(u.to_string()),
            Value::Double(d) => Some(d.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Integer interpretation of the value, used for auto-increment bookmarks
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(*i as i128),
            Value::UInt(u) => Some(*u as i128),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            Value::Null | Value::Double(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One fetched row: column names in result order with their values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The paging query issued by the table dump engine
///
/// Renders to `SELECT * FROM t [WHERE c > v] [ORDER BY c ASC] LIMIT offset, limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub after: Option<(String, Value)>,
    pub order_by: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            after: None,
            order_by: None,
            offset: 0,
            limit: u64::MAX,
        }
    }

    /// Only return rows whose `column` is strictly greater than `value`
    pub fn after(mut self, column: impl Into<String>, value: Value) -> Self {
        self.after = Some((column.into(), value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn limit(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn to_sql(&self, db: &dyn Driver) -> String {
        let mut sql = format!("SELECT * FROM {}", db.quote_name(&self.table));

        if let Some((column, value)) = &self.after {
            let literal = match value.as_integer() {
                Some(n) => n.to_string(),
                None => db.quote(value),
            };
            sql.push_str(&format!(" WHERE {} > {}", db.quote_name(column), literal));
        }

        if let Some(column) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {} ASC", db.quote_name(column)));
        }

        sql.push_str(&format!(" LIMIT {}, {}", self.offset, self.limit));
        sql
    }
}

/// Errors reported by database drivers
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query failed: {message} (SQL: {sql})")]
    Query { sql: String, message: String },

    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    /// The connected user cannot read INFORMATION_SCHEMA; no metadata is available
    #[error("the database user does not have access to INFORMATION_SCHEMA: {0}")]
    NoInformationSchemaAccess(String),

    #[error("operation not supported by this driver: {0}")]
    Unsupported(String),
}

/// Database handle shared by every engine part and action of a backup run
#[async_trait]
pub trait Driver: Send {
    /// Name of the database this handle is connected to
    fn database_name(&self) -> &str;

    /// Quote an identifier (table or column name)
    fn quote_name(&self, name: &str) -> String;

    /// Quote and escape a scalar for literal embedding; NULL becomes `NULL`
    fn quote(&self, value: &Value) -> String;

    /// Run a statement which returns no rows
    async fn execute(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Run arbitrary SQL and return all of its rows
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DriverError>;

    /// Run a paging query
    async fn select(&mut self, query: &SelectQuery) -> Result<Vec<Row>, DriverError>;

    /// Raw `CREATE TABLE` / `CREATE VIEW` statement of a table or view
    async fn show_create(&mut self, table: &str) -> Result<String, DriverError>;

    async fn table_list(&mut self) -> Result<Vec<String>, DriverError>;

    async fn table_meta(&mut self, table: &str) -> Result<TableMeta, DriverError>;

    /// Column metadata in declaration order
    async fn columns_meta(&mut self, table: &str) -> Result<Vec<ColumnMeta>, DriverError>;

    async fn database_meta(&mut self) -> Result<DatabaseMeta, DriverError>;

    /// Acquire an independent cursor on the same logical connection
    ///
    /// The returned handle is released when dropped.
    async fn secondary(&mut self) -> Result<Box<dyn Driver>, DriverError>;
}

/// Quote an identifier the MySQL way: backticks, embedded backticks doubled
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Escape a string for inclusion in a single-quoted MySQL literal
///
/// Mirrors `mysql_real_escape_string`: NUL, newline, carriage return,
/// backslash, both quote characters and Ctrl-Z are backslash-escaped.
pub fn escape_string(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 8);

    for ch in input.chars() {
        match ch {
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\x1a' => escaped.push_str("\\Z"),
            _ => escaped.push(ch),
        }
    }

    escaped
}

/// Render a value as a MySQL literal
///
/// Every non-NULL scalar is emitted as a quoted string so numeric and
/// textual columns restore identically. Binary data which is not valid
/// UTF-8 is emitted as a hex literal.
pub fn quote_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => format!("'{}'", escape_string(s)),
            Err(_) => {
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                format!("X'{}'", hex)
            }
        },
        other => format!("'{}'", escape_string(&other.as_text().unwrap_or_default())),
    }
}
