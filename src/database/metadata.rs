// ABOUTME: Immutable metadata values describing databases, tables and columns
// ABOUTME: Built once from driver metadata queries and read by filters, actions and parts

/// Database-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseMeta {
    pub name: String,
    pub character_set: String,
    pub collation: String,
}

/// Table-level metadata
///
/// An empty `engine` means the object is a VIEW, not a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub name: String,
    pub engine: String,
    /// Average row length as reported by the server; may contain thousands separators
    pub average_row_length: String,
    pub collation: String,
}

impl TableMeta {
    pub fn new(name: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: engine.into(),
            average_row_length: String::new(),
            collation: String::new(),
        }
    }

    pub fn with_average_row_length(mut self, average_row_length: impl Into<String>) -> Self {
        self.average_row_length = average_row_length.into();
        self
    }

    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = collation.into();
        self
    }

    pub fn is_view(&self) -> bool {
        self.engine.is_empty()
    }

    /// Average row length coerced to an integer
    ///
    /// Separator characters are stripped before parsing, so `"1,024"` reads as
    /// 1024. Unknown or unparseable lengths read as 0.
    pub fn average_row_length_bytes(&self) -> i64 {
        let digits: String = self
            .average_row_length
            .trim()
            .chars()
            .filter(|c| *c != ',' && *c != '.')
            .collect();

        digits.parse().unwrap_or(0)
    }
}

/// Role a column plays in the table's indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyRole {
    Primary,
    Unique,
    Multiple,
    #[default]
    None,
}

impl KeyRole {
    /// Map the `COLUMN_KEY` value of INFORMATION_SCHEMA.COLUMNS
    pub fn from_mysql(key: &str) -> Self {
        match key.trim().to_ascii_uppercase().as_str() {
            "PRI" => KeyRole::Primary,
            "UNI" => KeyRole::Unique,
            "MUL" => KeyRole::Multiple,
            _ => KeyRole::None,
        }
    }
}

/// Column-level metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: String,
    pub collation: String,
    pub key: KeyRole,
    pub auto_increment: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            collation: String::new(),
            key: KeyRole::None,
            auto_increment: false,
        }
    }

    pub fn with_key(mut self, key: KeyRole) -> Self {
        self.key = key;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}
