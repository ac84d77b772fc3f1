// ABOUTME: Per-table action emitting portable CREATE TABLE / CREATE VIEW statements
// ABOUTME: Normalizes SHOW CREATE output so the script restores on other servers and schemas

use super::TableAction;
use crate::database::{ColumnMeta, Driver, TableMeta};
use crate::engine::response::SqlResponse;
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

/// View properties (ALGORITHM, DEFINER, SQL SECURITY) never contain a parenthesis
static VIEW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^CREATE\s+(?:[^(]*\s)?VIEW\s").expect("valid view regex")
});

/// Emits the DDL needed to recreate a table or view
#[derive(Debug, Default, Clone, Copy)]
pub struct GetCreate;

impl GetCreate {
    pub fn new() -> Self {
        Self
    }
}

/// Collapse line breaks and tabs so the statement fits on one line
fn single_line(statement: &str) -> String {
    statement.replace(['\n', '\r', '\t'], " ")
}

pub fn is_view_statement(statement: &str) -> bool {
    VIEW_PATTERN.is_match(statement)
}

/// Make a CREATE VIEW statement portable
///
/// Drops qualifiers naming the source database and every view property
/// except `ALGORITHM`, so `CREATE ALGORITHM=MERGE DEFINER=... VIEW` becomes
/// `CREATE OR REPLACE ALGORITHM=MERGE VIEW`.
pub fn post_process_view(statement: &str, quoted_database: &str) -> String {
    let statement = statement.replace(&format!("{}.`", quoted_database), "`");

    let Some(view_pos) = statement.find(" VIEW ") else {
        return statement;
    };
    // "CREATE VIEW" has nothing between the keywords
    if view_pos <= 7 {
        return statement;
    }

    let properties = &statement[7..view_pos];
    let algorithm = properties
        .find("ALGORITHM=")
        .map(|start| {
            let rest = &properties[start..];
            match rest.find(' ') {
                Some(end) => rest[..=end].to_string(),
                None => format!("{} ", rest),
            }
        })
        .unwrap_or_default();

    format!("CREATE OR REPLACE {}{}", algorithm, &statement[view_pos + 1..])
}

/// Make a CREATE TABLE statement restorable on older servers
pub fn post_process_table(statement: &str) -> String {
    statement
        .replace(" USING BTREE", " ")
        .replace(" USING HASH", " ")
        .replace("TYPE=", "ENGINE=")
}

#[async_trait]
impl TableAction for GetCreate {
    async fn process_table(
        &self,
        db: &mut dyn Driver,
        table: &TableMeta,
        _columns: &[ColumnMeta],
    ) -> Result<SqlResponse> {
        let raw = db
            .show_create(&table.name)
            .await
            .with_context(|| format!("Cannot get the CREATE statement of “{}”", table.name))?;

        // Only the head of the raw statement decides; later lines may mention VIEW
        let is_view = is_view_statement(&raw);
        let statement = format!("{};\n", single_line(&raw));

        let statement = if is_view {
            let quoted_database = db.quote_name(db.database_name());
            post_process_view(&statement, &quoted_database)
        } else {
            post_process_table(&statement)
        };

        Ok(SqlResponse::single(statement))
    }
}
