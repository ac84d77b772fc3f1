// ABOUTME: Engine part dumping the schema and rows of one table as INSERT statements
// ABOUTME: Pages with auto-increment bookmarks, sizes batches by memory and bounds statement size

use super::action::run_per_table_actions;
use super::context::EngineContext;
use super::filter::{
    load_data_filters, load_row_filters, row_allowed, table_data_allowed, DataFilter, RowFilter,
};
use super::part::{Part, PartCore};
use crate::database::{ColumnMeta, Driver, KeyRole, Row, SelectQuery, TableMeta, Value};
use crate::writer::OutputWriter;
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Share of the free memory a batch may occupy
const MEMORY_SAFETY_FACTOR: f64 = 0.75;
/// Working memory needed per fetched row, as a multiple of its average length
const ROW_OVERHEAD_FACTOR: f64 = 3.25;

/// Number of rows to request per page
///
/// Uses `default_batch` when memory is unlimited, the average row length is
/// unknown, or the process is already over its limit. Otherwise fits the
/// batch into the remaining memory, clamped to `[1, default_batch]`.
pub fn optimum_batch_size(
    memory_limit: u64,
    used_memory: u64,
    average_row_length: i64,
    default_batch: u64,
) -> u64 {
    let default_batch = default_batch.max(1);

    if memory_limit == 0 || average_row_length <= 0 {
        return default_batch;
    }

    let memory_left = MEMORY_SAFETY_FACTOR * (memory_limit as f64 - used_memory as f64);

    if memory_left <= 0.0 {
        tracing::debug!(
            "Memory usage ({} bytes) already exceeds the limit ({} bytes); using the default batch size",
            used_memory,
            memory_limit
        );
        return default_batch;
    }

    let max_rows = (memory_left / (ROW_OVERHEAD_FACTOR * average_row_length as f64)).floor();

    (max_rows as u64).clamp(1, default_batch)
}

/// Columns identifying a row: the primary key, else unique columns, else every column
pub fn find_primary_key(columns: &[ColumnMeta]) -> Vec<String> {
    let with_role = |role: KeyRole| -> Vec<String> {
        columns
            .iter()
            .filter(|c| c.key == role)
            .map(|c| c.name.clone())
            .collect()
    };

    let primary = with_role(KeyRole::Primary);
    if !primary.is_empty() {
        return primary;
    }

    let unique = with_role(KeyRole::Unique);
    if !unique.is_empty() {
        return unique;
    }

    columns.iter().map(|c| c.name.clone()).collect()
}

/// Render a row as `(v1, v2, ...)` in column order
pub fn to_tuple(db: &dyn Driver, columns: &[ColumnMeta], row: &Row) -> String {
    let values: Vec<String> = columns
        .iter()
        .map(|c| db.quote(row.get(&c.name).unwrap_or(&Value::Null)))
        .collect();

    format!("({})", values.join(", "))
}

/// Best effort; some servers refuse long scans unless big selects are enabled
async fn enforce_sql_compatibility(db: &mut dyn Driver) {
    for sql in ["SET SQL_BIG_SELECTS=1", "SET SESSION SQL_BIG_SELECTS=1"] {
        if let Err(e) = db.execute(sql).await {
            tracing::debug!("Ignoring failure of “{}”: {}", sql, e);
        }
    }
}

/// Dumps one table
pub struct TablePart {
    core: PartCore,
    table: TableMeta,
    columns: Vec<ColumnMeta>,
    data_filters: Vec<Box<dyn DataFilter>>,
    row_filters: Vec<Box<dyn RowFilter>>,
    offset: u64,
    batch: u64,
    pk_columns: Vec<String>,
    auto_increment_column: Option<String>,
    last_auto_increment: Option<Value>,
    /// Rows consumed without being accepted since the bookmark last moved
    skipped_since_bookmark: u64,
    pending: Vec<String>,
    pending_length: usize,
    proto_sql: String,
}

impl TablePart {
    pub fn new(domain: impl Into<String>, table: TableMeta) -> Self {
        let mut core = PartCore::new(domain);
        core.step = table.name.clone();

        Self {
            core,
            table,
            columns: Vec::new(),
            data_filters: Vec::new(),
            row_filters: Vec::new(),
            offset: 0,
            batch: 1,
            pk_columns: Vec::new(),
            auto_increment_column: None,
            last_auto_increment: None,
            skipped_since_bookmark: 0,
            pending: Vec::new(),
            pending_length: 0,
            proto_sql: String::new(),
        }
    }

    pub fn table(&self) -> &TableMeta {
        &self.table
    }

    /// Rows consumed so far, accepted or not
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn batch(&self) -> u64 {
        self.batch
    }

    pub fn pk_columns(&self) -> &[String] {
        &self.pk_columns
    }

    pub fn auto_increment_column(&self) -> Option<&str> {
        self.auto_increment_column.as_deref()
    }

    pub fn last_auto_increment(&self) -> Option<&Value> {
        self.last_auto_increment.as_ref()
    }

    /// Byte length of the tuples waiting to be flushed, separators included
    pub fn pending_length(&self) -> usize {
        self.pending_length
    }

    fn page_query(&self) -> SelectQuery {
        let query = SelectQuery::new(self.table.name.clone());

        match &self.auto_increment_column {
            Some(column) => {
                let query = query
                    .order_by(column.clone())
                    .limit(self.skipped_since_bookmark, self.batch);
                match &self.last_auto_increment {
                    Some(last) => query.after(column.clone(), last.clone()),
                    None => query,
                }
            }
            None => query.limit(self.offset, self.batch),
        }
    }

    fn pk_signature(&self, db: &dyn Driver, row: &Row) -> String {
        self.pk_columns
            .iter()
            .map(|c| {
                format!(
                    "{} = {}",
                    c,
                    db.quote(row.get(c).unwrap_or(&Value::Null))
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Write the pending tuples as one INSERT statement
    fn flush(&mut self, writer: &mut dyn OutputWriter) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let statement = format!("{}{};", self.proto_sql, self.pending.join(", "));
        writer
            .write_line(&statement)
            .with_context(|| format!("Failed to write data of table “{}”", self.table.name))?;

        self.pending.clear();
        self.pending_length = 0;
        Ok(())
    }
}

#[async_trait]
impl Part for TablePart {
    fn core(&self) -> &PartCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PartCore {
        &mut self.core
    }

    async fn prepare(&mut self, ctx: &mut EngineContext) -> Result<()> {
        tracing::debug!("Preparing to back up table “{}”", self.table.name);

        self.columns = ctx
            .db
            .columns_meta(&self.table.name)
            .await
            .with_context(|| format!("Cannot read the columns of table “{}”", self.table.name))?;

        run_per_table_actions(&mut self.core, ctx, &self.table, &self.columns).await?;

        self.batch = optimum_batch_size(
            ctx.memory.memory_limit(),
            ctx.memory.memory_usage(),
            self.table.average_row_length_bytes(),
            ctx.config.max_batch_size,
        );
        self.offset = 0;
        self.pk_columns = find_primary_key(&self.columns);
        self.auto_increment_column = self
            .columns
            .iter()
            .find(|c| c.auto_increment)
            .map(|c| c.name.clone());

        let column_list: Vec<String> = self
            .columns
            .iter()
            .map(|c| ctx.db.quote_name(&c.name))
            .collect();
        self.proto_sql = format!(
            "INSERT INTO {} ({}) VALUES ",
            ctx.db.quote_name(&self.table.name),
            column_list.join(",")
        );

        self.data_filters = load_data_filters(&mut self.core, ctx);
        self.row_filters = load_row_filters(&mut self.core, ctx);

        Ok(())
    }

    async fn process(&mut self, ctx: &mut EngineContext) -> Result<bool> {
        if !table_data_allowed(&self.data_filters, &self.table) {
            tracing::info!("Data of table “{}” will not be backed up.", self.table.name);
            return Ok(false);
        }

        tracing::info!(
            "Processing up to {} rows of table {} starting with row {}",
            self.batch,
            self.table.name,
            self.offset
        );

        let query = self.page_query();
        let rows = {
            let mut cursor = ctx
                .db
                .secondary()
                .await
                .context("Cannot open a secondary database cursor")?;
            enforce_sql_compatibility(cursor.as_mut()).await;
            cursor
                .select(&query)
                .await
                .with_context(|| format!("Cannot read rows of table “{}”", self.table.name))?
        };

        if rows.is_empty() {
            tracing::info!("No more data found in this table.");
            self.flush(ctx.writer.as_mut())?;
            return Ok(false);
        }

        let max_query_size = usize::try_from(ctx.config.max_query_size).unwrap_or(usize::MAX);

        for row in rows {
            if ctx.timer.time_left() <= 0.0 {
                break;
            }

            self.offset += 1;
            self.core.substep = format!("record {}", self.offset);

            if !row_allowed(&self.row_filters, &self.table.name, &row) {
                self.skipped_since_bookmark += 1;
                tracing::debug!(
                    "Skipping row [{}] of table “{}”",
                    self.pk_signature(ctx.db.as_ref(), &row),
                    self.table.name
                );
                continue;
            }

            if let Some(column) = &self.auto_increment_column {
                self.last_auto_increment = row.get(column).cloned();
                self.skipped_since_bookmark = 0;
            }

            let tuple = to_tuple(ctx.db.as_ref(), &self.columns, &row);

            if !self.pending.is_empty()
                && self.proto_sql.len() + self.pending_length + tuple.len() + 2 > max_query_size
            {
                self.flush(ctx.writer.as_mut())?;
            }

            self.pending_length += tuple.len() + 2;
            self.pending.push(tuple);
        }

        Ok(true)
    }

    async fn finalize(&mut self, _ctx: &mut EngineContext) -> Result<()> {
        tracing::info!("Finished backing up table “{}”", self.table.name);
        Ok(())
    }
}
