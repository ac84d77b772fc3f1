// ABOUTME: Table-list, data and row filters plus the pipelines applying them
// ABOUTME: Unusable filter identifiers become warnings instead of aborting the run

pub mod data;
pub mod table;

use super::context::EngineContext;
use super::part::PartCore;
use crate::database::{Driver, Row, TableMeta};
use anyhow::Result;
use async_trait::async_trait;

pub use data::{NoViewData, SpecialEngines};
pub use table::{NonCore, Sorter};

/// Transforms the list of tables to back up; stages run in configured order
#[async_trait]
pub trait TableFilter: Send + Sync {
    async fn filter(&self, db: &mut dyn Driver, tables: Vec<String>) -> Result<Vec<String>>;
}

/// Decides whether a table's rows are dumped at all
pub trait DataFilter: Send + Sync {
    fn filter(&self, table: &TableMeta) -> bool;
}

/// Decides whether a single row is dumped
pub trait RowFilter: Send + Sync {
    fn filter(&self, table: &str, row: &Row) -> bool;
}

/// Run the configured table filters over `tables`
pub async fn apply_table_filters(
    core: &mut PartCore,
    ctx: &mut EngineContext,
    tables: Vec<String>,
) -> Result<Vec<String>> {
    let mut tables = tables;

    for id in ctx.config.table_filters.clone() {
        let filter = match ctx.registry.table_filter(&id, &ctx.config) {
            Ok(filter) => filter,
            Err(e) => {
                core.add_warning(e.to_string());
                continue;
            }
        };

        let before = tables.len();
        tables = filter.filter(ctx.db.as_mut(), tables).await?;
        tracing::debug!(
            "Table filter “{}” kept {} of {} table(s)",
            id,
            tables.len(),
            before
        );
    }

    Ok(tables)
}

/// Instantiate the configured data filters
pub fn load_data_filters(core: &mut PartCore, ctx: &EngineContext) -> Vec<Box<dyn DataFilter>> {
    load_filters(core, &ctx.config.data_filters, |id| {
        ctx.registry.data_filter(id, &ctx.config)
    })
}

/// Instantiate the configured row filters
pub fn load_row_filters(core: &mut PartCore, ctx: &EngineContext) -> Vec<Box<dyn RowFilter>> {
    load_filters(core, &ctx.config.row_filters, |id| {
        ctx.registry.row_filter(id, &ctx.config)
    })
}

fn load_filters<F, E>(
    core: &mut PartCore,
    ids: &[String],
    make: impl Fn(&str) -> std::result::Result<F, E>,
) -> Vec<F>
where
    E: std::fmt::Display,
{
    ids.iter()
        .filter_map(|id| match make(id) {
            Ok(filter) => Some(filter),
            Err(e) => {
                core.add_warning(e.to_string());
                None
            }
        })
        .collect()
}

/// True when every data filter accepts the table
pub fn table_data_allowed(filters: &[Box<dyn DataFilter>], table: &TableMeta) -> bool {
    filters.iter().all(|f| f.filter(table))
}

/// True when every row filter accepts the row; stops at the first rejection
pub fn row_allowed(filters: &[Box<dyn RowFilter>], table: &str, row: &Row) -> bool {
    filters.iter().all(|f| f.filter(table, row))
}

