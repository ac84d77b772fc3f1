// ABOUTME: Per-database and per-table actions and the pipeline that runs them
// ABOUTME: Writes every statement an action produces to the output writer as one line

pub mod database;
pub mod table;

use super::context::EngineContext;
use super::part::PartCore;
use super::response::SqlResponse;
use crate::database::{ColumnMeta, DatabaseMeta, Driver, TableMeta};
use crate::writer::OutputWriter;
use anyhow::{Context, Result};
use async_trait::async_trait;

pub use table::GetCreate;

/// Action run once against the database itself
#[async_trait]
pub trait DatabaseAction: Send + Sync {
    async fn process_database(
        &self,
        db: &mut dyn Driver,
        database: &DatabaseMeta,
    ) -> Result<SqlResponse>;
}

/// Action run once for every table before its data is dumped
#[async_trait]
pub trait TableAction: Send + Sync {
    async fn process_table(
        &self,
        db: &mut dyn Driver,
        table: &TableMeta,
        columns: &[ColumnMeta],
    ) -> Result<SqlResponse>;
}

/// Write each statement of `response` as a `;`-terminated line
///
/// Returns the number of statements written. Statements already ending in
/// `;` are not terminated twice.
pub fn apply_action_queries(writer: &mut dyn OutputWriter, response: &SqlResponse) -> Result<usize> {
    let mut written = 0;

    for query in response.action_queries() {
        let statement = query.trim_end().trim_end_matches(';').trim_end();
        if statement.is_empty() {
            continue;
        }

        writer
            .write_line(&format!("{};", statement))
            .context("Failed to write action query")?;
        written += 1;
    }

    Ok(written)
}

fn log_number_of_actions(subject: &str, live_mode: bool, has_output_file: bool, count: usize) {
    if live_mode {
        tracing::info!("Actions performed on {}: {}", subject, count);
    } else if has_output_file {
        tracing::info!(
            "Actions to be performed on {} (saved in SQL file): {}",
            subject,
            count
        );
    } else {
        tracing::info!(
            "Actions which would have been performed on {}: {}",
            subject,
            count
        );
    }
}

/// Run the configured per-database actions, warning about unusable identifiers
pub async fn run_per_database_actions(
    core: &mut PartCore,
    ctx: &mut EngineContext,
    database: &DatabaseMeta,
) -> Result<usize> {
    let ids = ctx.config.per_database_actions.clone();

    if ids.is_empty() {
        tracing::info!("No actions to be performed on the database itself.");
        return Ok(0);
    }

    tracing::info!("Processing actions to be performed on the database itself.");

    let mut count = 0;
    for id in &ids {
        let action = match ctx.registry.database_action(id, &ctx.config) {
            Ok(action) => action,
            Err(e) => {
                core.add_warning(e.to_string());
                continue;
            }
        };

        tracing::debug!("Running “{}” action against database.", id);

        let response = action
            .process_database(ctx.db.as_mut(), database)
            .await
            .with_context(|| format!("Action “{}” failed on database “{}”", id, database.name))?;
        count += apply_action_queries(ctx.writer.as_mut(), &response)?;
    }

    log_number_of_actions(
        "the database itself",
        ctx.config.live_mode,
        !ctx.writer.file_path().is_empty(),
        count,
    );

    Ok(count)
}

/// Run the configured per-table actions, warning about unusable identifiers
pub async fn run_per_table_actions(
    core: &mut PartCore,
    ctx: &mut EngineContext,
    table: &TableMeta,
    columns: &[ColumnMeta],
) -> Result<usize> {
    let ids = ctx.config.per_table_actions.clone();

    if ids.is_empty() {
        tracing::info!("No actions to be performed on the table itself.");
        return Ok(0);
    }

    tracing::info!("Processing actions to be performed on the table itself.");

    let mut count = 0;
    for id in &ids {
        let action = match ctx.registry.table_action(id, &ctx.config) {
            Ok(action) => action,
            Err(e) => {
                core.add_warning(e.to_string());
                continue;
            }
        };

        tracing::debug!("Running “{}” action against table “{}”.", id, table.name);

        let response = action
            .process_table(ctx.db.as_mut(), table, columns)
            .await
            .with_context(|| format!("Action “{}” failed on table “{}”", id, table.name))?;
        count += apply_action_queries(ctx.writer.as_mut(), &response)?;
    }

    log_number_of_actions(
        &format!("the table {}", table.name),
        ctx.config.live_mode,
        !ctx.writer.file_path().is_empty(),
        count,
    );

    Ok(count)
}
