// ABOUTME: Engine part backing up one database, one table part at a time
// ABOUTME: Prepares the filtered table list and propagates child warnings and errors

use super::action::run_per_database_actions;
use super::context::EngineContext;
use super::filter::apply_table_filters;
use super::part::{Part, PartCore};
use super::table::TablePart;
use crate::database::{DatabaseMeta, DriverError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Minimum seconds left in the budget before a table part is ticked
const MIN_TIME_FOR_TABLE_TICK: f64 = 0.001;

/// True when the error means the user cannot read any metadata at all
fn is_missing_information_schema_access(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<DriverError>(),
            Some(DriverError::NoInformationSchemaAccess(_))
        )
    })
}

/// Dumps every table of a database which survives the table filters
pub struct DatabasePart {
    core: PartCore,
    database: Option<DatabaseMeta>,
    tables: VecDeque<String>,
    current: Option<TablePart>,
}

impl DatabasePart {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            core: PartCore::new(database_name),
            database: None,
            tables: VecDeque::new(),
            current: None,
        }
    }

    pub fn database(&self) -> Option<&DatabaseMeta> {
        self.database.as_ref()
    }

    /// Tables not yet started, in processing order
    pub fn pending_tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    pub fn current_table(&self) -> Option<&TablePart> {
        self.current.as_ref()
    }

    async fn prepare_database(&mut self, ctx: &mut EngineContext) -> Result<()> {
        let database = ctx
            .db
            .database_meta()
            .await
            .context("Cannot read the database metadata")?;

        run_per_database_actions(&mut self.core, ctx, &database).await?;
        self.database = Some(database);
        Ok(())
    }

    async fn prepare_tables(&mut self, ctx: &mut EngineContext) -> Result<()> {
        let tables = ctx
            .db
            .table_list()
            .await
            .context("Cannot list the tables of the database")?;

        let tables = apply_table_filters(&mut self.core, ctx, tables).await?;
        tracing::info!("{} table(s) will be backed up", tables.len());

        self.tables = tables.into();
        Ok(())
    }

    /// Turn a recoverable metadata failure into a warning
    fn tolerate(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if is_missing_information_schema_access(&e) => Err(e),
            Err(e) => {
                self.core.add_warning(format!("{:#}", e));
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Part for DatabasePart {
    fn core(&self) -> &PartCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PartCore {
        &mut self.core
    }

    async fn prepare(&mut self, ctx: &mut EngineContext) -> Result<()> {
        self.core.step = "Initialization...".to_string();
        tracing::info!(
            "Starting to process backup of database “{}”",
            self.core.domain
        );

        let output = ctx.writer.file_path();
        tracing::info!(
            "Output SQL file: {}",
            if output.is_empty() { "(none)" } else { output }
        );

        let result = self.prepare_database(ctx).await;
        self.tolerate(result)?;

        let result = self.prepare_tables(ctx).await;
        self.tolerate(result)?;

        Ok(())
    }

    async fn process(&mut self, ctx: &mut EngineContext) -> Result<bool> {
        if self.current.is_none() {
            let Some(name) = self.tables.pop_front() else {
                tracing::debug!("No more tables to process");
                return Ok(false);
            };

            let meta = match ctx.db.table_meta(&name).await {
                Ok(meta) => meta,
                Err(DriverError::UnknownTable(_)) => {
                    self.core
                        .add_warning(format!("Table “{}” no longer exists; skipping it", name));
                    return Ok(true);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Cannot read metadata of table “{}”", name))
                }
            };

            self.core.step = name;
            self.current = Some(TablePart::new(self.core.domain.clone(), meta));
        }

        if ctx.timer.time_left() < MIN_TIME_FOR_TABLE_TICK {
            return Ok(true);
        }

        let Some(table) = self.current.as_mut() else {
            return Ok(true);
        };

        let status = table.tick(ctx).await;

        self.core.inherit(&status);
        self.core.step = status.step;
        self.core.substep = status.substep;

        if status.error.is_some() {
            return Ok(false);
        }

        if status.done {
            self.current = None;
        }

        Ok(true)
    }

    async fn finalize(&mut self, _ctx: &mut EngineContext) -> Result<()> {
        self.core.step = "Finalization...".to_string();
        self.core.substep.clear();
        tracing::info!("Finished backing up database “{}”", self.core.domain);
        Ok(())
    }
}
