// ABOUTME: Top-level backup job driving a database part across time-limited cycles
// ABOUTME: Resets the timer per cycle and pads short cycles to the minimum execution time

use super::context::EngineContext;
use super::database::DatabasePart;
use super::part::{Part, PartError, PartStatus};

/// A resumable backup of the database the context's driver is connected to
pub struct BackupJob {
    ctx: EngineContext,
    part: DatabasePart,
    cycles: u64,
}

impl BackupJob {
    pub fn new(ctx: EngineContext) -> Self {
        let part = DatabasePart::new(ctx.db.database_name());
        Self {
            ctx,
            part,
            cycles: 0,
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn part(&self) -> &DatabasePart {
        &self.part
    }

    pub fn is_done(&self) -> bool {
        self.part.is_done()
    }

    pub fn error(&self) -> Option<&PartError> {
        self.part.core().error()
    }

    /// Every warning raised so far
    pub fn warnings(&self) -> &[String] {
        self.part.core().warnings()
    }

    /// Number of completed [`BackupJob::run_cycle`] calls
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Advance the backup by a single tick
    pub async fn tick(&mut self) -> PartStatus {
        self.part.tick(&mut self.ctx).await
    }

    /// Tick until the time budget is spent or the backup is over
    ///
    /// The returned status carries every warning raised during the cycle.
    pub async fn run_cycle(&mut self) -> PartStatus {
        self.ctx.timer.reset();
        let mut warnings = Vec::new();

        let mut status = loop {
            let mut status = self.tick().await;
            warnings.append(&mut status.warnings);

            if status.done || self.ctx.timer.time_left() <= 0.0 {
                break status;
            }
        };

        self.cycles += 1;
        tracing::debug!(
            "Cycle {} ended after {:.3}s at “{}” {}",
            self.cycles,
            self.ctx.timer.running_time(),
            status.step,
            status.substep
        );

        status.warnings = warnings;
        status
    }

    /// Run cycles until the backup finishes, calling `on_cycle` after each one
    pub async fn run_to_completion<F>(&mut self, mut on_cycle: F) -> PartStatus
    where
        F: FnMut(&PartStatus),
    {
        loop {
            let status = self.run_cycle().await;
            on_cycle(&status);

            if status.done {
                return status;
            }

            self.ctx.timer.enforce_min_execution_time().await;
        }
    }
}
