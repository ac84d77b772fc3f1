// ABOUTME: Collaborators shared by every part and action of one backup run
// ABOUTME: Bundles the driver, output writer, timer, memory info, configuration and registry

use super::registry::Registry;
use crate::config::Configuration;
use crate::database::Driver;
use crate::memory::{MemoryInfo, ProcessMemory};
use crate::timer::{TimeBudget, Timer};
use crate::writer::{NullWriter, OutputWriter};

/// Everything a part needs besides its own cursors
///
/// Fields are public so parts can borrow them independently.
pub struct EngineContext {
    pub db: Box<dyn Driver>,
    pub writer: Box<dyn OutputWriter>,
    pub timer: Box<dyn TimeBudget>,
    pub memory: Box<dyn MemoryInfo>,
    pub config: Configuration,
    pub registry: Registry,
}

impl EngineContext {
    /// Context with a discarding writer, a timer and memory info derived
    /// from `config`, and the default component registry
    pub fn new(db: Box<dyn Driver>, config: Configuration) -> Self {
        let timer = Timer::new(
            config.min_execution_time,
            config.max_execution_time,
            config.runtime_bias_percent,
        );
        let memory = ProcessMemory::new(config.memory_limit);

        Self {
            db,
            writer: Box::new(NullWriter),
            timer: Box::new(timer),
            memory: Box::new(memory),
            config,
            registry: Registry::with_defaults(),
        }
    }

    pub fn with_writer(mut self, writer: Box<dyn OutputWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_timer(mut self, timer: Box<dyn TimeBudget>) -> Self {
        self.timer = timer;
        self
    }

    pub fn with_memory(mut self, memory: Box<dyn MemoryInfo>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }
}
