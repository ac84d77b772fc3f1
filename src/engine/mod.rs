// ABOUTME: Time-sliced backup engine: parts, filters, actions and their registry
// ABOUTME: A job ticks a database part, which ticks one table part at a time

pub mod action;
pub mod context;
pub mod database;
pub mod filter;
pub mod job;
pub mod part;
pub mod registry;
pub mod response;
pub mod table;

pub use context::EngineContext;
pub use database::DatabasePart;
pub use job::BackupJob;
pub use part::{ErrorKind, Part, PartError, PartState, PartStatus};
pub use registry::{ComponentKind, LookupError, Registry};
pub use response::SqlResponse;
pub use table::TablePart;
