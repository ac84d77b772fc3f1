// ABOUTME: Command implementations behind the CLI subcommands
// ABOUTME: Exports the backup command

pub mod backup;

pub use backup::backup;
