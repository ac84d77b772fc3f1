// ABOUTME: Library module for sliced-db-backup
// ABOUTME: Exports the backup engine, drivers and job plumbing for the binary and tests

pub mod commands;
pub mod config;
pub mod database;
pub mod engine;
pub mod memory;
pub mod output;
pub mod timer;
pub mod writer;
