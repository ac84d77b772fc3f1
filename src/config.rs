// ABOUTME: Backup job configuration loaded from TOML files
// ABOUTME: Holds timing, batching and pipeline tunables shared read-only by the engine

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Tunables of one backup job
///
/// Missing keys fall back to their defaults, so a partial TOML file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Output SQL file path template; empty means no output file
    pub output_sql_file: String,
    /// Log file path template; empty means log to stderr
    pub log_file: String,
    /// One of `debug`, `info`, `warning`, `error`
    pub min_log_level: String,
    /// Seconds each tick cycle must last at minimum
    pub min_execution_time: f64,
    /// Seconds available to each tick cycle
    pub max_execution_time: f64,
    /// Share of `max_execution_time` actually consumed, in percent
    pub runtime_bias_percent: u32,
    pub max_batch_size: u64,
    /// Upper bound in bytes of each emitted INSERT statement
    pub max_query_size: u64,
    pub description: String,
    /// Whether actions would be executed against the database as well as saved
    pub live_mode: bool,
    /// Only tables whose names start with this prefix are backed up
    pub table_prefix: String,
    /// Process memory limit in bytes; 0 means unlimited
    pub memory_limit: u64,
    /// Maximum size in bytes of each output part; 0 means unlimited
    pub max_file_size: u64,

    pub table_filters: Vec<String>,
    pub data_filters: Vec<String>,
    pub row_filters: Vec<String>,
    pub per_database_actions: Vec<String>,
    pub per_table_actions: Vec<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            output_sql_file: String::new(),
            log_file: String::new(),
            min_log_level: "debug".to_string(),
            min_execution_time: 2.0,
            max_execution_time: 5.0,
            runtime_bias_percent: 75,
            max_batch_size: 1000,
            max_query_size: 263_168,
            description: String::new(),
            live_mode: false,
            table_prefix: String::new(),
            memory_limit: 0,
            max_file_size: 0,
            table_filters: vec!["non_core".to_string(), "sorter".to_string()],
            data_filters: vec!["no_view_data".to_string(), "special_engines".to_string()],
            row_filters: Vec::new(),
            per_database_actions: Vec::new(),
            per_table_actions: vec!["get_create".to_string()],
        }
    }
}

impl Configuration {
    /// Clamp every tunable into its valid range
    pub fn normalized(mut self) -> Self {
        if !self.min_execution_time.is_finite() || self.min_execution_time < 0.0 {
            self.min_execution_time = 0.0;
        }
        if !self.max_execution_time.is_finite() || self.max_execution_time < 1.0 {
            self.max_execution_time = 1.0;
        }
        self.runtime_bias_percent = self.runtime_bias_percent.clamp(1, 100);
        self.max_batch_size = self.max_batch_size.max(1);
        self
    }

    /// Seconds of work each tick cycle may perform
    pub fn time_budget(&self) -> f64 {
        self.max_execution_time * f64::from(self.runtime_bias_percent) / 100.0
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Configuration =
            toml::from_str(raw).context("Failed to parse TOML configuration")?;
        Ok(config.normalized())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid config file at {}", path))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.max_batch_size, 1000);
        assert_eq!(config.max_query_size, 263_168);
        assert_eq!(config.runtime_bias_percent, 75);
        assert_eq!(config.per_table_actions, vec!["get_create"]);
        assert!((config.time_budget() - 3.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalized_clamps_out_of_range_values() {
        let config = Configuration {
            min_execution_time: -3.0,
            max_execution_time: 0.2,
            runtime_bias_percent: 250,
            max_batch_size: 0,
            ..Configuration::default()
        }
        .normalized();

        assert_eq!(config.min_execution_time, 0.0);
        assert_eq!(config.max_execution_time, 1.0);
        assert_eq!(config.runtime_bias_percent, 100);
        assert_eq!(config.max_batch_size, 1);

        let config = Configuration {
            runtime_bias_percent: 0,
            ..Configuration::default()
        }
        .normalized();
        assert_eq!(config.runtime_bias_percent, 1);
    }

    #[test]
    fn test_parse_partial_config_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        let contents = r#"
            output_sql_file = "/tmp/backup-[DATE].sql"
            table_prefix = "wp_"
            max_batch_size = 250
            row_filters = ["skip_drafts"]
        "#;
        write!(tmp, "{}", contents).unwrap();

        let config = Configuration::load_from_file(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(config.output_sql_file, "/tmp/backup-[DATE].sql");
        assert_eq!(config.table_prefix, "wp_");
        assert_eq!(config.max_batch_size, 250);
        assert_eq!(config.row_filters, vec!["skip_drafts"]);
        assert_eq!(config.max_query_size, 263_168);
        assert_eq!(config.table_filters, vec!["non_core", "sorter"]);
    }

    #[test]
    fn test_toml_round_trip_preserves_values() {
        let config = Configuration {
            description: "nightly".to_string(),
            live_mode: true,
            ..Configuration::default()
        };

        let raw = config.to_toml_string().unwrap();
        assert_eq!(Configuration::from_toml_str(&raw).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Configuration::load_from_file("/nonexistent/backup.toml");
        assert!(result.unwrap_err().to_string().contains("Failed to read"));
    }
}
