// ABOUTME: Path template expansion for output and log files
// ABOUTME: Builds the SQL output writer from the configured file template

use crate::config::Configuration;
use crate::writer::{FileWriter, NullWriter, OutputWriter};
use anyhow::Result;
use chrono::{DateTime, FixedOffset, Local, Utc};

/// Expands `[DATE]`, `[TIME_TZ]` and friends in file name templates
///
/// All variables are computed for one fixed point in time so that every file
/// of a job gets the same stamp.
#[derive(Debug, Clone)]
pub struct OutFileSetup {
    date_time: DateTime<FixedOffset>,
    tz_name: String,
}

impl OutFileSetup {
    pub fn new(date_time: DateTime<FixedOffset>, tz_name: impl Into<String>) -> Self {
        Self {
            date_time,
            tz_name: tz_name.into(),
        }
    }

    pub fn now_utc() -> Self {
        Self::new(Utc::now().fixed_offset(), "UTC")
    }

    /// Current time in the host's local time zone, named by its UTC offset
    pub fn now_local() -> Self {
        let now = Local::now().fixed_offset();
        let tz_name = now.format("%:z").to_string();
        Self::new(now, tz_name)
    }

    /// Variable name and replacement pairs, in substitution order
    pub fn variables(&self) -> Vec<(String, String)> {
        let fs_safe_tz = self.tz_name.replace([' ', '/', ':'], "_").to_lowercase();
        let stamp = |format: &str| self.date_time.format(format).to_string();

        vec![
            ("[DATE]".to_string(), stamp("%Y%m%d")),
            ("[YEAR]".to_string(), stamp("%Y")),
            ("[MONTH]".to_string(), stamp("%m")),
            ("[DAY]".to_string(), stamp("%d")),
            ("[TIME]".to_string(), stamp("%H%M%S")),
            ("[TIME_TZ]".to_string(), format!("{}{}", stamp("%H%M%S"), fs_safe_tz)),
            ("[WEEK]".to_string(), stamp("%V")),
            ("[WEEKDAY]".to_string(), stamp("%A")),
            ("[GMT_OFFSET]".to_string(), stamp("%z")),
            ("[TZ]".to_string(), fs_safe_tz),
            ("[TZ_RAW]".to_string(), self.tz_name.clone()),
        ]
    }

    /// Replace every known variable in `input`; `additional` entries win over built-in ones
    pub fn replace_variables(&self, input: &str, additional: &[(&str, &str)]) -> String {
        let mut variables = self.variables();
        for (key, value) in additional {
            match variables.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = value.to_string(),
                None => variables.push((key.to_string(), value.to_string())),
            }
        }

        variables
            .iter()
            .fold(input.to_string(), |acc, (key, value)| acc.replace(key.as_str(), value))
    }

    /// Build the SQL output writer; a [`NullWriter`] when no output file is configured
    ///
    /// With `reset` set an existing file of the same name is truncated.
    pub fn make_output_writer(
        &self,
        config: &Configuration,
        reset: bool,
        additional: &[(&str, &str)],
    ) -> Result<Box<dyn OutputWriter>> {
        match self.output_file_path(config, additional) {
            None => Ok(Box::new(NullWriter)),
            Some(path) => Ok(Box::new(FileWriter::create(
                &path,
                reset,
                config.max_file_size,
            )?)),
        }
    }

    /// Expanded output SQL file path, `None` when not configured
    pub fn output_file_path(
        &self,
        config: &Configuration,
        additional: &[(&str, &str)],
    ) -> Option<String> {
        if config.output_sql_file.is_empty() {
            return None;
        }
        Some(self.replace_variables(&config.output_sql_file, additional))
    }

    /// Expanded log file path, `None` when logging goes to stderr
    pub fn log_file_path(
        &self,
        config: &Configuration,
        additional: &[(&str, &str)],
    ) -> Option<String> {
        if config.log_file.is_empty() {
            return None;
        }
        Some(self.replace_variables(&config.log_file, additional))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn nicosia_winter() -> OutFileSetup {
        let date_time = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2018, 1, 2, 3, 4, 5)
            .single()
            .unwrap();
        OutFileSetup::new(date_time, "EET")
    }

    #[test]
    fn test_variables() {
        let variables = nicosia_winter().variables();
        let lookup = |key: &str| {
            variables
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(lookup("[DATE]"), "20180102");
        assert_eq!(lookup("[YEAR]"), "2018");
        assert_eq!(lookup("[MONTH]"), "01");
        assert_eq!(lookup("[DAY]"), "02");
        assert_eq!(lookup("[TIME]"), "030405");
        assert_eq!(lookup("[TIME_TZ]"), "030405eet");
        assert_eq!(lookup("[WEEK]"), "01");
        assert_eq!(lookup("[WEEKDAY]"), "Tuesday");
        assert_eq!(lookup("[GMT_OFFSET]"), "+0200");
        assert_eq!(lookup("[TZ]"), "eet");
        assert_eq!(lookup("[TZ_RAW]"), "EET");
    }

    #[test]
    fn test_additional_variables() {
        let setup = nicosia_winter();
        assert_eq!(
            setup.replace_variables("[DATE]-[TIME_TZ]-[FOO].sql", &[("[FOO]", "bar")]),
            "20180102-030405eet-bar.sql"
        );
        assert_eq!(
            setup.replace_variables("[DATE].sql", &[("[DATE]", "today")]),
            "today.sql"
        );
    }

    #[test]
    fn test_make_output_writer_with_file() {
        let dir = TempDir::new().unwrap();
        let template = format!("{}/[DATE]-[TIME_TZ]-[FOO].sql", dir.path().display());
        let config = Configuration {
            output_sql_file: template,
            ..Configuration::default()
        };

        let writer = nicosia_winter()
            .make_output_writer(&config, true, &[("[FOO]", "bar")])
            .unwrap();

        let expected = dir.path().join("20180102-030405eet-bar.sql");
        assert_eq!(writer.file_path(), expected.to_str().unwrap());
        assert!(expected.exists());
    }

    #[test]
    fn test_make_output_writer_without_file() {
        let config = Configuration::default();
        let writer = nicosia_winter()
            .make_output_writer(&config, true, &[])
            .unwrap();
        assert_eq!(writer.file_path(), "");
        assert!(nicosia_winter().log_file_path(&config, &[]).is_none());
    }
}
