// ABOUTME: Backup command: dumps a MySQL database to a SQL script in timed cycles
// ABOUTME: Confirms overwrites, shows progress and summarizes warnings and output parts

use crate::config::Configuration;
use crate::database::mysql::MySqlDriver;
use crate::database::Driver;
use crate::engine::{BackupJob, EngineContext};
use crate::output::OutFileSetup;
use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Ask before truncating an existing output file
fn confirm_overwrite(path: Option<&str>, yes: bool) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    if yes || !Path::new(path).exists() {
        return Ok(());
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Output file {} already exists. Overwrite it?", path))
        .default(false)
        .interact()
        .context("Failed to get confirmation")?;

    if !confirmed {
        tracing::warn!("⚠ User cancelled operation");
        bail!("Backup cancelled by user");
    }

    Ok(())
}

fn spinner() -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

/// Back up the database named in `url`
///
/// # Errors
///
/// Returns error if:
/// - The database cannot be reached
/// - The output file cannot be created
/// - The backup stops on a fatal error
pub async fn backup(
    url: &str,
    config: Configuration,
    setup: &OutFileSetup,
    yes: bool,
) -> Result<()> {
    tracing::info!("Starting backup...");
    if !config.description.is_empty() {
        tracing::info!("Job: {}", config.description);
    }

    let driver = MySqlDriver::connect(url).await?;
    let database = driver.database_name().to_string();
    let additional = [("[DATABASE]", database.as_str())];

    let output = setup.output_file_path(&config, &additional);
    confirm_overwrite(output.as_deref(), yes)?;
    let writer = setup
        .make_output_writer(&config, true, &additional)
        .context("Failed to open the output SQL file")?;

    let ctx = EngineContext::new(Box::new(driver), config).with_writer(writer);
    let mut job = BackupJob::new(ctx);

    let progress = spinner()?;
    let status = job
        .run_to_completion(|status| {
            progress.set_message(format!(
                "{} / {} {}",
                status.domain, status.step, status.substep
            ));
        })
        .await;
    progress.finish_and_clear();

    let warnings = job.warnings();
    if !warnings.is_empty() {
        tracing::warn!("Backup raised {} warning(s):", warnings.len());
        for warning in warnings {
            tracing::warn!("  - {}", warning);
        }
    }

    if let Some(error) = status.error {
        bail!("Backup of database '{}' failed: {}", database, error.message);
    }

    tracing::info!(
        "✓ Backup of database '{}' complete after {} cycle(s)",
        database,
        job.cycles()
    );
    if output.is_some() {
        for part in job.context().writer.list_of_parts() {
            tracing::info!("  Output: {}", part.display());
        }
    }

    Ok(())
}
