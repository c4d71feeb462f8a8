use std::path::Path;
use std::sync::Arc;

use todolist_core::config::ClientConfig;
use todolist_core::remote::HttpRemoteClient;
use todolist_core::sync::{FileSyncClock, LogNotifier, PullMode, SyncEngine, SyncReport};

use crate::commands::common::open_list;
use crate::error::CliError;

pub async fn run_sync(refresh: bool, db_path: &Path, config: &ClientConfig) -> Result<(), CliError> {
    let report = sync_database(refresh, db_path, config).await?;
    for line in format_sync_report(&report) {
        println!("{line}");
    }
    Ok(())
}

/// One sync pass over the database at `db_path`
pub async fn sync_database(
    refresh: bool,
    db_path: &Path,
    config: &ClientConfig,
) -> Result<SyncReport, CliError> {
    if config.offline_mode {
        return Err(CliError::OfflineMode);
    }
    if !config.is_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let client = HttpRemoteClient::from_config(config)?;
    let list = open_list(db_path)?;
    let engine = SyncEngine::new(
        Arc::clone(list.database()),
        Arc::new(FileSyncClock::beside_database(db_path)),
        Arc::new(LogNotifier),
    );

    tracing::debug!(?client, refresh, "Running sync");
    Ok(engine.run(&client, refresh).await?)
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let mode = match report.mode {
        PullMode::Incremental => "incremental",
        PullMode::Refresh => "full refresh",
    };
    let mut lines = vec![format!(
        "Sync completed ({mode}): pushed {}, received {}",
        report.pushed, report.pulled
    )];
    if report.push_failures > 0 {
        lines.push(format!(
            "{} entries could not be pushed and stay marked with *",
            report.push_failures
        ));
    }
    if !report.changed {
        lines.push("Already up to date.".to_string());
    }
    lines
}
