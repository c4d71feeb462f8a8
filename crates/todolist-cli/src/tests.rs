use std::path::PathBuf;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use todolist_core::config::ClientConfig;
use todolist_core::services::TodoList;
use todolist_core::sync::LAST_SYNC_FILE_NAME;
use todolist_core::{Entry, EntryId, EntryOrder, PendingUpdate};

use crate::cli::{CompletionShell, ConfigCommands, Switch};
use crate::commands::add::run_add;
use crate::commands::clear::run_clear_completed;
use crate::commands::common::{
    format_entry_line, format_relative_time, format_timestamp, normalize_title, parse_entry_id,
    title_preview,
};
use crate::commands::complete::run_set_complete;
use crate::commands::completions::render_completions;
use crate::commands::config::run_config_at;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::show::format_entry_details;
use crate::commands::status::{format_last_sync, load_status};
use crate::commands::sync::{format_sync_report, sync_database};
use crate::error::CliError;
use crate::settings::CliSettings;

fn temp_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("todolist.db");
    (dir, path)
}

fn entries(db_path: &PathBuf) -> Vec<Entry> {
    TodoList::open_path(db_path)
        .unwrap()
        .list(EntryOrder::Created)
        .unwrap()
}

fn sample_entry() -> Entry {
    Entry {
        id: EntryId::new(7),
        remote_id: None,
        title: "Water the plants".to_string(),
        notes: "balcony first\nthen kitchen".to_string(),
        complete: true,
        created: 0,
        modified: 0,
        pending: PendingUpdate::Dirty,
        in_flight: false,
        pending_delete: false,
    }
}

#[test]
fn normalize_title_collapses_whitespace() {
    assert_eq!(
        normalize_title(&["  Buy ".to_string(), "milk\t".to_string()]),
        Some("Buy milk".to_string())
    );
    assert_eq!(normalize_title(&[" ".to_string()]), None);
    assert_eq!(normalize_title(&[]), None);
}

#[test]
fn parse_entry_id_validates_input() {
    assert_eq!(parse_entry_id(" 12 ").unwrap(), EntryId::new(12));
    assert!(matches!(parse_entry_id("  "), Err(CliError::EmptyEntryId)));
    assert!(matches!(
        parse_entry_id("abc"),
        Err(CliError::InvalidEntryId(_))
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn title_preview_truncates_with_ellipsis() {
    let preview = title_preview("This is a very long title that should be shortened", 20);
    assert_eq!(preview, "This is a very lo...");
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn entry_line_marks_completion_and_unsynced_changes() {
    let mut entry = sample_entry();
    let line = format_entry_line(&entry, 30_000);
    assert!(line.starts_with("    7  [x]* Water the plants"));
    assert!(line.ends_with("just now"));

    entry.pending = PendingUpdate::Clean;
    entry.complete = false;
    let line = format_entry_line(&entry, 30_000);
    assert!(line.contains("[ ]  Water the plants"));
}

#[test]
fn entry_details_include_sync_state_and_notes() {
    let mut entry = sample_entry();
    entry.remote_id = Some(42);

    let lines = format_entry_details(&entry);
    assert!(lines.contains(&"Status:    complete".to_string()));
    assert!(lines.contains(&"Sync:      remote #42, local changes pending".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("then kitchen"));
}

#[test]
fn add_complete_and_clear_round_trip() {
    let (_dir, db_path) = temp_db();

    run_add(
        &["Buy".to_string(), "milk".to_string()],
        Some(" oat ".to_string()),
        &db_path,
    )
    .unwrap();
    run_add(&["Call mom".to_string()], None, &db_path).unwrap();

    let stored = entries(&db_path);
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].title, "Buy milk");
    assert_eq!(stored[0].notes, "oat");
    assert!(stored.iter().all(Entry::is_dirty));

    run_set_complete(&stored[0].id.to_string(), true, &db_path).unwrap();
    run_clear_completed(&db_path).unwrap();

    let remaining = entries(&db_path);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Call mom");
}

#[test]
fn add_rejects_blank_title() {
    let (_dir, db_path) = temp_db();
    assert!(matches!(
        run_add(&["   ".to_string()], None, &db_path),
        Err(CliError::EmptyTitle)
    ));
}

#[test]
fn edit_and_delete_report_missing_entries() {
    let (_dir, db_path) = temp_db();
    run_add(&["Draft".to_string()], None, &db_path).unwrap();
    let id = entries(&db_path)[0].id;

    assert!(matches!(
        run_edit(&id.to_string(), None, None, &db_path),
        Err(CliError::NothingToEdit)
    ));
    run_edit(&id.to_string(), Some("Final".to_string()), None, &db_path).unwrap();
    assert_eq!(entries(&db_path)[0].title, "Final");

    run_delete(&id.to_string(), &db_path).unwrap();
    assert!(entries(&db_path).is_empty());
    assert!(matches!(
        run_delete(&id.to_string(), &db_path),
        Err(CliError::EntryNotFound(missing)) if missing == id
    ));
}

#[test]
fn status_of_fresh_database() {
    let (_dir, db_path) = temp_db();
    run_add(&["One".to_string()], None, &db_path).unwrap();

    let status = load_status(&db_path).unwrap();
    assert_eq!(status.entries, 1);
    assert_eq!(status.unsynced, 1);
    assert_eq!(format_last_sync(status.last_sync_time), "never");
}

#[test]
fn sync_report_lines_mention_failures() {
    let report = todolist_core::sync::SyncReport {
        changed: true,
        pushed: 2,
        push_failures: 1,
        pulled: 5,
        mode: todolist_core::sync::PullMode::Refresh,
    };
    let lines = format_sync_report(&report);
    assert_eq!(lines[0], "Sync completed (full refresh): pushed 2, received 5");
    assert!(lines[1].starts_with("1 entries could not be pushed"));
    assert_eq!(lines.len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn sync_requires_configuration_and_online_mode() {
    let (_dir, db_path) = temp_db();

    let unconfigured = ClientConfig::default();
    assert!(matches!(
        sync_database(false, &db_path, &unconfigured).await,
        Err(CliError::SyncNotConfigured)
    ));

    let offline = ClientConfig::default()
        .with_server_url("http://127.0.0.1:9/todolist")
        .unwrap()
        .with_offline_mode(true);
    assert!(matches!(
        sync_database(false, &db_path, &offline).await,
        Err(CliError::OfflineMode)
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn sync_pushes_entries_to_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = todolist_api::app_router(todolist_api::AppState::from_config(Arc::new(
        todolist_api::AppConfig::default(),
    )));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let (_dir, db_path) = temp_db();
    run_add(&["Buy milk".to_string()], None, &db_path).unwrap();

    let config = ClientConfig::default()
        .with_server_url(format!("http://{addr}/todolist"))
        .unwrap();
    let report = sync_database(false, &db_path, &config).await.unwrap();
    assert_eq!(report.pushed, 1);

    let status = load_status(&db_path).unwrap();
    assert_eq!(status.unsynced, 0);
    assert!(status.last_sync_time > 0.0);
    assert!(db_path.with_file_name(LAST_SYNC_FILE_NAME).exists());
    assert!(entries(&db_path)[0].remote_id.is_some());
}

#[test]
fn config_commands_persist_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cli-config.json");

    run_config_at(
        ConfigCommands::SetServer {
            url: "https://todo.example.com/todolist/".to_string(),
        },
        &path,
    )
    .unwrap();
    run_config_at(
        ConfigCommands::SetToken {
            token: " secret ".to_string(),
        },
        &path,
    )
    .unwrap();
    run_config_at(ConfigCommands::Offline { state: Switch::On }, &path).unwrap();

    let settings = CliSettings::load_from_path(&path).unwrap();
    assert_eq!(
        settings.server_url.as_deref(),
        Some("https://todo.example.com/todolist")
    );
    assert_eq!(settings.auth_token.as_deref(), Some("secret"));
    assert!(settings.offline_mode);

    run_config_at(ConfigCommands::ClearToken, &path).unwrap();
    assert_eq!(CliSettings::load_from_path(&path).unwrap().auth_token, None);

    assert!(matches!(
        run_config_at(
            ConfigCommands::SetServer {
                url: "ftp://nope".to_string()
            },
            &path
        ),
        Err(CliError::Config(_))
    ));
}

#[test]
fn completions_use_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("todolist"));
    assert!(script.contains("clear-completed"));
}
