//! todolist - keep a to-do list offline and sync it with a REST service

mod cli;
mod commands;
mod error;
mod settings;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::clear::run_clear_completed;
use crate::commands::common::{load_client_config, resolve_db_path};
use crate::commands::complete::run_set_complete;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("todolist=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Some(Commands::Add { title, notes }) => run_add(&title, notes, &db_path)?,
        Some(Commands::List { order, json }) => run_list(order, json, &db_path)?,
        Some(Commands::Show { id, json }) => run_show(&id, json, &db_path)?,
        Some(Commands::Edit { id, title, notes }) => run_edit(&id, title, notes, &db_path)?,
        Some(Commands::Done { id }) => run_set_complete(&id, true, &db_path)?,
        Some(Commands::Undone { id }) => run_set_complete(&id, false, &db_path)?,
        Some(Commands::Delete { id }) => run_delete(&id, &db_path)?,
        Some(Commands::ClearCompleted) => run_clear_completed(&db_path)?,
        Some(Commands::Sync { refresh }) => {
            let config = load_client_config()?;
            run_sync(refresh, &db_path, &config).await?;
        }
        Some(Commands::Status) => {
            let config = load_client_config()?;
            run_status(&db_path, &config)?;
        }
        Some(Commands::Config { command }) => run_config(command)?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
