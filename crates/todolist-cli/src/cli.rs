use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use todolist_core::EntryOrder;

#[derive(Parser)]
#[command(name = "todolist")]
#[command(about = "Keep a to-do list offline and sync it when you can")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new entry
    #[command(alias = "new")]
    Add {
        /// Entry title
        title: Vec<String>,
        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// List entries
    #[command(alias = "ls")]
    List {
        /// Sort order
        #[arg(short, long, value_enum, default_value_t = ListOrder::Created)]
        order: ListOrder,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single entry
    Show {
        /// Local entry ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the title or notes of an entry
    Edit {
        /// Local entry ID
        id: String,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Mark an entry complete
    Done {
        /// Local entry ID
        id: String,
    },
    /// Mark an entry not complete
    Undone {
        /// Local entry ID
        id: String,
    },
    /// Delete an entry
    #[command(alias = "rm")]
    Delete {
        /// Local entry ID
        id: String,
    },
    /// Delete every completed entry
    ClearCompleted,
    /// Push local changes and pull remote ones
    Sync {
        /// Discard local state and reload everything from the server
        #[arg(long)]
        refresh: bool,
    },
    /// Show database, sync and configuration status
    Status,
    /// Manage persisted settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ListOrder {
    Created,
    Modified,
    Title,
}

impl From<ListOrder> for EntryOrder {
    fn from(order: ListOrder) -> Self {
        match order {
            ListOrder::Created => Self::Created,
            ListOrder::Modified => Self::Modified,
            ListOrder::Title => Self::Title,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Set the sync server URL (e.g. <https://todo.example.com/todolist>)
    SetServer {
        /// Service root URL
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Store a bearer token sent with every sync request
    SetToken {
        #[arg(value_name = "TOKEN")]
        token: String,
    },
    /// Forget the stored bearer token
    ClearToken,
    /// Turn offline mode on or off
    Offline {
        #[arg(value_enum)]
        state: Switch,
    },
}
