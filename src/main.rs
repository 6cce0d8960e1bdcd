//! # recurdo
//!
//! A terminal task manager that understands due dates written the way people
//! say them ("next friday", "in 3 days", "every other week until march 1")
//! and keeps recurring tasks rolling forward.
//!
//! ## Features
//!
//! *   **Natural-language dates**: Relative phrases, weekdays, month names,
//!     ISO and US numeric dates, optional times ("at 3pm").
//! *   **Recurring tasks**: Daily, weekly, monthly and yearly rules with an
//!     interval and an optional inclusive end date.
//! *   **Dual Interface**:
//!     *   **CLI**: Scriptable and quick for single commands.
//!     *   **TUI**: Interactive dashboard with a live preview of what a date
//!         phrase means before you commit it.
//! *   **Data Persistence**: Tasks are stored as JSON in the XDG data
//!     directory, with every change written under a lock file.
//!
//! ## Installation
//!
//! ```bash
//! cargo install --path .
//! ```
//!
//! ## Usage
//!
//! ### Interactive Mode (TUI)
//!
//! ```bash
//! recurdo
//! # or explicitly
//! recurdo ui
//! ```
//!
//! #### TUI Key Bindings
//!
//! *   `q`: Quit
//! *   `a`: Add new task (title, then due date)
//! *   `Space`: Complete selected task (recurring tasks move to their next date)
//! *   `s`: Create the next instance of the selected recurring task
//! *   `t`: Edit due date, with live preview
//! *   `n`: Edit title
//! *   `x`: Stop the selected task from recurring
//! *   `c`: Toggle Show/Hide Completed Tasks
//! *   `d`: Delete selected task
//! *   `v`: Switch between all tasks and recurring tasks
//!
//! ### Command Line Interface (CLI)
//!
//! ```bash
//! # One-off task
//! recurdo add "Write report" --due "next friday at 5pm"
//!
//! # Recurring task, from the phrase or from flags
//! recurdo add "Team Standup" --due "every monday until dec 15"
//! recurdo add "Pay rent" --recur monthly --due "nov 1"
//!
//! # See what a phrase means
//! recurdo parse "every other week" --json
//!
//! # Preview a rule
//! recurdo next monthly --from 2025-01-31 --count 4
//!
//! recurdo list --all
//! recurdo complete <ID>
//! recurdo spawn <ID>
//! ```
//!
//! ## Configuration
//!
//! `recurdo.toml` in the working directory, or `config.toml` in the
//! `recurdo` config directory:
//!
//! ```toml
//! tasks_db = "/home/me/tasks.json"
//! log_filter = "recurdo=debug"
//! ```
//!
//! `TASKS_DB` and `RECURDO_LOG` override the file.

use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing::debug;

use recurdo::commands::*;
use recurdo::config::Config;
use recurdo::dates::local_now;
use recurdo::error::Result;
use recurdo::logging;
use recurdo::storage::TaskStore;
use recurdo::tui::run_tui;

#[derive(Parser)]
#[command(name = "recurdo")]
#[command(about = "Task manager with natural-language due dates and recurring tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
        /// Due date in plain words, e.g. "tomorrow at 9am" or "every monday"
        #[arg(short, long)]
        due: Option<String>,
        /// Recurrence pattern (daily, weekly, monthly, yearly)
        #[arg(short, long)]
        recur: Option<String>,
        /// Repeat every N periods
        #[arg(short, long)]
        every: Option<u32>,
        /// Last day an occurrence may fall on
        #[arg(short, long)]
        until: Option<String>,
    },
    /// List tasks sorted by due date
    List {
        /// Show completed tasks
        #[arg(short, long)]
        all: bool,
    },
    /// Mark a task as complete
    Complete {
        id: u64,
    },
    /// Create the next instance of a recurring task
    Spawn {
        id: u64,
    },
    /// Remove a task
    Remove {
        id: u64,
    },
    /// Edit a task
    Edit {
        id: u64,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New due date in plain words ("none" clears it)
        #[arg(short, long)]
        due: Option<String>,
        /// New recurrence pattern
        #[arg(short, long)]
        recur: Option<String>,
        /// New interval
        #[arg(short, long)]
        every: Option<u32>,
        /// New end date
        #[arg(short, long)]
        until: Option<String>,
        /// Stop recurring
        #[arg(long, conflicts_with_all = ["recur", "every", "until"])]
        no_recur: bool,
    },
    /// Show how a date phrase is understood
    Parse {
        text: String,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Preview the next occurrences of a rule
    Next {
        /// Recurrence pattern (daily, weekly, monthly, yearly)
        pattern: String,
        #[arg(short, long, default_value_t = 1)]
        every: u32,
        /// Start date (defaults to today)
        #[arg(short, long)]
        from: Option<String>,
        #[arg(short, long, default_value_t = 5)]
        count: usize,
        #[arg(short, long)]
        until: Option<String>,
    },
    /// Reset the database (delete all tasks)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
    /// Open interactive TUI
    Ui,
}

fn run(cli: Cli, store: &TaskStore) -> Result<()> {
    let now = local_now();
    match cli.command {
        Some(Commands::Add { title, due, recur, every, until }) => {
            cmd_add(store, title, due, recur, every, until, now, false).map(drop)
        }
        Some(Commands::List { all }) => cmd_list(store, all, now),
        Some(Commands::Complete { id }) => cmd_complete(store, id, now, false).map(drop),
        Some(Commands::Spawn { id }) => cmd_spawn(store, id, now, false).map(drop),
        Some(Commands::Remove { id }) => cmd_remove(store, id, false),
        Some(Commands::Edit { id, title, due, recur, every, until, no_recur }) => {
            cmd_edit(store, id, title, due, recur, every, until, no_recur, now, false)
        }
        Some(Commands::Parse { text, json }) => cmd_parse(&text, now, json).map(drop),
        Some(Commands::Next { pattern, every, from, count, until }) => {
            cmd_next(&pattern, every, from, count, until, now, false).map(drop)
        }
        Some(Commands::Reset { force }) => cmd_reset(store, force),
        Some(Commands::Completions { shell }) => {
            let shell_enum = match shell.as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "powershell" => Shell::PowerShell,
                "elvish" => Shell::Elvish,
                _ => {
                    eprintln!("Unsupported shell: {}", shell);
                    return Ok(());
                }
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "recurdo", &mut io::stdout());
            Ok(())
        }
        Some(Commands::Ui) | None => {
            if let Err(e) = run_tui(store.clone()) {
                eprintln!("Error running TUI: {}", e);
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };
    logging::init(&config.log_filter);
    debug!(db = %config.tasks_db.display(), "configuration loaded");

    let store = TaskStore::from_config(&config);
    if let Err(e) = run(cli, &store) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
