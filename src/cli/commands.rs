use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tt", about = concat!("tasktree v", env!("CARGO_PKG_VERSION"), " - subtasks that stay consistent"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Task snapshot file (JSON)
    #[arg(short = 'f', long = "file", global = true, default_value = "tasks.json")]
    pub file: PathBuf,

    /// Config file (default: tasktree.toml next to the snapshot)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show visible rows of the task tree
    Rows(RowsArgs),
    /// Show tasks grouped into status columns
    Board,
    /// Check whether a task can be marked done
    Check(CheckArgs),
    /// Change one task's status
    State(StateArgs),
    /// Change the status of several tasks, one at a time
    Bulk(BulkArgs),
    /// Re-render rows whenever the snapshot file changes
    Watch(RowsArgs),
}

#[derive(Args, Clone, Default)]
pub struct RowsArgs {
    /// Only rows with this status (todo, in_progress, done)
    #[arg(long)]
    pub status: Option<String>,
    /// Only rows with this priority (low, medium, high, urgent)
    #[arg(long)]
    pub priority: Option<String>,
    /// Only rows whose title matches this regex
    #[arg(long = "match")]
    pub pattern: Option<String>,
    /// Expand a parent task (repeatable)
    #[arg(long = "expand", value_name = "ID")]
    pub expand: Vec<String>,
    /// Expand every parent task
    #[arg(long)]
    pub expand_all: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Task ID
    pub id: String,
}

#[derive(Args)]
pub struct StateArgs {
    /// Task ID
    pub id: String,
    /// New status (todo, in_progress, done)
    pub status: String,
    /// Confirm cascading resets without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct BulkArgs {
    /// New status (todo, in_progress, done)
    pub status: String,
    /// Task IDs
    #[arg(required = true)]
    pub ids: Vec<String>,
    /// Confirm cascading resets without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,
}
