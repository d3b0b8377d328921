mod confirm;
pub use confirm::StdinConfirmer;

use std::error::Error;
use std::sync::Arc;

use regex::Regex;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::store::FileStore;
use crate::io::watcher::SnapshotWatcher;
use crate::model::config::EngineConfig;
use crate::model::task::{Priority, TaskId, TaskStatus};
use crate::model::tree::find_node;
use crate::ops::bulk::BulkOutcome;
use crate::ops::complete::blocking_children;
use crate::ops::filter::Filters;
use crate::ops::transition::{Feedback, FeedbackLevel, TransitionOutcome};
use crate::sync::listener::{UpdateListener, channel};
use crate::sync::reconcile::ReconcileOutcome;
use crate::sync::service::{AutoConfirm, Confirmer};
use crate::workspace::{Workspace, WorkspaceError};

type CmdResult = Result<(), Box<dyn Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub async fn dispatch(cli: Cli) -> CmdResult {
    let config_path = config_io::config_path(cli.config.as_deref(), &cli.file);
    let config = config_io::read_config(&config_path)?;
    tracing::debug!(config = %config_path.display(), "loaded config");

    let ctx = Context {
        store: Arc::new(FileStore::new(&cli.file)),
        config,
        json: cli.json,
    };

    match cli.command {
        Commands::Rows(args) => cmd_rows(&ctx, args).await,
        Commands::Board => cmd_board(&ctx).await,
        Commands::Check(args) => cmd_check(&ctx, args).await,
        Commands::State(args) => cmd_state(&ctx, args).await,
        Commands::Bulk(args) => cmd_bulk(&ctx, args).await,
        Commands::Watch(args) => cmd_watch(&ctx, args).await,
    }
}

struct Context {
    store: Arc<FileStore>,
    config: EngineConfig,
    json: bool,
}

impl Context {
    /// Workspace loaded from the snapshot file
    async fn workspace(&self, confirmer: Arc<dyn Confirmer>) -> Result<Workspace, Box<dyn Error>> {
        let mut ws = Workspace::new(
            self.store.clone(),
            self.store.clone(),
            confirmer,
            self.config.clone(),
        );
        ws.refresh().await?;
        Ok(ws)
    }
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

fn parse_status(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(s)
        .ok_or_else(|| format!("invalid status '{}' (expected todo, in_progress or done)", s))
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::parse(s)
        .ok_or_else(|| format!("invalid priority '{}' (expected low, medium, high or urgent)", s))
}

fn build_filters(args: &RowsArgs) -> Result<Filters, Box<dyn Error>> {
    let mut filters = Filters::default();
    if let Some(s) = &args.status {
        filters = filters.with_status(parse_status(s)?);
    }
    if let Some(p) = &args.priority {
        filters = filters.with_priority(parse_priority(p)?);
    }
    if let Some(pattern) = &args.pattern {
        let re = Regex::new(pattern).map_err(|e| format!("invalid --match pattern: {}", e))?;
        filters = filters.with_title(re);
    }
    Ok(filters)
}

/// Set filters and expansion on a workspace from `rows`/`watch` arguments
fn apply_view_args(ws: &mut Workspace, args: &RowsArgs) -> CmdResult {
    ws.filters = build_filters(args)?;
    if args.expand_all {
        let forest = ws.forest().to_vec();
        ws.expanded.expand_all(&forest);
    }
    for id in &args.expand {
        let id = TaskId::from(id.as_str());
        if ws.reconciler().task(&id).is_none() {
            return Err(format!("task not found: {}", id).into());
        }
        ws.expanded.expand(id);
    }
    Ok(())
}

fn report(feedback: &Feedback) {
    match feedback.level {
        FeedbackLevel::Info => println!("{}", feedback.message),
        FeedbackLevel::Warning => eprintln!("warning: {}", feedback.message),
        FeedbackLevel::Error => eprintln!("error: {}", feedback.message),
    }
}

fn confirmer(yes: bool) -> Arc<dyn Confirmer> {
    if yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(StdinConfirmer::new())
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn print_rows(ws: &Workspace, json: bool) -> CmdResult {
    let rows = ws.visible_rows();
    if json {
        let out: Vec<RowJson> = rows.iter().map(row_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !rows.is_empty() {
        println!("{}", format_rows(&rows));
    }
    Ok(())
}

async fn cmd_rows(ctx: &Context, args: RowsArgs) -> CmdResult {
    let mut ws = ctx.workspace(Arc::new(AutoConfirm(false))).await?;
    apply_view_args(&mut ws, &args)?;
    print_rows(&ws, ctx.json)
}

async fn cmd_board(ctx: &Context) -> CmdResult {
    let ws = ctx.workspace(Arc::new(AutoConfirm(false))).await?;
    let columns = ws.board();
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&columns)?);
    } else {
        println!("{}", format_board(&columns));
    }
    Ok(())
}

async fn cmd_check(ctx: &Context, args: CheckArgs) -> CmdResult {
    let ws = ctx.workspace(Arc::new(AutoConfirm(false))).await?;
    let id = TaskId::from(args.id.as_str());
    let node = find_node(ws.forest(), &id).ok_or_else(|| format!("task not found: {}", id))?;
    let blocking = blocking_children(node);

    if ctx.json {
        let out = CheckJson {
            id: id.clone(),
            can_complete: blocking.is_empty(),
            blocking: blocking.iter().map(|t| t.id.clone()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if blocking.is_empty() {
        println!("{} can be completed", id);
    } else {
        println!("{} has {} open subtask(s):", id, blocking.len());
        for task in blocking {
            println!("  {}", format_task_line(task));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

async fn cmd_state(ctx: &Context, args: StateArgs) -> CmdResult {
    let status = parse_status(&args.status)?;
    let mut ws = ctx.workspace(confirmer(args.yes)).await?;
    let id = TaskId::from(args.id.as_str());

    let outcome = match ws.transition(&id, status).await {
        Ok(outcome) => outcome,
        Err(WorkspaceError::Transition(e)) => {
            return Err(e.feedback().message.into());
        }
        Err(e) => return Err(e.into()),
    };

    let feedback = outcome.feedback();
    if let TransitionOutcome::Rejected { .. } = outcome {
        return Err(feedback.message.into());
    }
    report(&feedback);
    Ok(())
}

async fn cmd_bulk(ctx: &Context, args: BulkArgs) -> CmdResult {
    let status = parse_status(&args.status)?;
    let mut ws = ctx.workspace(confirmer(args.yes)).await?;

    for raw in &args.ids {
        let id = TaskId::from(raw.as_str());
        if ws.reconciler().task(&id).is_none() {
            return Err(format!("task not found: {}", id).into());
        }
        ws.selection.select(id);
    }

    let outcome = ws.bulk_transition(status).await;
    let feedback = outcome.feedback();
    match &outcome {
        BulkOutcome::Finished(summary) => {
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&bulk_to_json(summary))?);
            } else {
                for (id, err) in &summary.failures {
                    eprintln!("  {}: {}", id, err);
                }
                report(&feedback);
            }
            if summary.failure_count > 0 {
                return Err(format!("{} update(s) failed", summary.failure_count).into());
            }
            Ok(())
        }
        BulkOutcome::Blocked { blocking } => Err(format!(
            "{} ({})",
            feedback.message,
            blocking
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
        .into()),
        BulkOutcome::Busy => Err(feedback.message.into()),
    }
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

async fn cmd_watch(ctx: &Context, args: RowsArgs) -> CmdResult {
    let mut ws = ctx.workspace(Arc::new(AutoConfirm(false))).await?;
    apply_view_args(&mut ws, &args)?;

    let (tx, rx) = channel();
    let _watcher = SnapshotWatcher::start(ctx.store.path(), tx)?;
    let mut listener = UpdateListener::new(rx, ctx.store.clone());
    tracing::info!(file = %ctx.store.path().display(), "watching for changes");

    print_rows(&ws, ctx.json)?;
    while let Some(event) = listener.recv().await {
        match ws.handle_event(&mut listener, event).await {
            Ok(ReconcileOutcome::Rebuilt) => {
                if !ctx.json {
                    println!();
                }
                print_rows(&ws, ctx.json)?;
            }
            Ok(_) => {}
            // half-written or briefly missing file; the next change retries
            Err(e) => tracing::warn!(error = %e, "could not reload snapshot"),
        }
    }
    Ok(())
}
