// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! taskyou CLI (`ty`)
//!
//! Thin surface over the execution core: the long-running daemon, the
//! lifecycle hook entry point agents invoke, and a handful of user
//! commands that enqueue durable control messages for the daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod state;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::sync::Arc;
use ty_core::{HookEvent, SystemClock, TaskId};
use ty_engine::{ControlMsg, Deps, HookPayload, Mailbox, Supervisor};
use ty_storage::TaskStore;

#[derive(Parser)]
#[command(name = "ty", about = "Task runner for long-lived coding agents", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler daemon in the foreground
    Daemon,
    /// Lifecycle hook entry point (invoked by the agent, not by users)
    #[command(name = "claude-hook", hide = true)]
    ClaudeHook {
        /// Event name as the agent spells it (PreToolUse, Stop, ...)
        #[arg(long)]
        event: String,
    },
    /// Queue a task for execution
    Queue { id: TaskId },
    /// Interrupt a task (re-enters backlog; retry later to resume)
    Interrupt { id: TaskId },
    /// Retry a blocked task, optionally with feedback for the agent
    Retry {
        id: TaskId,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Print a task's log
    Logs {
        id: TaskId,
        /// Keep following new entries
        #[arg(long)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Daemon => run_daemon().await,
        Command::ClaudeHook { event } => run_hook(&event),
        Command::Queue { id } => push_control(ControlMsg::Queue { task_id: id }),
        Command::Interrupt { id } => push_control(ControlMsg::Interrupt { task_id: id }),
        Command::Retry { id, feedback } => push_control(ControlMsg::Retry {
            task_id: id,
            feedback,
        }),
        Command::Logs { id, follow } => run_logs(id, follow).await,
    }
}

async fn run_daemon() -> anyhow::Result<()> {
    init_logging();

    let state_dir = state::state_dir()?;
    let _lock = state::acquire_daemon_lock(&state_dir)?;

    let store = Arc::new(TaskStore::open(&state_dir).context("opening store")?);
    let host_binary = std::env::current_exe().context("resolving host binary")?;
    let deps = Deps::new(
        store,
        Arc::new(ty_adapters::TmuxMux::new()),
        Arc::new(SystemClock),
        state_dir.clone(),
        host_binary,
    );

    spawn_checkpoint(Arc::clone(&deps.store));

    let supervisor = Supervisor::new(deps);
    supervisor.start();
    tracing::info!(state_dir = %state_dir.display(), "daemon ready");

    tokio::signal::ctrl_c().await.context("signal handler")?;
    tracing::info!("shutting down");
    supervisor.stop();
    supervisor.deps.store.checkpoint().context("final checkpoint")?;
    Ok(())
}

/// Checkpoint cadence for snapshot + WAL truncation.
const CHECKPOINT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

fn spawn_checkpoint(store: Arc<TaskStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECKPOINT_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = store.checkpoint() {
                tracing::warn!(error = %e, "checkpoint failed");
            }
        }
    });
}

/// Hook invocation: the agent runs this in the worktree with
/// `WORKTREE_TASK_ID` set and the event payload on stdin.
fn run_hook(event: &str) -> anyhow::Result<()> {
    let event: HookEvent = event
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let task_id: TaskId = std::env::var("WORKTREE_TASK_ID")
        .context("WORKTREE_TASK_ID not set")?
        .parse()
        .context("WORKTREE_TASK_ID is not a task id")?;

    let mut raw = String::new();
    let _ = std::io::stdin().read_to_string(&mut raw);
    let payload: HookPayload = serde_json::from_str(&raw).unwrap_or_default();

    push_control(ControlMsg::Hook {
        event,
        task_id,
        payload,
    })
}

fn push_control(msg: ControlMsg) -> anyhow::Result<()> {
    let state_dir = state::state_dir()?;
    Mailbox::new(&state_dir)
        .push(&msg)
        .context("writing control message")?;
    Ok(())
}

async fn run_logs(id: TaskId, follow: bool) -> anyhow::Result<()> {
    let state_dir = state::state_dir()?;
    let mut last_seen = 0;

    loop {
        let store = TaskStore::open_read_only(&state_dir);
        if store.get_task(id).is_none() {
            bail!("task {} not found", id);
        }
        for entry in store.logs_after(id, last_seen) {
            println!(
                "{} [{}] {}",
                entry.created_at.format("%H:%M:%S"),
                entry.line_type,
                entry.content
            );
            last_seen = entry.id;
        }
        if !follow {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
