//! Concord demo binary.
//!
//! Spawns several sessions in one room. Each session bumps its own counter
//! and the shared `last_writer` key on every pass, restarts whenever another
//! session pushes, and the converged room state is logged at the end.
//!
//! # Usage
//!
//! ```bash
//! # Three sessions, in memory
//! concord-demo --sessions 3 --room lobby
//!
//! # Persist rooms across runs
//! concord-demo --store-dir ./rooms --log-level debug
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use concord_core::{SessionAdapter, Value};
use concord_session::{
    HubConfig, LocalSession, PassOutcome, Rooms, RoomsConfig, SessionError, SystemEnv,
};
use tokio::task::JoinSet;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Concord room synchronization demo
#[derive(Parser, Debug)]
#[command(name = "concord-demo")]
#[command(about = "Run concurrent sessions against a shared room")]
#[command(version)]
struct Args {
    /// Number of concurrent sessions
    #[arg(short, long, default_value = "3")]
    sessions: usize,

    /// Room all sessions enter
    #[arg(short, long, default_value = "lobby")]
    room: String,

    /// Completed passes per session
    #[arg(short, long, default_value = "20")]
    passes: usize,

    /// Idle time between passes, in milliseconds
    #[arg(long, default_value = "10")]
    interval_ms: u64,

    /// Directory for persisted rooms
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Per-session counters reported at the end.
#[derive(Debug, Default)]
struct SessionReport {
    completed: usize,
    restarts: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Concord demo starting");
    tracing::info!("{} sessions in room {:?}", args.sessions, args.room);

    let config = RoomsConfig { hub: HubConfig::default(), store_dir: args.store_dir };
    let rooms = Arc::new(Rooms::new(SystemEnv::new(), config)?);
    let interval = Duration::from_millis(args.interval_ms);

    let mut tasks = JoinSet::new();
    for index in 0..args.sessions {
        let rooms = Arc::clone(&rooms);
        let room = args.room.clone();
        let passes = args.passes;
        tasks.spawn(async move { run_session(&rooms, &room, index, passes, interval).await });
    }

    while let Some(joined) = tasks.join_next().await {
        let report = joined??;
        tracing::debug!(?report, "session task joined");
    }

    let snapshot = rooms.room_snapshot(&args.room);
    tracing::info!(
        room = %snapshot.name,
        last_updated = %snapshot.last_updated,
        status = %rooms.room_status(&args.room),
        "converged"
    );
    for (key, value) in &snapshot.state {
        tracing::info!("  {} = {:?}", key, value);
    }
    tracing::info!("known rooms: {:?}", rooms.list_known_rooms());

    Ok(())
}

async fn run_session(
    rooms: &Rooms<SystemEnv>,
    room: &str,
    index: usize,
    passes: usize,
    interval: Duration,
) -> Result<SessionReport, SessionError> {
    let mut session = rooms.connect();
    rooms.enter(&mut session, room)?;
    let counter_key = format!("passes_{index}");
    let mut report = SessionReport::default();

    while report.completed < passes {
        let outcome = rooms.run_pass(&mut session, |s| {
            let count = read_int(s, &counter_key) + 1;
            s.set(counter_key.clone(), count);
            s.set("last_writer", Value::from(index as u64));
            count
        })?;

        match outcome {
            PassOutcome::Restart => {
                report.restarts += 1;
                continue;
            },
            PassOutcome::Completed { output, .. } => {
                report.completed += 1;
                tracing::debug!(session = %session.id(), count = output, "pass completed");
            },
        }

        tokio::select! {
            _ = session.restart_requested() => {},
            () = tokio::time::sleep(interval) => {},
        }
    }

    // Settle: pull whatever the other sessions pushed last.
    while rooms.sync_now(&mut session)?.requires_restart() {}
    session.take_restart_request();

    tracing::info!(
        session = %session.id(),
        completed = report.completed,
        restarts = report.restarts,
        marker = %session.last_synced(),
        "session finished"
    );
    Ok(report)
}

fn read_int(session: &LocalSession, key: &str) -> i64 {
    session
        .get(key)
        .and_then(Value::as_integer)
        .and_then(|n| i64::try_from(n).ok())
        .unwrap_or(0)
}
