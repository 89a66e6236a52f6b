//! `aura` – feedback aggregation service.
//!
//! 1. Resolves configuration from `~/.aura/config.toml` (or `--config`),
//!    `AURA_*` environment variables and command-line flags.
//! 2. Restores the knowledge base from its snapshot artifact.
//! 3. Serves WebSocket clients while checkpointing on a fixed interval.
//! 4. On Ctrl-C / SIGTERM stops accepting, writes one final checkpoint
//!    (bounded by the configured grace period) and exits.
//!
//! `aura simulate` and `aura show` work on a snapshot file without starting
//! the server.

mod config;
mod simulate;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use aura_memory::{KnowledgeStore, SnapshotFile};
use aura_runtime::{CheckpointScheduler, init_tracing};
use aura_server::FeedbackServer;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "aura")]
#[command(about = "Real-time feedback aggregation service", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (default: ~/.aura/config.toml)
    #[arg(long, global = true, env = "AURA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the WebSocket server (default when no command given)
    Serve(ServeArgs),
    /// Apply random feedback to a knowledge base and print the result
    Simulate {
        /// Number of feedback events to generate
        #[arg(short, long, default_value_t = 10)]
        events: usize,
        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Snapshot to start from and write back to
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
    /// Print the contents of a snapshot artifact
    Show {
        /// Snapshot to read (default: the configured snapshot path)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// WebSocket listen port
    #[arg(short, long)]
    port: Option<u16>,
    /// Snapshot artifact path
    #[arg(short, long)]
    snapshot: Option<PathBuf>,
    /// Seconds between checkpoints
    #[arg(short, long)]
    interval: Option<u64>,
}

impl ServeArgs {
    fn apply(self, cfg: &mut Config) {
        if let Some(port) = self.port {
            cfg.listen_port = port;
        }
        if let Some(path) = self.snapshot {
            cfg.snapshot_path = path;
        }
        if let Some(secs) = self.interval {
            cfg.checkpoint_interval_secs = secs;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing("aura");
    let mut cfg = config::resolve(cli.config.as_deref());

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => {
            args.apply(&mut cfg);
            let grace = cfg.shutdown_grace();
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            block_on_bounded(rt, serve(cfg), grace)
        }
        Commands::Simulate { events, seed, snapshot } => {
            run_simulation(events, seed, snapshot.as_deref())
        }
        Commands::Show { snapshot } => {
            show(&snapshot.unwrap_or(cfg.snapshot_path))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// serve
// ─────────────────────────────────────────────────────────────────────────────

/// Drive `fut` to completion on `rt`, then shut the runtime down waiting at
/// most `grace` for leftover tasks. A blocking write still stuck after a
/// timed-out flush is abandoned instead of holding the process open.
fn block_on_bounded<F: Future>(rt: tokio::runtime::Runtime, fut: F, grace: Duration) -> F::Output {
    let output = rt.block_on(fut);
    rt.shutdown_timeout(grace);
    output
}

async fn serve(cfg: Config) -> Result<()> {
    info!(?cfg, "starting aura");

    let store = Arc::new(KnowledgeStore::new());
    let scheduler = CheckpointScheduler::new(
        Arc::clone(&store),
        SnapshotFile::new(&cfg.snapshot_path),
        cfg.checkpoint_interval(),
    );
    scheduler.restore_on_startup();

    let bound = FeedbackServer::new(Arc::clone(&store))
        .with_port(cfg.listen_port)
        .bind()
        .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let checkpoints = scheduler.spawn(shutdown_rx.clone());
    let server = tokio::spawn(bound.serve(shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    let grace = cfg.shutdown_grace();
    if tokio::time::timeout(grace, server).await.is_err() {
        warn!("server did not stop within the grace period");
    }
    match tokio::time::timeout(grace, checkpoints).await {
        Ok(Ok(())) => info!(actions = store.len(), "shutdown complete"),
        Ok(Err(e)) => error!(error = %e, "checkpoint task failed during shutdown"),
        Err(_) => error!(
            grace_secs = grace.as_secs(),
            "final checkpoint timed out; exiting without it"
        ),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

// ─────────────────────────────────────────────────────────────────────────────
// simulate / show
// ─────────────────────────────────────────────────────────────────────────────

fn load_store(path: &Path) -> Result<KnowledgeStore> {
    let store = KnowledgeStore::new();
    if let Some(value) = SnapshotFile::new(path).load()? {
        store.restore(&value)?;
    }
    Ok(store)
}

fn run_simulation(events: usize, seed: Option<u64>, snapshot: Option<&Path>) -> Result<()> {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    let store = match snapshot {
        Some(path) => load_store(path)?,
        None => KnowledgeStore::new(),
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let applied = simulate::run(&store, events, &mut rng);
    println!();
    println!("{}", format!("Final knowledge base ({applied} events):").bold().cyan());
    print!("{}", simulate::render_table(&store.snapshot()));

    if let Some(path) = snapshot {
        SnapshotFile::new(path).write(&store.snapshot())?;
        println!("  {} Snapshot written to {}", "✓".green().bold(), path.display());
    }
    Ok(())
}

fn show(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("{} {}", "No snapshot at".yellow(), path.display());
        return Ok(());
    }
    let store = load_store(path).with_context(|| format!("reading {}", path.display()))?;
    println!("{}", format!("{} ({} actions)", path.display(), store.len()).bold().cyan());
    print!("{}", simulate::render_table(&store.snapshot()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[cfg(unix)]
    #[test]
    fn stalled_final_checkpoint_does_not_hold_the_runtime_open() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("knowledge.json");
        let staging = dir.path().join("knowledge.json.tmp");
        // Opening a FIFO for writing blocks until a reader shows up.
        let status = std::process::Command::new("mkfifo")
            .arg(&staging)
            .status()
            .expect("run mkfifo");
        assert!(status.success());

        let grace = Duration::from_millis(300);
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .expect("runtime");
            let flush_timed_out = block_on_bounded(
                rt,
                async move {
                    let store = Arc::new(KnowledgeStore::new());
                    let scheduler = CheckpointScheduler::new(
                        store,
                        SnapshotFile::new(path),
                        aura_runtime::DEFAULT_INTERVAL,
                    );
                    let (tx, rx) = watch::channel(false);
                    let handle = scheduler.spawn(rx);
                    tx.send(true).expect("send shutdown");
                    tokio::time::timeout(grace, handle).await.is_err()
                },
                grace,
            );
            let _ = done_tx.send(flush_timed_out);
        });

        let flush_timed_out = done_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("runtime shut down within the grace bound");
        assert!(flush_timed_out);

        // Release the writer still parked on the FIFO.
        thread::spawn(move || {
            let _ = std::fs::File::open(&staging);
        });
    }

    #[test]
    fn block_on_bounded_returns_the_future_output() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        assert_eq!(block_on_bounded(rt, async { 7 }, Duration::from_secs(1)), 7);
    }
}
