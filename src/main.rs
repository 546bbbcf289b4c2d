//! Binary entrypoint for agent-state.
//!
//! Reads lifecycle events from stdin, one kebab-case name per line, and keeps
//! the state file in sync until stdin closes or the process is signalled.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use agent_state::config::Configuration;
use agent_state::events::LifecycleEvent;
use agent_state::listener::AgentStateListener;
use agent_state::logging;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "agent-state",
    version,
    about = "Publish the lifecycle state of a build agent to a file"
)]
struct Cli {
    /// Path to YAML config file. Built-in defaults apply when omitted.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override the directory holding the state file.
    #[arg(long, value_name = "DIR", global = true)]
    state_dir: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Publish the status matching each lifecycle event read from stdin.
    Run,
    /// Print the configured statuses and their serialized values.
    Statuses,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.verbose) {
        eprintln!("agent-state: {err:#}");
        std::process::exit(2);
    }
    if let Err(err) = try_main(cli).await {
        error!(error = ?err, "agent-state exited with error");
        std::process::exit(1);
    }
}

async fn try_main(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Commands::Run => run(config).await,
        Commands::Statuses => {
            for status in config.statuses.iter() {
                println!("{}\t{}", status.name(), status.value());
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Configuration> {
    let mut config = match &cli.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(dir) = &cli.state_dir {
        config.state_dir = dir.clone();
    }
    config.validated().context("validating configuration")
}

async fn run(config: Configuration) -> Result<()> {
    let listener =
        Arc::new(AgentStateListener::start(config).context("starting state publisher")?);
    info!(
        path = %listener.config().target_path().display(),
        "publishing agent state"
    );
    listener.on_start().context("publishing agent start")?;

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;
    let (line_tx, mut lines) = mpsc::channel::<String>(16);
    spawn_stdin_reader(line_tx)?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM; shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT; shutting down");
                break;
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("stdin closed; shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<LifecycleEvent>() {
                    Ok(LifecycleEvent::AgentShutdown) => {
                        info!("agent shutdown event received");
                        break;
                    }
                    Ok(event) => listener.handle(event)?,
                    Err(err) => warn!(error = %err, "ignoring input line"),
                }
            }
        }
    }

    let mut flushed = spawn_flush(Arc::clone(&listener))?;
    let interrupted = async {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM while flushing"),
            _ = sigint.recv() => info!("received SIGINT while flushing"),
        }
    };
    match wait_for_flush(&mut flushed, interrupted).await? {
        StopOutcome::Flushed => info!("agent state flushed"),
        StopOutcome::Interrupted => warn!(
            path = %listener.config().target_path().display(),
            "exiting before the agent state was flushed"
        ),
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopOutcome {
    Flushed,
    Interrupted,
}

/// Runs `on_stop` on a plain thread. The runtime never waits for it, so an
/// unwritable target cannot keep the process alive past `main`.
fn spawn_flush(listener: Arc<AgentStateListener>) -> Result<oneshot::Receiver<()>> {
    let (done_tx, done_rx) = oneshot::channel();
    thread::Builder::new()
        .name("agent-state-flush".to_string())
        .spawn(move || {
            listener.on_stop();
            let _ = done_tx.send(());
        })
        .context("failed to spawn state flush thread")?;
    Ok(done_rx)
}

/// Waits for the final flush unless `interrupted` resolves first.
async fn wait_for_flush<F>(
    flushed: &mut oneshot::Receiver<()>,
    interrupted: F,
) -> Result<StopOutcome>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        done = flushed => {
            done.context("state flush thread exited without finishing")?;
            Ok(StopOutcome::Flushed)
        }
        () = interrupted => Ok(StopOutcome::Interrupted),
    }
}

/// Forwards stdin lines on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<String>) -> Result<()> {
    thread::Builder::new()
        .name("stdin-events".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = ?err, "failed reading lifecycle events from stdin");
                        break;
                    }
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{StopOutcome, spawn_flush, wait_for_flush};
    use agent_state::config::Configuration;
    use agent_state::listener::AgentStateListener;
    use std::fs;
    use std::future;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn completed_flush_is_reported() {
        let (done_tx, mut done_rx) = oneshot::channel();
        done_tx.send(()).expect("receiver alive");

        let outcome = wait_for_flush(&mut done_rx, future::pending())
            .await
            .expect("flush");
        assert_eq!(outcome, StopOutcome::Flushed);
    }

    #[tokio::test]
    async fn flush_thread_dying_is_an_error() {
        let (done_tx, mut done_rx) = oneshot::channel::<()>();
        drop(done_tx);

        assert!(wait_for_flush(&mut done_rx, future::pending()).await.is_err());
    }

    #[tokio::test]
    async fn second_signal_abandons_a_stuck_flush() {
        let tmp = tempdir().expect("tempdir");
        let state_dir = tmp.path().join("agent-state");
        // a plain file where the state directory belongs keeps every write failing
        fs::write(&state_dir, "blocker").expect("blocker");
        let config = Configuration {
            state_dir: state_dir.clone(),
            retry_interval: Duration::from_millis(5),
            ..Configuration::default()
        };
        let path = config.target_path();
        let listener = Arc::new(AgentStateListener::start(config).expect("listener"));

        let mut flushed = spawn_flush(Arc::clone(&listener)).expect("flush thread");
        let outcome = wait_for_flush(&mut flushed, future::ready(()))
            .await
            .expect("wait");
        assert_eq!(outcome, StopOutcome::Interrupted);
        assert!(listener.publisher().is_running());

        // the abandoned flush still lands once the target is writable
        fs::remove_file(&state_dir).expect("remove blocker");
        let outcome = wait_for_flush(&mut flushed, future::pending())
            .await
            .expect("flush");
        assert_eq!(outcome, StopOutcome::Flushed);
        assert!(!listener.publisher().is_running());
        assert_eq!(fs::read_to_string(path).expect("state"), "0|shutdown");
    }

    #[tokio::test]
    async fn writable_target_flushes_shutdown_status() {
        let tmp = tempdir().expect("tempdir");
        let config = Configuration {
            state_dir: tmp.path().to_path_buf(),
            ..Configuration::default()
        };
        let path = config.target_path();
        let listener = Arc::new(AgentStateListener::start(config).expect("listener"));

        let mut flushed = spawn_flush(listener).expect("flush thread");
        let outcome = wait_for_flush(&mut flushed, future::pending())
            .await
            .expect("flush");
        assert_eq!(outcome, StopOutcome::Flushed);
        assert_eq!(fs::read_to_string(path).expect("state"), "0|shutdown");
    }
}
