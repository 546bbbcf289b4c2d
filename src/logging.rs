use std::sync::Once;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{Directive, LevelFilter};

static INIT: Once = Once::new();

/// Installs the global fmt subscriber; later calls are no-ops.
///
/// `RUST_LOG` directives are honoured; `verbosity` raises this crate's level
/// (0 info, 1 debug, 2+ trace).
pub fn init(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let directive: Directive = format!("agent_state={level}")
        .parse()
        .context("invalid log directive")?;
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy()
        .add_directive(directive);

    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
    Ok(())
}
