//! Groundlink station entry point.
//!
//! Usage: `groundlink-station [CONFIG]`

mod app;
mod config;

use std::future::Future;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// How long the runtime waits for blocking work once the station has stopped.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays free for the store output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting groundlink station"
    );

    let path = config::config_path(std::env::args().nth(1));
    let config = config::StationConfig::load(&path)?;
    tracing::info!(name = %config.name, path = %path.display(), "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    run_to_completion(rt, app::run(config))?;

    tracing::info!("station shut down cleanly");
    Ok(())
}

/// Drives `fut` to completion, then shuts the runtime down without waiting
/// indefinitely on the blocking pool.
///
/// Stdin and device reads run as blocking pool jobs that cannot be
/// cancelled; an idle feed would otherwise keep the process alive after
/// every task has stopped.
fn run_to_completion<F: Future>(rt: tokio::runtime::Runtime, fut: F) -> F::Output {
    let output = rt.block_on(fut);
    rt.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    output
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn idle_blocking_read_does_not_hold_shutdown() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let started = Instant::now();

        let output = run_to_completion(rt, async {
            // Stands in for a stdin read on a feed that never sends.
            tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(3600)));
            42
        });

        assert_eq!(output, 42);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
