//! `tracing` subscriber setup.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (from config) is used.
pub fn init(default_level: &str) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter(default_level))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
