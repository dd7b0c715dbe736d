//! Tracing subscriber setup.
//!
//! `RUST_LOG` overrides the default `info` filter.

use tracing_subscriber::{fmt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let builder = fmt().with_env_filter(env_filter()).with_target(true);

    match format {
        LogFormat::Text => builder.with_thread_ids(true).try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}
