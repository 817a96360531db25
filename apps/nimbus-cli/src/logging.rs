//! Tracing subscriber setup for the demo binary: `EnvFilter`-driven
//! `tracing_subscriber::fmt` initialization. No OpenTelemetry export here;
//! the real service's telemetry pipeline is outside this crate's scope.

use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt as _};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Full,
    Compact,
    Pretty,
}

/// Initializes the global subscriber. Idempotent to a second call within
/// the same process: returns quietly instead of panicking.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match format {
        LogFormat::Full => subscriber.finish().try_init(),
        LogFormat::Compact => subscriber.compact().finish().try_init(),
        LogFormat::Pretty => subscriber.pretty().finish().try_init(),
    };
    drop(result);
}
