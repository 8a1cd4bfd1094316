//! Tracing subscriber setup for the pipeline.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes structured logging for the process.
///
/// The filter comes from `RUST_LOG` when set. `log` macro calls from
/// this crate and its dependencies are bridged into tracing, so both
/// facades end up in the same output. Safe to call once per process;
/// later calls are ignored.
pub fn init(json_format: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,cvsift=debug"));

    if tracing_log::LogTracer::init().is_err() {
        // Already initialized, nothing to do
        return;
    }

    if json_format {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init();
    }
}
