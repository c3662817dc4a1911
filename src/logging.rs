//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout stays free for command output. The filter
//! honors `RUST_LOG` and defaults to `adaptok=info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::PipelineResult;

pub const DEFAULT_FILTER: &str = "adaptok=info";

/// Install the global subscriber, as JSON lines when `json` is set.
///
/// Returns `Ok(false)` without changing anything when a global subscriber
/// is already installed.
pub fn init_tracing(json: bool) -> PipelineResult<bool> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    Ok(installed.is_ok())
}
