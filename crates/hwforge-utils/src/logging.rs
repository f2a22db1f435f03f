//! Logging and observability setup for hwforge
//!
//! Structured logging with `tracing`; the CLI installs a subscriber once and
//! library crates only emit events and spans.

use tracing::{Level, span};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the filter is `hwforge=debug,info` in
/// verbose mode and `hwforge=info,warn` in normal mode. With `json` the
/// output is newline-delimited JSON, which keeps stdout free for events.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("hwforge=debug,info")
            } else {
                EnvFilter::try_new("hwforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbose)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Create a span for a single graph node execution.
pub fn node_span(project_id: &str, node: &str, stage: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "node",
        project_id = %project_id,
        node = %node,
        stage = %stage,
    )
}

/// Create a span covering a whole orchestrator run.
pub fn run_span(project_id: &str, mode: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "run",
        project_id = %project_id,
        mode = %mode,
    )
}
