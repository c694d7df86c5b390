//! Log output setup for the `butterfly-ebg` binary.
//!
//! Filtering follows `RUST_LOG` and defaults to `info`. Log lines go to
//! stderr so the step summaries on stdout stay readable.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber, as JSON lines when `json` is set.
/// Calling it twice keeps the first subscriber.
pub fn initialize_tracer(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "tracer already installed");
    }
}
