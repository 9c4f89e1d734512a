//! Tracing subscriber setup for the command line tools.
//!
//! Logs go to stderr so that stdout stays free for JSON and CSV output.
//!
//! ```no_run
//! use haybench_analysis::telemetry;
//!
//! fn main() {
//!     // RUST_LOG=haybench_analysis=debug overrides the default directive
//!     telemetry::init_subscriber_with_env_filter("info");
//!     tracing::info!("Application started");
//! }
//! ```

use tracing_subscriber::{fmt, EnvFilter};

/// Build the env filter, honoring `RUST_LOG` and falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a stderr subscriber filtered by `RUST_LOG` or `default_directive`.
///
/// Call once at application startup, not from library code. A second call
/// leaves the first subscriber in place.
pub fn init_subscriber_with_env_filter(default_directive: &str) {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter(default_directive))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
