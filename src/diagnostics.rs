//! Warning and error message helpers, backed by `tracing`.

use tracing_subscriber::EnvFilter;

/// Message used for `anyhow` context at file and input boundaries.
pub fn error_message(msg: impl Into<String>) -> String {
    let msg = msg.into();
    tracing::debug!(%msg, "error");
    msg
}

/// Non-fatal problem with the input; processing continues.
pub fn warn(msg: impl AsRef<str>) {
    tracing::warn!("{}", msg.as_ref());
}

/// Install the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let fallback = if verbose { "graphanim=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
