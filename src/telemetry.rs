//! Tracing initialization for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber` formatter driven by `RUST_LOG`
/// (defaulting to `info`). Intended for `src/bin` entrypoints; call
/// once at process start.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Same as [`init`] but never panics and is safe to call from every
/// test that wants tracing output — repeated calls across tests in the
/// same process are idempotent because `try_init` ignores the "already
/// set" error.
pub fn try_init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}
