//! Miscellaneous test helpers.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for a test binary.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Filter with `RUST_LOG`, e.g. `RUST_LOG=inquest_core=debug`.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
