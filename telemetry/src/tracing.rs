use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Guard ensuring the test subscriber is installed at most once per process.
///
/// Tests within one binary run on a shared process, so every test calls
/// [`init_test_tracing`] and only the first call installs the subscriber.
static TEST_TRACING: Once = Once::new();

/// Initializes the global tracing subscriber for a service process.
///
/// The filter is taken from `RUST_LOG` when set and defaults to `info`
/// otherwise. Panics if a global subscriber is already installed, which
/// indicates the service initialized telemetry twice.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(default_env_filter())
        .init();
}

/// Initializes tracing for tests, routing output through the test writer so
/// it is captured per test.
///
/// Safe to call from every test; only the first call has an effect.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(default_env_filter())
            .with_test_writer()
            .init();
    });
}

fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
