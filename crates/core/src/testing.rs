//! Test-only logging bootstrap. Mirrors the convention the rest of this
//! workspace uses: the library never installs a subscriber itself, only
//! test code and binaries do.

use once_cell::sync::Lazy;

static TRACING: Lazy<()> = Lazy::new(|| {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
});

/// Installs a `tracing_subscriber` writing to the test harness's captured
/// stdout, once per process. Safe to call from every test; subsequent calls
/// are no-ops.
pub fn setup_test_logging() {
	Lazy::force(&TRACING);
}
