//! Tracing setup shared by the library's front ends.
//!
//! Output goes to stderr so command output on stdout stays parseable.
//! `RUST_LOG` always wins over the level a front end asks for.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the subscriber at `info`
pub fn init() {
    init_with_level("info")
}

fn filter_for(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the subscriber with `default_level` (e.g. `warn` for the CLI).
///
/// Only the first call in a process installs anything.
pub fn init_with_level(default_level: &str) {
    let installed = tracing_subscriber::registry()
        .with(filter_for(default_level))
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialised (default level {})", default_level);
    }
}

/// Route logs through the test harness's captured output
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
