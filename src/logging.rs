//! Diagnostic logging setup.
//!
//! Events go to stderr so stdout stays parseable for `--format json`.
//! `GB_LOG` takes a standard `EnvFilter` directive
//! (`GB_LOG=groundbench_core=debug,groundbench=info`); without it the level
//! comes from the `-v` count.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "GB_LOG";

static INIT: Once = Once::new();

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(verbosity: u8) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity > 1),
            )
            .with(filter)
            .try_init();
    });
}
