use std::io;

use tracing_subscriber::EnvFilter;

/// Diagnostics go to stderr so stdout stays a clean log stream. `-v` raises
/// the default level; `RUST_LOG` overrides it entirely.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kulo={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}
