pub mod core;

use tracing_subscriber::EnvFilter;

/// Install the structured logger. `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,launch_profile=debug")),
        )
        .try_init();
}
