use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Environment variable holding the log filter, e.g. `KORE_LOG=kore=debug`.
pub const LOG_ENV: &str = "KORE_LOG";

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times. The filter comes
/// from `KORE_LOG`, falling back to `RUST_LOG`; with neither set nothing is
/// installed and evaluation stays silent.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = match EnvFilter::try_from_env(LOG_ENV) {
            Ok(filter) => filter,
            Err(_) if std::env::var("RUST_LOG").is_ok() => EnvFilter::from_default_env(),
            Err(_) => return,
        };
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}
