use tracing_subscriber::EnvFilter;

use crate::error::{Result, SetupError};

/// Installs the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| SetupError::Telemetry(err.to_string()))
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "mdm_user_setup=debug,warn"
    } else {
        "warn"
    }
}
