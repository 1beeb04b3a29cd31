//! Tracing subscriber setup
//!
//! Verbosity: 0 = warn, 1 = info, 2+ = debug. `RUST_LOG` overrides the
//! computed filter when it is set.

use crate::config::schema::GeneralConfig;
use tracing_subscriber::EnvFilter;

fn filter_for(general: &GeneralConfig, verbosity: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = match (verbosity, general.verbose) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        _ => "debug",
    };
    EnvFilter::new(format!("relentless={level}"))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed.
pub fn init(general: &GeneralConfig, verbosity: u8) -> bool {
    let filter = filter_for(general, verbosity);

    let installed = if general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .try_init()
    };

    installed.is_ok()
}
