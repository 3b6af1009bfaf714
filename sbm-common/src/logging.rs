//! Tracing subscriber setup shared by the sbm binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose log level follows the configured level when `RUST_LOG` is unset
const SBM_CRATES: [&str; 2] = ["sbm_common", "sbm_match"];

/// Build the default filter directive for `level`
///
/// Third-party crates stay at `warn` so request logging from reqwest/hyper
/// does not drown out the matcher's own output.
pub fn default_directive(level: &str) -> String {
    let mut directive = String::from("warn");
    for krate in SBM_CRATES {
        directive.push_str(&format!(",{}={}", krate, level));
    }
    directive
}

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` takes priority over the configured level. Output goes to stderr
/// so stdout stays free for the JSON result.
pub fn init_tracing(level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .map_err(|e| crate::Error::Config(format!("Invalid log level '{}': {}", level, e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Failed to install tracing subscriber: {}", e)))
}
