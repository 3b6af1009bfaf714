//! Build identification stamped by `build.rs`

use tracing::info;

pub const GIT_HASH: &str = env!("SBM_GIT_HASH");
pub const BUILD_TIMESTAMP: &str = env!("SBM_BUILD_TIMESTAMP");
pub const BUILD_PROFILE: &str = env!("SBM_BUILD_PROFILE");

/// `--version` text of both binaries
pub const LONG_VERSION: &str = env!("SBM_LONG_VERSION");

/// Log the startup line of a binary
pub fn log_startup(binary: &str) {
    info!(
        binary,
        version = env!("CARGO_PKG_VERSION"),
        git_hash = GIT_HASH,
        built = BUILD_TIMESTAMP,
        profile = BUILD_PROFILE,
        "Starting"
    );
}
