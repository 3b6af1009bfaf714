//! Build script for sbm-match
//!
//! Stamps the identification shown by `--version` and logged at startup:
//! - `SBM_GIT_HASH`: short commit hash, or `SBM_BUILD_GIT_HASH` when building
//!   from a source archive without `.git`
//! - `SBM_BUILD_TIMESTAMP`: UTC build time, pinned by `SOURCE_DATE_EPOCH`
//! - `SBM_BUILD_PROFILE`: cargo profile
//! - `SBM_LONG_VERSION`: all of the above in one line

use std::env;
use std::process::Command;

use chrono::{DateTime, SecondsFormat, Utc};

fn git_hash() -> String {
    if let Ok(hash) = env::var("SBM_BUILD_GIT_HASH") {
        if !hash.trim().is_empty() {
            return hash.trim().to_string();
        }
    }

    Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Reproducible builds set SOURCE_DATE_EPOCH; otherwise use the current time
fn build_time() -> DateTime<Utc> {
    env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

fn main() {
    println!("cargo:rerun-if-env-changed=SBM_BUILD_GIT_HASH");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-changed=../.git/HEAD");

    let hash = git_hash();
    let timestamp = build_time().to_rfc3339_opts(SecondsFormat::Secs, true);
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();

    println!("cargo:rustc-env=SBM_GIT_HASH={}", hash);
    println!("cargo:rustc-env=SBM_BUILD_TIMESTAMP={}", timestamp);
    println!("cargo:rustc-env=SBM_BUILD_PROFILE={}", profile);
    println!(
        "cargo:rustc-env=SBM_LONG_VERSION={} ({} {}, built {})",
        version, hash, profile, timestamp
    );
}
