//! # sbm common library
//!
//! Shared code for the sbm matching tools:
//! - Error type and `Result` alias
//! - Settings resolution (environment → TOML → defaults)
//! - Tracing subscriber initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use config::Settings;
pub use error::{Error, Result};
