//! sbm-match - resolve one Spotify album to a MusicBrainz release
//!
//! Prints the match result as JSON on stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use sbm_common::{logging, Settings};
use sbm_match::{build_info, Pipeline};

/// Command-line arguments for sbm-match
#[derive(Parser, Debug)]
#[command(name = "sbm-match")]
#[command(about = "Resolve a Spotify album to its MusicBrainz release")]
#[command(version, long_version = build_info::LONG_VERSION)]
struct Args {
    /// Spotify album id
    album_id: String,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if is_informational(&e) => e.exit(),
        Err(e) => {
            e.print().ok();
            std::process::exit(1);
        }
    };

    let settings =
        Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    logging::init_tracing(&settings.log_level).context("Failed to initialize logging")?;

    build_info::log_startup("sbm-match");

    let pipeline = Pipeline::from_settings(&settings)
        .await
        .context("Failed to initialize pipeline")?;

    let outcome = pipeline.match_album(&args.album_id).await;
    pipeline.shutdown();

    let result = outcome.with_context(|| format!("Failed to match album {}", args.album_id))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to serialize result")?
    );

    Ok(())
}

/// Help and version requests exit 0; every other parse error is a usage error
fn is_informational(e: &clap::Error) -> bool {
    matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}
