//! sbm-evaluate - run the matcher over a fixture of known albums
//!
//! Exits non-zero when any category's pass rate is below the threshold.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sbm_common::{logging, Settings};
use sbm_match::evaluation::{self, DEFAULT_THRESHOLD};
use sbm_match::{build_info, Pipeline};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sbm-evaluate")]
#[command(about = "Evaluate match accuracy against a fixture of expected releases")]
#[command(version, long_version = build_info::LONG_VERSION)]
struct Args {
    /// Fixture JSON: {category: [[label, spotify_id, release_group_id, release_id | [ids]]]}
    fixture: PathBuf,

    /// Minimum share of exact matches per category
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let settings =
        Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    logging::init_tracing(&settings.log_level).context("Failed to initialize logging")?;
    build_info::log_startup("sbm-evaluate");

    let fixture = evaluation::load_fixture(&args.fixture)
        .with_context(|| format!("Failed to load fixture {}", args.fixture.display()))?;

    let pipeline = Pipeline::from_settings(&settings)
        .await
        .context("Failed to initialize pipeline")?;

    let reports = evaluation::evaluate(&pipeline, &fixture).await;
    pipeline.shutdown();

    let mut passed = true;
    for report in &reports {
        let rate = report.pass_rate();
        if report.meets(args.threshold) {
            info!(category = %report.category, rate, "Category passed");
            continue;
        }

        passed = false;
        error!(
            category = %report.category,
            rate,
            threshold = args.threshold,
            "Pass rate below threshold"
        );
        println!("Failures in {}:", report.category);
        for failure in report.failures() {
            println!("{}", failure.format_failure());
        }
    }

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
