//! Takeout Downloader - CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use takeout_downloader::{
    auth::CurlFileProvider,
    cli::Args,
    config::{validate_config, Config},
    download::{HaltReason, HttpFetcher, RunPlan, Sequencer},
    error::{exit_codes, Error, Result},
    output::{print_banner, print_config_summary, print_error, print_info, print_run_summary, print_warning},
    progress::ProgressStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            let code = match e {
                Error::Config(_)
                | Error::ConfigValidation { .. }
                | Error::MissingConfig(_)
                | Error::InvalidRange { .. } => exit_codes::CONFIG_ERROR,
                Error::Capture(_) | Error::RefreshFailed(_) => exit_codes::AUTH_ERROR,
                Error::Download(_) | Error::Halted(_) | Error::Http(_) => {
                    exit_codes::DOWNLOAD_ERROR
                }
                _ => exit_codes::UNEXPECTED_ERROR,
            };
            ExitCode::from(code as u8)
        }
    }
}

async fn run() -> Result<i32> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    // Print banner
    print_banner();

    // Load configuration
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        print_warning(&format!(
            "Configuration file not found: {}",
            args.config.display()
        ));
        print_info("Using default configuration with CLI arguments");
        Config::default()
    };

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    // Validate configuration
    validate_config(&config)?;

    let (start, end) = args.index_range(config.export.total_expected_files);
    let output_dir = config.output_directory();

    print_config_summary(
        start,
        end,
        &output_dir.display().to_string(),
        config.options.delay_seconds,
    );

    if args.continue_run {
        print_info("Continuing from the last completed index");
    }

    // Wire up the engine
    let fetcher = HttpFetcher::new(&config)?;
    let provider = CurlFileProvider::new(
        config.auth.curl_file.clone(),
        config.auth.refresh_command.clone(),
    );
    let store = ProgressStore::in_directory(&output_dir);

    let plan = RunPlan {
        start,
        end,
        resume: args.continue_run,
    };
    let sequencer = Sequencer::new(config, fetcher, Box::new(provider), store);

    let summary = sequencer.run(plan).await?;
    print_run_summary(&summary);

    // A completed range is a success even when individual indices failed
    // and were recorded; only a halt is a run failure.
    match &summary.halted {
        None => Ok(exit_codes::SUCCESS),
        Some(HaltReason::AuthExpired { .. }) => Ok(exit_codes::AUTH_ERROR),
        Some(HaltReason::Fatal { .. }) => Ok(exit_codes::DOWNLOAD_ERROR),
    }
}
