use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docview_validate::cli::{Cli, OutputFormat, VerbosityLevel};
use docview_validate::config::ConfigManager;
use docview_validate::engine::{ProgressCallback, ValidationEngine, ValidationPhase};
use docview_validate::output::Output;
use docview_validate::validators::builtin_registry;

const EXIT_ERRORS_FOUND: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    cli.validate().map_err(anyhow::Error::msg)?;

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;

    let verbosity = if cli.verbosity() == VerbosityLevel::Debug {
        VerbosityLevel::Debug
    } else {
        config.verbosity()
    };
    init_tracing(verbosity);
    debug!(?config, "configuration loaded");

    let registry =
        builtin_registry(&config.validators).context("Failed to register validators")?;
    let reader = config
        .package_reader()
        .context("Invalid include/exclude patterns")?;
    let engine = ValidationEngine::new(registry, reader, config.engine_config());

    let progress = config.validation.show_progress.then(progress_reporter);
    let report = engine
        .validate_package_with_progress(&cli.path, progress)
        .await
        .with_context(|| format!("Failed to validate package {}", cli.path.display()))?;

    let format: OutputFormat = config.output.format.into();
    let rendered = Output::new(verbosity, format)
        .format_report(&report)
        .context("Failed to render report")?;
    print!("{}", rendered);
    std::io::stdout().flush().context("Failed to write report")?;

    Ok(if report.has_errors() {
        ExitCode::from(EXIT_ERRORS_FOUND)
    } else {
        ExitCode::SUCCESS
    })
}

/// Logs go to stderr so stdout carries only the report. `RUST_LOG` overrides the level.
fn init_tracing(verbosity: VerbosityLevel) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| verbosity.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn progress_reporter() -> ProgressCallback {
    Arc::new(|progress| match progress.phase {
        ValidationPhase::Discovery => eprintln!("Discovering files..."),
        ValidationPhase::Validation => {
            let file = progress
                .current_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            eprintln!("[{}/{}] {}", progress.completed, progress.total, file);
        }
        ValidationPhase::Aggregation => eprintln!("Aggregating results..."),
        ValidationPhase::Complete => {}
    })
}
