//! IPMI Exporter Operator - lifecycle hook entry point for the Prometheus IPMI exporter.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ipmi_exporter_operator::agent::{FileEndpointPublisher, JsonStatusReporter, StatusReporter};
use ipmi_exporter_operator::audit::AuditLogger;
use ipmi_exporter_operator::config::{ExporterOptions, Settings, DEFAULT_CONFIG_PATH};
use ipmi_exporter_operator::error::{OperatorError, OperatorResult};
use ipmi_exporter_operator::host::SystemHost;
use ipmi_exporter_operator::lifecycle::{LifecycleController, LifecycleEvent};
use ipmi_exporter_operator::templates::TemplateEngine;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

/// Handle one lifecycle event for the Prometheus IPMI exporter.
///
/// Status updates are printed to stdout as JSON lines; logs go to stderr.
#[derive(Debug, Parser)]
#[command(name = "ipmi-exporter-operator", version, about)]
struct Cli {
    /// Lifecycle event to handle.
    #[arg(value_enum)]
    event: LifecycleEvent,

    /// Path to the operator settings file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// JSON file holding the exporter options bag.
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Override one exporter option, e.g. `--set listen-address=0.0.0.0:9290`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", NAME, VERSION);

    let reporter = JsonStatusReporter::stdout();
    match run(&cli, &settings, &reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(event = %cli.event, error = %e, code = e.code(), "Event failed");
            if let Err(report_err) = reporter.set_blocked(&e) {
                eprintln!("Error reporting status: {}", report_err);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, settings: &Settings, reporter: &dyn StatusReporter) -> OperatorResult<()> {
    let mut options = match &cli.options {
        Some(path) => ExporterOptions::from_file(path)?,
        None => ExporterOptions::default(),
    };
    for assignment in &cli.set {
        options.apply_assignment(assignment)?;
    }

    let host = SystemHost::new(settings.download.timeout())?;
    let engine = TemplateEngine::new(settings.paths.templates_dir.as_deref())?;
    let publisher = FileEndpointPublisher::new(&settings.paths.endpoint_file);
    let journal = open_journal(settings);

    let mut controller =
        LifecycleController::new(&host, settings, &engine, reporter, &publisher, journal)?;
    controller.handle(cli.event, &options)
}

/// Load settings from `path`, or from the default path if it exists.
fn load_settings(path: Option<&Path>) -> OperatorResult<Settings> {
    match path {
        Some(path) => Settings::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Settings::load(DEFAULT_CONFIG_PATH),
        None => Ok(Settings::default()),
    }
}

fn open_journal(settings: &Settings) -> AuditLogger {
    if !settings.audit.enabled {
        return AuditLogger::disabled();
    }
    match AuditLogger::new(&settings.audit.log_path) {
        Ok(logger) => logger,
        Err(e) => {
            warn!(error = %e, "Journal unavailable, continuing without it");
            AuditLogger::disabled()
        }
    }
}

/// Initialize logging based on settings. Logs go to stderr.
fn init_logging(settings: &Settings) -> Result<(), OperatorError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let result = match settings.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| OperatorError::Config {
        message: format!("Failed to install log subscriber: {}", e),
    })
}
