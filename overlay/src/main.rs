mod config;

use clap::{Args, Parser};
use config::{CommonConfig, Config, ConfigError, LoggingConfig, MetricsConfig};
use merger::api::ApiResponse;
use merger::config::StoreConfig;
use metrics_exporter_statsd::StatsdBuilder;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const METRICS_PREFIX: &str = "overlay";

#[derive(Parser)]
#[command(version, about = "Merges partial updates into the overlay data document")]
enum CliCommand {
    /// Serve updates over HTTP
    Serve(ServeArgs),
    /// Handle API Gateway events as a Lambda function
    Lambda(LambdaArgs),
    /// Apply a single update and print the response
    Apply(ApplyArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long)]
    config_file: PathBuf,
}

#[derive(Args)]
struct LambdaArgs {
    /// Without a config file the S3 location is read from BUCKET and DATA_KEY
    #[arg(long)]
    config_file: Option<PathBuf>,
}

#[derive(Args)]
struct ApplyArgs {
    #[arg(long)]
    config_file: PathBuf,
    /// JSON request body, `-` reads from stdin
    #[arg(long)]
    body_file: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Merger(#[from] merger::MergerServiceError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse request body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not install metrics exporter: {0}")]
    Metrics(String),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: CliCommand) -> Result<ExitCode, CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli {
        CliCommand::Serve(args) => {
            let (common, merger_config) = Config::from_file(&args.config_file)?.into_parts()?;
            let _guard = init_observability(&common)?;
            runtime.block_on(merger::run(merger_config))?;
        }
        CliCommand::Lambda(args) => {
            let (common, store) = match args.config_file {
                Some(path) => {
                    let (common, merger_config) = Config::from_file(&path)?.into_parts()?;
                    (common, merger_config.store)
                }
                None => (
                    CommonConfig::default(),
                    StoreConfig::from_env().map_err(ConfigError::from)?,
                ),
            };
            let _guard = init_observability(&common)?;
            runtime.block_on(merger::run_lambda(store))?;
        }
        CliCommand::Apply(args) => {
            let (common, merger_config) = Config::from_file(&args.config_file)?.into_parts()?;
            let _guard = init_observability(&common)?;

            let response = apply(&runtime, &merger_config.store, &args.body_file)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.status().is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn apply(
    runtime: &tokio::runtime::Runtime,
    store: &StoreConfig,
    body_file: &Path,
) -> Result<ApiResponse, CliError> {
    let body: serde_json::Value = serde_json::from_slice(&read_body(body_file)?)?;

    runtime.block_on(async {
        let document_merger = merger::build_merger(store).await?;
        Ok(document_merger.handle(&body).await)
    })
}

fn read_body(path: &Path) -> std::io::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut body = Vec::new();
        std::io::stdin().read_to_end(&mut body)?;
        Ok(body)
    } else {
        std::fs::read(path)
    }
}

fn init_observability(common: &CommonConfig) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let guard = init_logging(common.logging.as_ref());
    if let Some(metrics) = &common.metrics {
        init_metrics(metrics)?;
    }
    Ok(guard)
}

fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = logging.map(|logging| {
        sentry::init((
            logging.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .try_init()
        .ok();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(merger::metrics_defs::ALL_METRICS);
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Sending metrics to statsd"
    );
    Ok(())
}
