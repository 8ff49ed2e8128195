pub mod api;
pub mod config;
pub mod document;
pub mod errors;
pub mod flatten;
pub mod lambda;
pub mod merge;
pub mod metrics_defs;
pub mod object_store;
pub mod service;

#[cfg(test)]
mod testutils;

use config::{Config, StoreConfig, ValidationError};
use hyper::body::Incoming;
use merge::DocumentMerger;
use object_store::{StoreError, build_store};
use service::MergerService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;

#[derive(thiserror::Error, Debug)]
pub enum MergerServiceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("lambda runtime error: {0}")]
    Lambda(lambda_runtime::Error),
}

/// Connects to the configured store.
pub async fn build_merger(store: &StoreConfig) -> Result<DocumentMerger, MergerServiceError> {
    store.validate()?;
    let object_store = build_store(store).await?;
    Ok(DocumentMerger::new(object_store, store.location()))
}

/// Serves updates on the main listener and health checks on the admin listener.
pub async fn run(config: Config) -> Result<(), MergerServiceError> {
    config.validate()?;
    let merger = build_merger(&config.store).await?;
    tracing::info!(location = %merger.location(), "Starting merger service");

    let merger_task = run_http_service::<_, MergerServiceError>(
        &config.listener.host,
        config.listener.port,
        MergerService::<Incoming>::new(merger),
    );
    let admin_task = run_http_service::<_, MergerServiceError>(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, Incoming>::new(|| true),
    );

    tokio::try_join!(merger_task, admin_task)?;
    Ok(())
}

/// Runs as a Lambda function until the runtime shuts down.
pub async fn run_lambda(store: StoreConfig) -> Result<(), MergerServiceError> {
    let merger = build_merger(&store).await?;
    tracing::info!(location = %merger.location(), "Starting lambda handler");

    lambda::run(merger).await.map_err(MergerServiceError::Lambda)
}
