#[macro_use]
extern crate serde_with;
#[macro_use]
extern crate tracing;

use crate::configs::GlobalConfig;
use anyhow::{Context, Result as AnyResult};
use components::{ProbeScheduler, StatusExporter, SweepCoordinator};
use configs::SweepParameters;
use hickory_resolver::TokioAsyncResolver;
use http_client::HttpClient;
use prober::HttpProber;
use std::{num::NonZeroUsize, sync::Arc};
use store::{SnapshotFile, StatusStore, TransitionLog};
use tokio::signal;
use tracing_subscriber::EnvFilter;

mod components;
mod configs;
mod error;
mod http_client;
mod notifier;
mod prober;
mod store;
#[cfg(test)]
mod test_support;
mod types;

fn main() -> AnyResult<()> {
    // Load environment variables from the `.env` file
    dotenvy::dotenv().ok();
    // Initialize the logger after loading the environment variables
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app_config = GlobalConfig::load_config().context("Failed to parse configuration files")?;

    // Setup async runtime
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(worker) = app_config.workers.and_then(NonZeroUsize::new) {
        runtime_builder.worker_threads(worker.into());
    }
    runtime_builder
        .enable_all()
        .build()
        .context("Failed to bootstrap the Tokio runtime")?
        .block_on(server_loop(app_config))
}

async fn server_loop(app_config: GlobalConfig) -> AnyResult<()> {
    info!("Application starting in '{}' mode.", app_config.mode);
    let params = SweepParameters::from_config(&app_config);
    info!(
        "Monitoring {} endpoint(s) every {:?} with a {:?} probe timeout",
        params.endpoints.len(),
        params.interval,
        params.timeout
    );

    let resolver = Arc::new(TokioAsyncResolver::tokio_from_system_conf()?);
    let client = HttpClient::new(resolver);

    let store = Arc::new(
        StatusStore::open(
            SnapshotFile::new(&app_config.storage.status_file),
            &params.endpoints,
        )
        .await,
    );
    let log = Arc::new(TransitionLog::new(&app_config.storage.history_file));
    let notifier = notifier::build_notifier(&app_config.notifier, client.clone())?;

    let coordinator = Arc::new(SweepCoordinator::new(
        params.endpoints,
        params.timeout,
        Arc::new(HttpProber::new(client)),
        store.clone(),
        log.clone(),
        notifier,
    ));
    let scheduler = ProbeScheduler::new(coordinator, params.interval);
    let exporter = StatusExporter::new(store, log, app_config.listen);

    tokio::select! {
        result = exporter.run() => result?,
        _ = scheduler.run() => {}
        result = signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, exiting");
        }
    }

    Ok(())
}
