//! Main execution logic for ods-worker CLI.

use anyhow::{Context, Result};
use ods_discoverer::s3::{S3Backend, S3Config};
use ods_discoverer::{FanOutConfig, RetryConfig};
use ods_store::{SqliteStore, SqliteStoreConfig};
use ods_worker::{StatsSnapshot, Worker, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::args::Cli;

/// Build the worker configuration from arguments.
pub fn worker_config(args: &Cli) -> Result<WorkerConfig> {
    let retry = RetryConfig::new()
        .with_max_retries(args.max_retries)
        .with_base_delay_ms(args.base_delay_ms)
        .with_factor(args.backoff_factor)
        .with_max_delay_ms(args.max_delay_ms);

    let fan_out = FanOutConfig::new()
        .with_concurrency(args.concurrency)
        .with_buffer_capacity(args.buffer)
        .with_continue_on_error(!args.fail_fast);

    let mut config = WorkerConfig::new()
        .with_idle_interval(Duration::from_secs(args.idle_interval))
        .with_drain(args.drain)
        .with_page_size(args.page_size)
        .with_retry(retry)
        .with_fan_out(fan_out);

    if let Some(ref worker_id) = args.worker_id {
        config = config.with_worker_id(worker_id);
    }

    config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(config)
}

/// Build the object storage configuration from arguments.
pub fn s3_config(args: &Cli) -> Result<S3Config> {
    let mut config = S3Config::default().with_timeout(args.request_timeout);

    if let Some(ref region) = args.region {
        config = config.with_region(region);
    }
    if let Some(ref namespace) = args.namespace {
        config = config.with_namespace(namespace);
    }
    if let Some(ref endpoint) = args.s3_endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let (Some(access_key), Some(secret_key)) = (&args.access_key, &args.secret_key) {
        config = config.with_credentials(access_key, secret_key);
    } else if args.access_key.is_some() || args.secret_key.is_some() {
        anyhow::bail!("--access-key and --secret-key must be given together");
    }
    if let Some(ref profile) = args.profile {
        config = config.with_profile(profile);
    }

    if config.resolved_endpoint().is_none() {
        anyhow::bail!("either --s3-endpoint or both --namespace and --region are required");
    }

    config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(config)
}

/// Execute the worker with the provided arguments.
pub async fn execute(args: Cli) -> Result<StatsSnapshot> {
    let config = worker_config(&args)?;
    let s3 = s3_config(&args)?;

    let store = SqliteStore::connect_with(
        SqliteStoreConfig::new(&args.database_url).with_max_connections(args.max_connections),
    )
    .await
    .with_context(|| format!("failed to open session store at {}", args.database_url))?;
    let store = Arc::new(store);

    let backend = Arc::new(
        S3Backend::from_config(&s3)
            .await
            .context("failed to create object storage client")?,
    );

    info!(
        database = %args.database_url,
        endpoint = ?s3.resolved_endpoint(),
        "Connected"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, finishing the current session");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to listen for interrupt"),
            }
        }
    });

    let worker = Worker::new(config, store.clone(), store.clone(), backend);
    let stats = worker.run(shutdown).await?;

    store.close().await;
    Ok(stats)
}
