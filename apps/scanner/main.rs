use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utils::{
    errors::{SCAN_FAILED, STATE_LOAD_FAILED},
    tracing::run_with_tracing,
};
use vayua_scanner::{
    api::{ApiState, router},
    chain_client::{AlloyChainClient, ChainClient},
    config,
    periodic_scan::{RetryPolicy, run_periodic_scan},
    scanner::LogScanner,
    store::{FileStore, ScanStateStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    run_with_tracing(run).await
}

#[instrument]
async fn run() -> Result<()> {
    let config = config::load();
    let rpc_url = config.rpc_url()?.to_string();
    let governors = config.governor_addresses()?;
    let settings = config.scanner_settings()?;
    let scan_interval = config.scan_interval()?;

    let client: Arc<dyn ChainClient> = Arc::new(AlloyChainClient::new(&rpc_url)?);
    let store = ScanStateStore::new(Arc::new(
        FileStore::open(&config.state_path)
            .await
            .context(STATE_LOAD_FAILED)?,
    ));
    let scanner = Arc::new(LogScanner::new(client.clone(), store.clone(), settings));

    let policy = RetryPolicy {
        max_retries: config.max_retries,
        backoff: config.retry_backoff(),
    };

    info!(
        governors = governors.len(),
        interval_secs = config.scan_interval_secs,
        "Starting periodic scan"
    );
    let mut scan_task = tokio::spawn(run_periodic_scan(
        scanner,
        governors,
        scan_interval,
        policy,
    ));

    let app = router(ApiState {
        store,
        client,
        settings,
        default_page_size: config.default_page_size,
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "HTTP server failed");
        }
    });
    info!(port = config.http_port, "HTTP server running");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down...");
        }
        result = &mut scan_task => {
            server.abort();
            result.context(SCAN_FAILED)?;
            return Err(anyhow::anyhow!(SCAN_FAILED));
        }
    }

    scan_task.abort();
    server.abort();

    Ok(())
}
