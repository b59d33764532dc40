//! Infergate - Main Entry Point
//! JSON-RPC server + autoscaling loop around one QueueManager

mod config;
mod provisioner;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use infergate_api_rpc::RpcServer;
use infergate_core::application::{Autoscaler, QueueManager};

use crate::config::DaemonConfig;
use crate::provisioner::LogProvisioner;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format =
        std::env::var("INFERGATE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("infergate=info"))?;

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Infergate v{} starting...", infergate_core::VERSION);

    // 2. Load configuration
    let config = DaemonConfig::from_env().map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    info!(
        max_workers = config.scheduler.max_workers,
        strategy = %config.scheduler.load_balance_strategy,
        autoscale_interval_secs = config.scheduler.autoscale_interval.as_secs(),
        stall_timeout_secs = ?config.scheduler.stall_timeout.map(|d| d.as_secs()),
        "Configuration loaded"
    );

    // 3. Build the manager and its queues
    let manager = Arc::new(QueueManager::with_system_providers(config.scheduler));
    for queue in &config.queues {
        manager.create_queue(queue.id.clone(), queue.queue_type, queue.capacity)?;
    }

    // 4. Start JSON-RPC server
    let (addr, rpc_handle) = RpcServer::new(config.rpc, manager.clone())
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 5. Start autoscaling loop
    let autoscaler = Autoscaler::new(manager.clone(), Arc::new(LogProvisioner)).spawn();

    info!(addr = %addr, queues = config.queues.len(), "System ready");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    autoscaler.shutdown().await;
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;

    let stats = manager.system_stats();
    info!(
        pending = stats.total_pending,
        processing = stats.total_processing,
        completed = stats.total_completed,
        failed = stats.total_failed,
        "Shutdown complete."
    );

    Ok(())
}
