/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file main.rs
 * @brief ShardKV entry point - controller and worker process modes
 */

use std::sync::Arc;

use shardkv::{
    client::PeerClient,
    config::{ControllerConfig, WorkerConfig},
    controller_server::{self, ControllerContext},
    coordinator::WriteCoordinator,
    detector::FailureDetector,
    logger::init_logger,
    registry::MembershipRegistry,
    shardkv_info,
    shutdown::ShutdownManager,
    store::ReplicaStore,
    worker_server::{self, WorkerContext},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("controller") => run_controller_mode().await,
        Some("worker") => run_worker_mode().await,
        _ => {
            eprintln!("usage: shardkv <controller|worker>");
            std::process::exit(2);
        }
    }
}

async fn run_controller_mode() -> anyhow::Result<()> {
    let config = match std::env::var("SHARDKV_CONFIG") {
        Ok(path) => ControllerConfig::load_from_file(&path).await?,
        Err(_) => ControllerConfig::load_from_env()?,
    };
    config.validate()?;
    init_logger(config.logging.log_level(), config.logging.detailed);

    shardkv_info!("ShardKV Controller Starting");
    shardkv_info!("==========================================");
    shardkv_info!("Listen Address: {}:{}", config.server.host, config.server.port);
    shardkv_info!("Replication Factor: {}", config.membership.replicas);
    shardkv_info!("Heartbeat Timeout: {}s", config.membership.heartbeat_timeout_secs);
    shardkv_info!("Check Interval: {}s", config.membership.check_interval_secs);
    shardkv_info!("Fallback Workers: {}", config.membership.seed_workers.len());
    shardkv_info!("==========================================");

    let config = Arc::new(config);
    let shutdown = ShutdownManager::new();
    shutdown
        .start_signal_handling()
        .await
        .map_err(|e| anyhow::anyhow!("signal handling setup failed: {}", e))?;

    let registry = Arc::new(MembershipRegistry::new(
        config.membership.replicas,
        config.membership.seed_workers.clone(),
    ));
    let client = PeerClient::new(config.membership.repair_timeout())
        .map_err(|e| anyhow::anyhow!("http client setup failed: {}", e))?;

    let detector = FailureDetector::new(registry.clone(), config.clone(), client);
    let detector_handle = detector.spawn(shutdown.subscribe());

    let ctx = Arc::new(ControllerContext { registry });
    let (addr, server) =
        controller_server::bind(ctx, config.server.bind_addr()?, shutdown.subscribe());
    shardkv_info!("Controller listening on {}", addr);

    server.await;
    let _ = detector_handle.await;
    shardkv_info!("Controller stopped");
    Ok(())
}

async fn run_worker_mode() -> anyhow::Result<()> {
    let config = match std::env::var("SHARDKV_CONFIG") {
        Ok(path) => WorkerConfig::load_from_file(&path).await?,
        Err(_) => WorkerConfig::load_from_env()?,
    };
    config.validate()?;
    init_logger(config.logging.log_level(), config.logging.detailed);

    shardkv_info!("ShardKV Worker Starting");
    shardkv_info!("==========================================");
    shardkv_info!("Worker ID: {}", config.cluster.id);
    shardkv_info!("Advertised Address: {}", config.cluster.address);
    shardkv_info!("Controller: {}", config.cluster.controller);
    shardkv_info!("Write Quorum: {}", config.cluster.write_quorum);
    shardkv_info!("Request Timeout: {}s", config.replication.request_timeout_secs);
    shardkv_info!("Data Directory: {}", config.storage.data_dir);
    shardkv_info!("==========================================");

    let config = Arc::new(config);
    let shutdown = ShutdownManager::new();
    shutdown
        .start_signal_handling()
        .await
        .map_err(|e| anyhow::anyhow!("signal handling setup failed: {}", e))?;

    // Persisted keys are loaded before the listener accepts traffic.
    let store = Arc::new(ReplicaStore::open(&config.storage.data_dir).await?);
    shardkv_info!("Loaded {} persisted keys", store.len());

    let client = PeerClient::new(config.replication.request_timeout())
        .map_err(|e| anyhow::anyhow!("http client setup failed: {}", e))?;
    let coordinator = WriteCoordinator::new(config.clone(), store.clone(), client.clone());

    let heartbeat_handle =
        worker_server::spawn_heartbeat_loop(config.clone(), client.clone(), shutdown.subscribe());

    let ctx = Arc::new(WorkerContext {
        config: config.clone(),
        store,
        coordinator,
        client,
    });
    let (addr, server) = worker_server::bind(ctx, config.server.bind_addr()?, shutdown.subscribe());
    shardkv_info!("Worker listening on {}", addr);

    server.await;
    let _ = heartbeat_handle.await;
    shardkv_info!("Worker stopped");
    Ok(())
}
