/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file worker_server.rs
 * @brief Worker HTTP endpoints and the controller heartbeat loop
 */

use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use warp::reply::Response;
use warp::Filter;

use crate::client::PeerClient;
use crate::config::WorkerConfig;
use crate::coordinator::WriteCoordinator;
use crate::protocol::{
    error_response, json_response, DeleteResponse, KeysResponse, PullRequest, PullResponse,
    PutRequest, PutResponse, ReplicateRequest, ReplicateResponse, ValueResponse, WorkerHealth,
};
use crate::shutdown::ShutdownReason;
use crate::store::ReplicaStore;
use crate::{shardkv_debug, shardkv_warn};

pub struct WorkerContext {
    pub config: Arc<WorkerConfig>,
    pub store: Arc<ReplicaStore>,
    pub coordinator: WriteCoordinator,
    pub client: PeerClient,
}

// warp hands path segments through raw; keys arrive percent-encoded.
fn decode_path_key(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8_lossy()
        .into_owned()
}

fn with_context(
    ctx: Arc<WorkerContext>,
) -> impl Filter<Extract = (Arc<WorkerContext>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

async fn handle_put(
    raw_key: String,
    body: PutRequest,
    ctx: Arc<WorkerContext>,
) -> Result<Response, Infallible> {
    let key = decode_path_key(&raw_key);
    match ctx.coordinator.put(&key, &body.value).await {
        Ok(acks) => Ok(json_response(&PutResponse {
            result: "ok".to_string(),
            acks,
        })),
        Err(err) => {
            shardkv_warn!("put of {} failed: {}", key, err);
            Ok(error_response(&err))
        }
    }
}

async fn handle_get(raw_key: String, ctx: Arc<WorkerContext>) -> Result<Response, Infallible> {
    let key = decode_path_key(&raw_key);
    match ctx.store.get(&key) {
        Ok(value) => Ok(json_response(&ValueResponse { value })),
        Err(err) => Ok(error_response(&err)),
    }
}

async fn handle_delete(raw_key: String, ctx: Arc<WorkerContext>) -> Result<Response, Infallible> {
    let key = decode_path_key(&raw_key);
    // Disk trouble is logged and absorbed; the in-memory removal has already
    // happened and the client sees success either way.
    if let Err(err) = ctx.store.delete(&key).await {
        shardkv_warn!("removing persisted file for {} failed: {}", key, err);
    }
    Ok(json_response(&DeleteResponse {
        result: "deleted".to_string(),
    }))
}

async fn handle_replicate(
    raw_key: String,
    body: ReplicateRequest,
    ctx: Arc<WorkerContext>,
) -> Result<Response, Infallible> {
    let key = decode_path_key(&raw_key);
    // Persistence is best effort; the in-memory write is the ack.
    if let Err(err) = ctx.store.put(&key, &body.value).await {
        shardkv_warn!("persisting replicated key {} failed: {}", key, err);
    }
    Ok(json_response(&ReplicateResponse {
        result: "replicated".to_string(),
    }))
}

async fn handle_pull(body: PullRequest, ctx: Arc<WorkerContext>) -> Result<Response, Infallible> {
    let count = ctx
        .store
        .pull_from(&ctx.client, &body.source, &body.keys)
        .await;
    Ok(json_response(&PullResponse {
        result: "pulled".to_string(),
        count,
    }))
}

async fn handle_keys(ctx: Arc<WorkerContext>) -> Result<Response, Infallible> {
    Ok(json_response(&KeysResponse {
        keys: ctx.store.keys(),
    }))
}

async fn handle_health(ctx: Arc<WorkerContext>) -> Result<Response, Infallible> {
    Ok(json_response(&WorkerHealth {
        status: "worker up".to_string(),
        address: ctx.config.cluster.address.clone(),
        stored_keys: ctx.store.len(),
    }))
}

pub fn routes(
    ctx: Arc<WorkerContext>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let kv_put = warp::path!("kv" / String)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(handle_put);

    let kv_get = warp::path!("kv" / String)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(handle_get);

    let delete = warp::path!("delete" / String)
        .and(warp::delete())
        .and(with_context(ctx.clone()))
        .and_then(handle_delete);

    let replicate = warp::path!("replicate" / String)
        .and(warp::post())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(handle_replicate);

    let pull = warp::path!("pull")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(handle_pull);

    let keys = warp::path!("keys")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(handle_keys);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(handle_health);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "PUT", "POST", "DELETE"]);

    kv_put
        .or(kv_get)
        .unify()
        .or(delete)
        .unify()
        .or(replicate)
        .unify()
        .or(pull)
        .unify()
        .or(keys)
        .unify()
        .or(health)
        .unify()
        .with(cors)
}

pub fn bind(
    ctx: Arc<WorkerContext>,
    addr: SocketAddr,
    mut shutdown: broadcast::Receiver<ShutdownReason>,
) -> (SocketAddr, impl Future<Output = ()>) {
    warp::serve(routes(ctx)).bind_with_graceful_shutdown(addr, async move {
        let _ = shutdown.recv().await;
    })
}

// Periodic registration with the controller. Errors are ignored; the
// controller treats a missing worker as failed only after the heartbeat
// timeout elapses.
pub fn spawn_heartbeat_loop(
    config: Arc<WorkerConfig>,
    client: PeerClient,
    mut shutdown: broadcast::Receiver<ShutdownReason>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(config.replication.heartbeat_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = client
                        .send_heartbeat(
                            &config.cluster.controller,
                            &config.cluster.id,
                            &config.cluster.address,
                        )
                        .await
                    {
                        shardkv_debug!(
                            "heartbeat to {} failed: {}",
                            config.cluster.controller,
                            err
                        );
                    }
                }
                _ = shutdown.recv() => {
                    break;
                }
            }
        }
    })
}
