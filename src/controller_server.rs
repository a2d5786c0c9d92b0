/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file controller_server.rs
 * @brief Controller HTTP endpoints: heartbeat, workers, map, health
 */

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use warp::reply::Response;
use warp::Filter;

use crate::protocol::{
    error_response, json_response, ControllerHealth, HeartbeatRequest, MapQuery, StatusResponse,
    WorkerEntry, WorkersResponse,
};
use crate::registry::MembershipRegistry;
use crate::shutdown::ShutdownReason;
use crate::{shardkv_debug, shardkv_info};

pub struct ControllerContext {
    pub registry: Arc<MembershipRegistry>,
}

fn with_context(
    ctx: Arc<ControllerContext>,
) -> impl Filter<Extract = (Arc<ControllerContext>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

async fn handle_heartbeat(
    body: HeartbeatRequest,
    ctx: Arc<ControllerContext>,
) -> Result<Response, Infallible> {
    if ctx.registry.heartbeat(&body.id, &body.address) {
        shardkv_info!("worker {} registered at {}", body.id, body.address);
    } else {
        shardkv_debug!("heartbeat from {}", body.id);
    }
    Ok(json_response(&StatusResponse {
        status: "ok".to_string(),
    }))
}

async fn handle_workers(ctx: Arc<ControllerContext>) -> Result<Response, Infallible> {
    let workers: WorkersResponse = ctx
        .registry
        .list_workers()
        .into_iter()
        .map(|(id, address)| (id, WorkerEntry { address }))
        .collect();
    Ok(json_response(&workers))
}

async fn handle_map(query: MapQuery, ctx: Arc<ControllerContext>) -> Result<Response, Infallible> {
    match ctx.registry.mapping(&query.key) {
        Ok(mapping) => Ok(json_response(&mapping)),
        Err(err) => Ok(error_response(&err)),
    }
}

async fn handle_health(ctx: Arc<ControllerContext>) -> Result<Response, Infallible> {
    Ok(json_response(&ControllerHealth {
        status: "controller up".to_string(),
        workers_count: ctx.registry.workers_count(),
    }))
}

pub fn routes(
    ctx: Arc<ControllerContext>,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let heartbeat = warp::path("heartbeat")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(handle_heartbeat);

    let workers = warp::path("workers")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(handle_workers);

    let map = warp::path("map")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<MapQuery>())
        .and(with_context(ctx.clone()))
        .and_then(handle_map);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(handle_health);

    heartbeat.or(workers).unify().or(map).unify().or(health).unify()
}

// Binds the controller server with graceful shutdown; the caller spawns (or
// awaits) the returned future.
pub fn bind(
    ctx: Arc<ControllerContext>,
    addr: SocketAddr,
    mut shutdown: broadcast::Receiver<ShutdownReason>,
) -> (SocketAddr, impl Future<Output = ()>) {
    warp::serve(routes(ctx)).bind_with_graceful_shutdown(addr, async move {
        let _ = shutdown.recv().await;
    })
}
