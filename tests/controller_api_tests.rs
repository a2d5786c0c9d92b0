/*!
 * Controller endpoint tests driven through warp's test harness
 */

use std::sync::Arc;

use serde_json::json;
use shardkv::controller_server::{routes, ControllerContext};
use shardkv::registry::MembershipRegistry;

fn context(replicas: usize, seeds: Vec<String>) -> Arc<ControllerContext> {
    Arc::new(ControllerContext {
        registry: Arc::new(MembershipRegistry::new(replicas, seeds)),
    })
}

#[tokio::test]
async fn test_heartbeat_registers_worker() {
    let ctx = context(3, vec![]);
    let api = routes(ctx.clone());

    let resp = warp::test::request()
        .method("POST")
        .path("/heartbeat")
        .json(&json!({"id": "w1", "address": "http://127.0.0.1:8101"}))
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["status"], "ok");

    let resp = warp::test::request().path("/workers").reply(&api).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["w1"]["address"], "http://127.0.0.1:8101");
}

#[tokio::test]
async fn test_map_without_workers_is_unavailable() {
    let ctx = context(3, vec![]);
    let api = routes(ctx);

    let resp = warp::test::request().path("/map?key=x").reply(&api).await;
    assert_eq!(resp.status(), 503);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["detail"], "no available workers");
}

#[tokio::test]
async fn test_map_returns_replicas() {
    let ctx = context(3, vec![]);
    let api = routes(ctx.clone());

    for (id, addr) in [
        ("w1", "http://127.0.0.1:8101"),
        ("w2", "http://127.0.0.1:8102"),
        ("w3", "http://127.0.0.1:8103"),
    ] {
        ctx.registry.heartbeat(id, addr);
    }

    let resp = warp::test::request().path("/map?key=foo").reply(&api).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    let replicas = body["replicas"].as_array().unwrap();
    assert_eq!(replicas.len(), 3);
    assert_eq!(body["primary"], replicas[0]);
}

#[tokio::test]
async fn test_map_seeds_fallback_when_empty() {
    let seeds: Vec<String> = (1..=4)
        .map(|i| format!("http://127.0.0.1:810{}", i))
        .collect();
    let ctx = context(3, seeds.clone());
    let api = routes(ctx.clone());

    let resp = warp::test::request().path("/map?key=x").reply(&api).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    let replicas: Vec<String> = body["replicas"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(replicas.len(), 3);

    // Seeded ids are w0..w3 in seed order, so the replica list is the ring
    // prefix starting at the key's primary index.
    let start = shardkv::placement::primary_index("x", seeds.len());
    let expected: Vec<String> = (0..3)
        .map(|i| seeds[(start + i) % seeds.len()].clone())
        .collect();
    assert_eq!(replicas, expected);

    // The fallback entries are now registered.
    let resp = warp::test::request().path("/health").reply(&api).await;
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["status"], "controller up");
    assert_eq!(body["workers_count"], 4);
}
