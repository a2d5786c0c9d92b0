/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file protocol.rs
 * @brief HTTP wire types shared by the controller and worker endpoints
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

use crate::error::ShardKvError;

// Controller messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerEntry {
    pub address: String,
}

pub type WorkersResponse = BTreeMap<String, WorkerEntry>;

#[derive(Debug, Clone, Deserialize)]
pub struct MapQuery {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResponse {
    pub primary: String,
    pub replicas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerHealth {
    pub status: String,
    pub workers_count: usize,
}

// Worker messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutRequest {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutResponse {
    pub result: String,
    pub acks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueResponse {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateRequest {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateResponse {
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub source: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResponse {
    pub result: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysResponse {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub status: String,
    pub address: String,
    pub stored_keys: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

// Reply helpers
pub fn json_response<T: Serialize>(body: &T) -> Response {
    warp::reply::json(body).into_response()
}

pub fn error_response(err: &ShardKvError) -> Response {
    let status = StatusCode::from_u16(err.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorDetail {
        detail: err.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_response_field_names() {
        let mapping = MappingResponse {
            primary: "http://localhost:8001".to_string(),
            replicas: vec![
                "http://localhost:8001".to_string(),
                "http://localhost:8002".to_string(),
            ],
        };
        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["primary"], "http://localhost:8001");
        assert_eq!(json["replicas"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_error_response_status() {
        let resp = error_response(&ShardKvError::NotFound);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = error_response(&ShardKvError::QuorumUnreached { acks: 1 });
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_pull_request_round_trip() {
        let req: PullRequest = serde_json::from_str(
            r#"{"source":"http://localhost:8002","keys":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(req.source, "http://localhost:8002");
        assert_eq!(req.keys, vec!["a".to_string(), "b".to_string()]);
    }
}
