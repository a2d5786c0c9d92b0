/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file client.rs
 * @brief Typed outbound RPC surface for controller and worker peers
 */

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use std::time::Duration;

use crate::error::{Result, ShardKvError};
use crate::protocol::{
    HeartbeatRequest, KeysResponse, MappingResponse, PullRequest, PullResponse, ReplicateRequest,
    ValueResponse,
};

pub fn normalize_address(address: &str) -> String {
    address.trim_end_matches('/').to_string()
}

pub fn encode_path_key(key: &str) -> String {
    utf8_percent_encode(key, NON_ALPHANUMERIC).to_string()
}

fn peer_error(err: reqwest::Error) -> ShardKvError {
    ShardKvError::Peer(err.to_string())
}

// All calls share one timeout, applied at client construction. Callers decide
// per call site whether a failure is swallowed, retried, or surfaced.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(peer_error)?;
        Ok(Self { http })
    }

    pub async fn send_heartbeat(&self, controller: &str, id: &str, address: &str) -> Result<()> {
        let url = format!("{}/heartbeat", normalize_address(controller));
        let body = HeartbeatRequest {
            id: id.to_string(),
            address: address.to_string(),
        };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(peer_error)?;
        if !response.status().is_success() {
            return Err(ShardKvError::Peer(format!(
                "heartbeat rejected with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn get_mapping(&self, controller: &str, key: &str) -> Result<MappingResponse> {
        let url = format!("{}/map", normalize_address(controller));
        let response = self
            .http
            .get(url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(peer_error)?;
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ShardKvError::NoWorkers);
        }
        if !response.status().is_success() {
            return Err(ShardKvError::Peer(format!(
                "mapping query returned status {}",
                response.status()
            )));
        }
        response.json().await.map_err(peer_error)
    }

    pub async fn replicate(&self, address: &str, key: &str, value: &str) -> Result<()> {
        let url = format!(
            "{}/replicate/{}",
            normalize_address(address),
            encode_path_key(key)
        );
        let body = ReplicateRequest {
            value: value.to_string(),
        };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(peer_error)?;
        if !response.status().is_success() {
            return Err(ShardKvError::Peer(format!(
                "replicate returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn fetch_value(&self, address: &str, key: &str) -> Result<String> {
        let url = format!("{}/kv/{}", normalize_address(address), encode_path_key(key));
        let response = self.http.get(url).send().await.map_err(peer_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ShardKvError::NotFound);
        }
        if !response.status().is_success() {
            return Err(ShardKvError::Peer(format!(
                "value fetch returned status {}",
                response.status()
            )));
        }
        let body: ValueResponse = response.json().await.map_err(peer_error)?;
        Ok(body.value)
    }

    pub async fn list_keys(&self, address: &str) -> Result<Vec<String>> {
        let url = format!("{}/keys", normalize_address(address));
        let response = self.http.get(url).send().await.map_err(peer_error)?;
        if !response.status().is_success() {
            return Err(ShardKvError::Peer(format!(
                "key listing returned status {}",
                response.status()
            )));
        }
        let body: KeysResponse = response.json().await.map_err(peer_error)?;
        Ok(body.keys)
    }

    pub async fn request_pull(&self, address: &str, source: &str, keys: &[String]) -> Result<usize> {
        let url = format!("{}/pull", normalize_address(address));
        let body = PullRequest {
            source: source.to_string(),
            keys: keys.to_vec(),
        };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(peer_error)?;
        if !response.status().is_success() {
            return Err(ShardKvError::Peer(format!(
                "pull returned status {}",
                response.status()
            )));
        }
        let body: PullResponse = response.json().await.map_err(peer_error)?;
        Ok(body.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address_strips_trailing_slash() {
        assert_eq!(normalize_address("http://a/"), "http://a");
        assert_eq!(normalize_address("http://a"), "http://a");
        assert_eq!(normalize_address("http://a//"), "http://a");
    }

    #[test]
    fn test_encode_path_key_is_segment_safe() {
        assert_eq!(encode_path_key("plain1"), "plain1");
        assert_eq!(encode_path_key("a/b"), "a%2Fb");
        assert_eq!(encode_path_key("a b"), "a%20b");
    }
}
