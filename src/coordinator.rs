/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file coordinator.rs
 * @brief Client-facing write path: quorum replication with background fan-out
 */

use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::sleep;

use crate::client::{normalize_address, PeerClient};
use crate::config::WorkerConfig;
use crate::error::{Result, ShardKvError};
use crate::store::ReplicaStore;
use crate::{shardkv_debug, shardkv_info, shardkv_warn};

fn normalize_unique(addresses: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .iter()
        .map(|address| normalize_address(address))
        .filter(|address| seen.insert(address.clone()))
        .collect()
}

pub struct WriteCoordinator {
    config: Arc<WorkerConfig>,
    store: Arc<ReplicaStore>,
    client: PeerClient,
}

impl WriteCoordinator {
    pub fn new(config: Arc<WorkerConfig>, store: Arc<ReplicaStore>, client: PeerClient) -> Self {
        Self {
            config,
            store,
            client,
        }
    }

    // The PUT protocol. The coordinator stores locally and counts itself
    // only when it is in the replica set; a coordinator outside the set
    // gathers every ack from peers.
    pub async fn put(&self, key: &str, value: &str) -> Result<usize> {
        let controller = &self.config.cluster.controller;
        let self_addr = normalize_address(&self.config.cluster.address);

        let mapping = self
            .client
            .get_mapping(controller, key)
            .await
            .map_err(|err| ShardKvError::ControllerUnavailable(err.to_string()))?;
        let mut replicas = normalize_unique(&mapping.replicas);

        let mut acks = 0usize;
        let mut attempted: HashSet<String> = HashSet::new();
        if replicas.contains(&self_addr) {
            // The in-memory write always lands; persistence is best effort.
            if let Err(err) = self.store.put(key, value).await {
                shardkv_warn!("local persist of {} failed: {}", key, err);
            }
            acks = 1;
            attempted.insert(self_addr.clone());
        }

        let quorum = self.config.cluster.write_quorum;
        let max_retries = self.config.replication.max_controller_retries;
        let backoff = self.config.replication.retry_backoff();
        let mut controller_retries = 0u32;

        while acks < quorum {
            let mut candidates: Vec<String> = replicas
                .iter()
                .filter(|address| **address != self_addr && !attempted.contains(*address))
                .cloned()
                .collect();

            if candidates.is_empty() {
                controller_retries += 1;
                if controller_retries > max_retries {
                    break;
                }
                sleep(backoff).await;
                // Membership may have changed; pick up any newly reported
                // replicas before giving up.
                match self.client.get_mapping(controller, key).await {
                    Ok(mapping) => replicas = normalize_unique(&mapping.replicas),
                    Err(err) => {
                        shardkv_debug!("mapping refresh for {} failed: {}", key, err);
                    }
                }
                continue;
            }

            candidates.shuffle(&mut rand::thread_rng());
            let mut any_success = false;
            for address in candidates {
                if acks >= quorum {
                    break;
                }
                attempted.insert(address.clone());
                match self.client.replicate(&address, key, value).await {
                    Ok(()) => {
                        acks += 1;
                        any_success = true;
                    }
                    Err(err) => {
                        shardkv_debug!("replicate of {} to {} failed: {}", key, address, err);
                    }
                }
            }

            if !any_success && acks < quorum {
                controller_retries += 1;
                if controller_retries > max_retries {
                    break;
                }
                sleep(backoff).await;
            }
        }

        if acks < quorum {
            return Err(ShardKvError::QuorumUnreached { acks });
        }

        self.spawn_background_fanout(key, value, &replicas, &attempted, &self_addr);
        Ok(acks)
    }

    // Best-effort completion of the replica set after the quorum is already
    // durable. Detached from the request task; not cancelled on shutdown.
    fn spawn_background_fanout(
        &self,
        key: &str,
        value: &str,
        replicas: &[String],
        attempted: &HashSet<String>,
        self_addr: &str,
    ) {
        let remaining: Vec<String> = replicas
            .iter()
            .filter(|address| **address != self_addr && !attempted.contains(*address))
            .cloned()
            .collect();
        if remaining.is_empty() {
            return;
        }

        let client = self.client.clone();
        let key = key.to_string();
        let value = value.to_string();
        tokio::spawn(async move {
            shardkv_info!(
                "background fan-out of {} to {} remaining replicas",
                key,
                remaining.len()
            );
            let results = futures::future::join_all(
                remaining
                    .iter()
                    .map(|address| client.replicate(address, &key, &value)),
            )
            .await;
            for (address, result) in remaining.iter().zip(results) {
                if let Err(err) = result {
                    shardkv_debug!(
                        "background replicate of {} to {} failed: {}",
                        key,
                        address,
                        err
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unique_dedupes_and_strips() {
        let replicas = vec![
            "http://a/".to_string(),
            "http://a".to_string(),
            "http://b".to_string(),
        ];
        assert_eq!(
            normalize_unique(&replicas),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
    }
}
