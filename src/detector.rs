/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file detector.rs
 * @brief Heartbeat-timeout failure detection driving background repair
 */

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::client::PeerClient;
use crate::config::ControllerConfig;
use crate::registry::MembershipRegistry;
use crate::repair::repair_after_failure;
use crate::shardkv_warn;
use crate::shutdown::ShutdownReason;

pub struct FailureDetector {
    registry: Arc<MembershipRegistry>,
    config: Arc<ControllerConfig>,
    client: PeerClient,
}

impl FailureDetector {
    pub fn new(
        registry: Arc<MembershipRegistry>,
        config: Arc<ControllerConfig>,
        client: PeerClient,
    ) -> Self {
        Self {
            registry,
            config,
            client,
        }
    }

    // Scans every CHECK_INTERVAL. Each newly expired worker is marked down
    // exactly once; its repair runs detached so a slow repair never delays
    // the next scan.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<ShutdownReason>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.membership.check_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let timeout = self.config.membership.heartbeat_timeout();
                        for (failed_id, snapshot) in self.registry.expire_workers(timeout) {
                            shardkv_warn!(
                                "worker {} missed the heartbeat deadline; scheduling repair",
                                failed_id
                            );
                            let client = self.client.clone();
                            let replicas = self.registry.replicas();
                            tokio::spawn(async move {
                                repair_after_failure(&failed_id, snapshot, replicas, &client).await;
                            });
                        }
                    }
                    _ = shutdown.recv() => {
                        break;
                    }
                }
            }
        })
    }
}
