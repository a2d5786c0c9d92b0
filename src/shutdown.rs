/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file shutdown.rs
 * @brief Graceful shutdown and signal handling
 */

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::{shardkv_debug, shardkv_error, shardkv_info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(i32),
    Request,
    Error(String),
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signal(_) => "signal",
            Self::Request => "request",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug)]
pub struct ShutdownManager {
    shutdown_tx: broadcast::Sender<ShutdownReason>,
    is_shutting_down: Arc<RwLock<bool>>,
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            shutdown_tx,
            is_shutting_down: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start_signal_handling(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Handle SIGTERM
        let shutdown_tx_sigterm = self.shutdown_tx.clone();
        tokio::spawn(async move {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    shardkv_error!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };

            sigterm.recv().await;
            shardkv_info!("Received SIGTERM, initiating graceful shutdown");
            let _ = shutdown_tx_sigterm.send(ShutdownReason::Signal(15));
        });

        // Handle SIGINT (Ctrl+C)
        let shutdown_tx_sigint = self.shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shardkv_info!("Received SIGINT, initiating graceful shutdown");
                let _ = shutdown_tx_sigint.send(ShutdownReason::Signal(2));
            }
        });

        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.shutdown_tx.subscribe()
    }

    pub async fn is_shutting_down(&self) -> bool {
        *self.is_shutting_down.read().await
    }

    pub async fn initiate_shutdown(&self, reason: ShutdownReason) {
        let mut is_shutting_down = self.is_shutting_down.write().await;
        if *is_shutting_down {
            shardkv_debug!("Shutdown already in progress");
            return;
        }
        *is_shutting_down = true;
        drop(is_shutting_down);

        shardkv_info!("Shutdown initiated ({})", reason.as_str());
        let _ = self.shutdown_tx.send(reason);
    }

    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        let mut receiver = self.subscribe();
        receiver.recv().await.unwrap_or(ShutdownReason::Request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initiate_shutdown_notifies_subscribers() {
        let manager = ShutdownManager::new();
        let mut receiver = manager.subscribe();

        manager.initiate_shutdown(ShutdownReason::Request).await;
        assert!(manager.is_shutting_down().await);
        assert_eq!(receiver.recv().await.unwrap(), ShutdownReason::Request);
    }

    #[tokio::test]
    async fn test_second_initiate_is_ignored() {
        let manager = ShutdownManager::new();
        let mut receiver = manager.subscribe();

        manager.initiate_shutdown(ShutdownReason::Request).await;
        manager
            .initiate_shutdown(ShutdownReason::Error("late".to_string()))
            .await;

        assert_eq!(receiver.recv().await.unwrap(), ShutdownReason::Request);
        assert!(receiver.try_recv().is_err());
    }
}
