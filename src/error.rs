/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file error.rs
 * @brief ShardKV error handling
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardKvError {
    #[error("no available workers")]
    NoWorkers,

    #[error("controller unavailable: {0}")]
    ControllerUnavailable(String),

    #[error("write failed; acks={acks}")]
    QuorumUnreached { acks: usize },

    #[error("not found")]
    NotFound,

    #[error("peer request failed: {0}")]
    Peer(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ShardKvError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoWorkers => "no_workers",
            Self::ControllerUnavailable(_) => "controller_unavailable",
            Self::QuorumUnreached { .. } => "quorum_unreached",
            Self::NotFound => "not_found",
            Self::Peer(_) => "peer",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
        }
    }

    // Only NoWorkers, ControllerUnavailable, QuorumUnreached and NotFound
    // surface to clients; everything else maps to a generic 500.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NoWorkers => 503,
            Self::ControllerUnavailable(_) => 503,
            Self::QuorumUnreached { .. } => 503,
            Self::NotFound => 404,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShardKvError>;
