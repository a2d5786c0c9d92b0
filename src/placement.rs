/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file placement.rs
 * @brief Deterministic key-to-replica placement over a membership snapshot
 */

use sha2::{Digest, Sha256};

use crate::error::{Result, ShardKvError};
use crate::registry::MembershipSnapshot;

// SHA-256(key) as a big-endian unsigned integer, reduced modulo n. The full
// 32-byte digest participates in the reduction, not a truncated prefix.
pub fn primary_index(key: &str, n: usize) -> usize {
    debug_assert!(n > 0);
    let digest = Sha256::digest(key.as_bytes());
    let n = n as u128;
    let mut rem: u128 = 0;
    for byte in digest {
        rem = (rem * 256 + u128::from(byte)) % n;
    }
    rem as usize
}

// The first element is the primary; the rest follow in ring order. Defined
// only over immutable snapshots ordered ascending by worker id.
pub fn placement(key: &str, snapshot: &MembershipSnapshot, replicas: usize) -> Result<Vec<String>> {
    let n = snapshot.len();
    if n == 0 {
        return Err(ShardKvError::NoWorkers);
    }
    let start = primary_index(key, n);
    let count = replicas.min(n);
    Ok((0..count)
        .map(|i| snapshot.address_at((start + i) % n).to_string())
        .collect())
}
