/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file registry.rs
 * @brief Worker membership registry and failure bookkeeping
 */

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::placement::placement;
use crate::protocol::MappingResponse;
use crate::shardkv_info;

#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub address: String,
    pub last_seen: Instant,
}

// An immutable, ordered capture of the registry. Placement is defined over
// snapshots only, never over the live mutable table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSnapshot {
    entries: Vec<(String, String)>,
}

impl MembershipSnapshot {
    pub fn from_entries(mut entries: Vec<(String, String)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn address_at(&self, index: usize) -> &str {
        &self.entries[index].1
    }

    pub fn address_of(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, address)| address.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn addresses(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(_, address)| address.clone())
            .collect()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    workers: BTreeMap<String, WorkerRecord>,
    down: HashSet<String>,
}

impl RegistryInner {
    fn snapshot(&self) -> MembershipSnapshot {
        MembershipSnapshot::from_entries(
            self.workers
                .iter()
                .map(|(id, record)| (id.clone(), record.address.clone()))
                .collect(),
        )
    }
}

pub struct MembershipRegistry {
    inner: Mutex<RegistryInner>,
    replicas: usize,
    seed_workers: Vec<String>,
}

impl MembershipRegistry {
    pub fn new(replicas: usize, seed_workers: Vec<String>) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            replicas,
            seed_workers,
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    // Upsert; a heartbeat with a new address for a known id overwrites it
    // (most recent wins). Returns true when the id was not registered before.
    pub fn heartbeat(&self, id: &str, address: &str) -> bool {
        let mut inner = self.inner.lock();
        let record = WorkerRecord {
            address: address.to_string(),
            last_seen: Instant::now(),
        };
        inner.workers.insert(id.to_string(), record).is_none()
    }

    pub fn list_workers(&self) -> BTreeMap<String, String> {
        let inner = self.inner.lock();
        inner
            .workers
            .iter()
            .map(|(id, record)| (id.clone(), record.address.clone()))
            .collect()
    }

    pub fn workers_count(&self) -> usize {
        self.inner.lock().workers.len()
    }

    pub fn snapshot(&self) -> MembershipSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn is_down(&self, id: &str) -> bool {
        self.inner.lock().down.contains(id)
    }

    // Replica set for a key over the current live membership. An empty
    // registry is seeded from the configured fallback list first; the seeded
    // entries get a fresh last_seen so the failure detector clears the ones
    // that never heartbeat.
    pub fn mapping(&self, key: &str) -> Result<MappingResponse> {
        let snapshot = {
            let mut inner = self.inner.lock();
            if inner.workers.is_empty() && !self.seed_workers.is_empty() {
                let now = Instant::now();
                for (i, address) in self.seed_workers.iter().enumerate() {
                    inner.workers.insert(
                        format!("w{}", i),
                        WorkerRecord {
                            address: address.clone(),
                            last_seen: now,
                        },
                    );
                }
                shardkv_info!(
                    "registry empty; seeded {} fallback workers",
                    self.seed_workers.len()
                );
            }
            inner.snapshot()
        };

        let replicas = placement(key, &snapshot, self.replicas)?;
        Ok(MappingResponse {
            primary: replicas[0].clone(),
            replicas,
        })
    }

    // Failure-detector core. For every entry whose heartbeat is older than
    // the timeout and whose id is not yet in the down set: mark it down,
    // capture a pre-removal snapshot of the whole registry, then remove the
    // entry. The snapshot is captured before removal so repair can compute
    // the replica sets coordinators used at write time.
    pub fn expire_workers(&self, timeout: Duration) -> Vec<(String, MembershipSnapshot)> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .workers
            .iter()
            .filter(|(id, record)| {
                now.duration_since(record.last_seen) > timeout && !inner.down.contains(*id)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut failures = Vec::with_capacity(expired.len());
        for id in expired {
            inner.down.insert(id.clone());
            let snapshot = inner.snapshot();
            inner.workers.remove(&id);
            failures.push((id, snapshot));
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_registers_and_updates() {
        let registry = MembershipRegistry::new(3, vec![]);
        assert!(registry.heartbeat("w1", "http://localhost:8001"));
        assert!(!registry.heartbeat("w1", "http://localhost:8001"));
        assert_eq!(registry.workers_count(), 1);

        // Most recent address wins.
        registry.heartbeat("w1", "http://localhost:9001");
        let workers = registry.list_workers();
        assert_eq!(workers["w1"], "http://localhost:9001");
    }

    #[test]
    fn test_snapshot_is_ordered_by_id() {
        let registry = MembershipRegistry::new(3, vec![]);
        registry.heartbeat("w2", "http://b");
        registry.heartbeat("w0", "http://a");
        registry.heartbeat("w1", "http://c");
        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.addresses(),
            vec!["http://a", "http://c", "http://b"]
        );
    }

    #[test]
    fn test_mapping_empty_registry_fails() {
        let registry = MembershipRegistry::new(3, vec![]);
        assert!(registry.mapping("x").is_err());
    }

    #[test]
    fn test_mapping_seeds_fallback_workers() {
        let seeds = vec![
            "http://s0".to_string(),
            "http://s1".to_string(),
            "http://s2".to_string(),
            "http://s3".to_string(),
        ];
        let registry = MembershipRegistry::new(3, seeds);
        let mapping = registry.mapping("x").unwrap();
        assert_eq!(mapping.replicas.len(), 3);
        assert_eq!(mapping.primary, mapping.replicas[0]);
        assert_eq!(registry.workers_count(), 4);
    }

    #[test]
    fn test_expire_workers_marks_down_once() {
        let registry = MembershipRegistry::new(3, vec![]);
        registry.heartbeat("w1", "http://a");
        registry.heartbeat("w2", "http://b");
        std::thread::sleep(Duration::from_millis(30));
        registry.heartbeat("w2", "http://b");

        let failures = registry.expire_workers(Duration::from_millis(10));
        assert_eq!(failures.len(), 1);
        let (failed_id, snapshot) = &failures[0];
        assert_eq!(failed_id, "w1");
        // The pre-removal snapshot still contains the failed worker.
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.address_of("w1"), Some("http://a"));
        // The registry itself no longer does.
        assert_eq!(registry.workers_count(), 1);
        assert!(registry.is_down("w1"));

        // A second scan does not trigger again for the same failure event.
        assert!(registry.expire_workers(Duration::from_millis(10)).is_empty());
    }

    #[test]
    fn test_returning_worker_reenters_but_stays_down() {
        let registry = MembershipRegistry::new(3, vec![]);
        registry.heartbeat("w1", "http://a");
        std::thread::sleep(Duration::from_millis(20));
        let failures = registry.expire_workers(Duration::from_millis(5));
        assert_eq!(failures.len(), 1);

        registry.heartbeat("w1", "http://a");
        assert_eq!(registry.workers_count(), 1);
        // Down-set entries persist until process restart; they only suppress
        // repeated repair triggers, not liveness.
        assert!(registry.is_down("w1"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(registry.expire_workers(Duration::from_millis(5)).is_empty());
    }
}
