/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file store.rs
 * @brief Per-worker replica store with per-key file persistence
 */

use parking_lot::RwLock;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::client::PeerClient;
use crate::error::{Result, ShardKvError};
use crate::{shardkv_debug, shardkv_warn};

#[derive(Debug, Serialize, Deserialize)]
struct PersistedValue {
    value: String,
}

// Filenames are fully percent-encoded, so a persisted key never produces a
// path separator and never starts with a dot; dot-prefixed names are temp
// files and are skipped on load.
fn encode_file_name(key: &str) -> String {
    utf8_percent_encode(key, NON_ALPHANUMERIC).to_string()
}

fn decode_file_name(name: &str) -> Option<String> {
    percent_decode_str(name)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

pub struct ReplicaStore {
    entries: RwLock<HashMap<String, String>>,
    data_dir: PathBuf,
}

impl ReplicaStore {
    // Loads every persisted key before the store serves traffic.
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await?;
        let store = Self {
            entries: RwLock::new(HashMap::new()),
            data_dir,
        };
        store.load_persisted().await?;
        Ok(store)
    }

    async fn load_persisted(&self) -> Result<()> {
        let mut dir = tokio::fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let Some(key) = decode_file_name(&name) else {
                shardkv_warn!("skipping data file with undecodable name {}", name);
                continue;
            };
            match tokio::fs::read(entry.path()).await {
                Ok(bytes) => match serde_json::from_slice::<PersistedValue>(&bytes) {
                    Ok(persisted) => {
                        self.entries.write().insert(key, persisted.value);
                    }
                    Err(err) => {
                        shardkv_warn!("skipping corrupt data file {}: {}", name, err);
                    }
                },
                Err(err) => {
                    shardkv_warn!("failed reading data file {}: {}", name, err);
                }
            }
        }
        Ok(())
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        self.persist(key, value).await
    }

    // Unique temp path then rename, so a concurrent writer or a crash never
    // leaves a torn file behind.
    async fn persist(&self, key: &str, value: &str) -> Result<()> {
        let body = serde_json::to_vec(&PersistedValue {
            value: value.to_string(),
        })?;
        let file_name = encode_file_name(key);
        let temp_name = format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple());
        let temp_path = self.data_dir.join(temp_name);
        let final_path = self.data_dir.join(file_name);
        tokio::fs::write(&temp_path, &body).await?;
        tokio::fs::rename(&temp_path, &final_path).await?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<String> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or(ShardKvError::NotFound)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        let path = self.data_dir.join(encode_file_name(key));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    // Pull keys from a source replica; per-key failures are ignored. The
    // returned count is the number of keys requested, not fetched.
    pub async fn pull_from(&self, client: &PeerClient, source: &str, keys: &[String]) -> usize {
        for key in keys {
            match client.fetch_value(source, key).await {
                Ok(value) => {
                    if let Err(err) = self.put(key, &value).await {
                        shardkv_warn!("failed storing pulled key {}: {}", key, err);
                    }
                }
                Err(err) => {
                    shardkv_debug!("pull of {} from {} failed: {}", key, source, err);
                }
            }
        }
        keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = ReplicaStore::open(dir.path()).await.unwrap();

        store.put("k1", "v1").await.unwrap();
        assert_eq!(store.get("k1").unwrap(), "v1");
        assert_eq!(store.len(), 1);

        store.put("k1", "v2").await.unwrap();
        assert_eq!(store.get("k1").unwrap(), "v2");

        store.delete("k1").await.unwrap();
        assert!(matches!(store.get("k1"), Err(ShardKvError::NotFound)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = ReplicaStore::open(dir.path()).await.unwrap();
            store.put("alpha", "1").await.unwrap();
            store.put("beta", "2").await.unwrap();
            store.put("with spaces/and:colons", "3").await.unwrap();
        }

        let reopened = ReplicaStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.get("alpha").unwrap(), "1");
        assert_eq!(reopened.get("beta").unwrap(), "2");
        assert_eq!(reopened.get("with spaces/and:colons").unwrap(), "3");
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let dir = TempDir::new().unwrap();
        {
            let store = ReplicaStore::open(dir.path()).await.unwrap();
            store.put("gone", "x").await.unwrap();
            store.delete("gone").await.unwrap();
            // Deleting an absent key is not an error.
            store.delete("never-there").await.unwrap();
        }

        let reopened = ReplicaStore::open(dir.path()).await.unwrap();
        assert!(reopened.is_empty());
    }

    #[tokio::test]
    async fn test_leftover_temp_files_ignored() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join(".k1.deadbeef.tmp"), b"{\"value\":\"x\"}")
            .await
            .unwrap();
        let store = ReplicaStore::open(dir.path()).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_skipped() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("good"), b"{\"value\":\"ok\"}")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("bad"), b"not json")
            .await
            .unwrap();
        let store = ReplicaStore::open(dir.path()).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("good").unwrap(), "ok");
    }

    #[test]
    fn test_file_name_round_trip() {
        for key in ["plain", "a/b", "a b+c", "%41", "über"] {
            let encoded = encode_file_name(key);
            assert!(!encoded.contains('/'));
            assert!(!encoded.starts_with('.'));
            assert_eq!(decode_file_name(&encoded).unwrap(), key);
        }
    }
}
