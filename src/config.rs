/*
 * Copyright (c) 2025 pgElephant. All rights reserved.
 *
 * ShardKV - Sharded, replicated key-value store with quorum writes
 * Built with Rust for superior performance and reliability
 *
 * @file config.rs
 * @brief ShardKV configuration management
 */

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::logger::LogLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow::anyhow!("bind address {} did not resolve", addr))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub detailed: bool,
}

impl LoggingConfig {
    pub fn log_level(&self) -> LogLevel {
        self.level.parse().unwrap_or(LogLevel::Info)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            detailed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipConfig {
    pub replicas: usize,
    pub heartbeat_timeout_secs: f64,
    pub check_interval_secs: f64,
    pub repair_timeout_secs: f64,
    pub seed_workers: Vec<String>,
}

impl MembershipConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval_secs)
    }

    pub fn repair_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.repair_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub server: ServerConfig,
    pub membership: MembershipConfig,
    pub logging: LoggingConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            membership: MembershipConfig {
                replicas: 3,
                heartbeat_timeout_secs: 6.0,
                check_interval_secs: 2.0,
                repair_timeout_secs: 3.0,
                seed_workers: vec![
                    "http://localhost:8001".to_string(),
                    "http://localhost:8002".to_string(),
                    "http://localhost:8003".to_string(),
                    "http://localhost:8004".to_string(),
                ],
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn load_from_env() -> Result<Self> {
        let mut config = ControllerConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config: ControllerConfig = read_config_file(path.as_ref()).await?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_config_file(path.as_ref(), self).await
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port.parse()?;
        }
        if let Ok(workers) = std::env::var("WORKERS") {
            self.membership.seed_workers = workers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(replicas) = std::env::var("REPLICAS") {
            self.membership.replicas = replicas.parse()?;
        }
        if let Ok(timeout) = std::env::var("HEARTBEAT_TIMEOUT") {
            self.membership.heartbeat_timeout_secs = timeout.parse()?;
        }
        if let Ok(interval) = std::env::var("CHECK_INTERVAL") {
            self.membership.check_interval_secs = interval.parse()?;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.membership.replicas == 0 {
            return Err(anyhow::anyhow!("replicas must be greater than 0"));
        }
        if self.membership.heartbeat_timeout_secs <= 0.0 {
            return Err(anyhow::anyhow!("heartbeat_timeout must be greater than 0"));
        }
        if self.membership.check_interval_secs <= 0.0 {
            return Err(anyhow::anyhow!("check_interval must be greater than 0"));
        }
        self.server.bind_addr()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerClusterConfig {
    pub controller: String,
    pub address: String,
    pub id: String,
    pub write_quorum: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    pub request_timeout_secs: f64,
    pub max_controller_retries: u32,
    pub retry_backoff_secs: f64,
    pub heartbeat_interval_secs: f64,
}

impl ReplicationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub server: ServerConfig,
    pub cluster: WorkerClusterConfig,
    pub replication: ReplicationConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let id = format!("worker-{}", Uuid::new_v4().simple());
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8001,
            },
            cluster: WorkerClusterConfig {
                controller: "http://localhost:8000".to_string(),
                address: "http://localhost:8001".to_string(),
                write_quorum: 2,
                id: id.clone(),
            },
            replication: ReplicationConfig {
                request_timeout_secs: 2.0,
                max_controller_retries: 5,
                retry_backoff_secs: 0.3,
                heartbeat_interval_secs: 2.0,
            },
            storage: StorageConfig {
                data_dir: format!("data_{}", id),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn load_from_env() -> Result<Self> {
        let mut config = WorkerConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config: WorkerConfig = read_config_file(path.as_ref()).await?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_config_file(path.as_ref(), self).await
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(controller) = std::env::var("CONTROLLER") {
            self.cluster.controller = controller;
        }
        if let Ok(id) = std::env::var("ID") {
            self.storage.data_dir = format!("data_{}", id);
            self.cluster.id = id;
        }
        if let Ok(address) = std::env::var("ADDRESS") {
            let (host, port) = parse_http_address(&address)?;
            self.server.host = host;
            self.server.port = port;
            self.cluster.address = address;
        }
        if let Ok(bind) = std::env::var("BIND") {
            let (host, port) = bind
                .rsplit_once(':')
                .ok_or_else(|| anyhow::anyhow!("BIND must be host:port, got {}", bind))?;
            self.server.host = host.to_string();
            self.server.port = port.parse()?;
        }
        if let Ok(quorum) = std::env::var("WRITE_QUORUM") {
            self.cluster.write_quorum = quorum.parse()?;
        }
        if let Ok(timeout) = std::env::var("REQUEST_TIMEOUT") {
            self.replication.request_timeout_secs = timeout.parse()?;
        }
        if let Ok(data_dir) = std::env::var("DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster.write_quorum == 0 {
            return Err(anyhow::anyhow!("write_quorum must be greater than 0"));
        }
        if self.cluster.id.is_empty() {
            return Err(anyhow::anyhow!("worker id must not be empty"));
        }
        if self.cluster.controller.is_empty() {
            return Err(anyhow::anyhow!("controller URL must not be empty"));
        }
        if self.replication.request_timeout_secs <= 0.0 {
            return Err(anyhow::anyhow!("request_timeout must be greater than 0"));
        }
        parse_http_address(&self.cluster.address)?;
        self.server.bind_addr()?;
        Ok(())
    }
}

// Accepts an advertised URL such as http://127.0.0.1:8001 and returns the
// host and port a server socket can bind.
pub fn parse_http_address(address: &str) -> Result<(String, u16)> {
    let trimmed = address.trim_end_matches('/');
    let without_scheme = match trimmed.split_once("://") {
        Some((_, rest)) => rest,
        None => trimmed,
    };
    let (host, port) = without_scheme
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("address {} has no port", address))?;
    if host.is_empty() {
        return Err(anyhow::anyhow!("address {} has no host", address));
    }
    Ok((host.to_string(), port.parse()?))
}

async fn read_config_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path).await?;

    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        _ => toml::from_str(&content)?,
    };

    Ok(config)
}

async fn write_config_file<T: Serialize>(path: &Path, config: &T) -> Result<()> {
    let content = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::to_string_pretty(config)?,
        Some("yaml") | Some("yml") => serde_yaml::to_string(config)?,
        Some("toml") => toml::to_string_pretty(config)?,
        _ => toml::to_string_pretty(config)?,
    };

    tokio::fs::write(path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.membership.replicas, 3);
        assert_eq!(config.membership.heartbeat_timeout_secs, 6.0);
        assert_eq!(config.membership.check_interval_secs, 2.0);
        assert_eq!(config.membership.seed_workers.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worker_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.cluster.write_quorum, 2);
        assert_eq!(config.replication.request_timeout_secs, 2.0);
        assert!(config.cluster.id.starts_with("worker-"));
        assert_eq!(config.storage.data_dir, format!("data_{}", config.cluster.id));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_quorum() {
        let mut config = WorkerConfig::default();
        config.cluster.write_quorum = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_replicas() {
        let mut config = ControllerConfig::default();
        config.membership.replicas = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_http_address() {
        assert_eq!(
            parse_http_address("http://127.0.0.1:8001").unwrap(),
            ("127.0.0.1".to_string(), 8001)
        );
        assert_eq!(
            parse_http_address("http://localhost:9000/").unwrap(),
            ("localhost".to_string(), 9000)
        );
        assert!(parse_http_address("http://nohost").is_err());
    }
}
