//! Server configuration for `NodePress`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `NODEPRESS_*` environment variables.

use std::net::SocketAddr;

const DEFAULT_PORT: u16 = 3000;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Public base URL used in e-mail links.
    pub domain: String,
    /// Sender address for account e-mails.
    pub mail_from: String,
}

/// Supported storage backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// Redb persistent storage.
    Redb { path: String },
    /// `RocksDB` persistent storage.
    RocksDb { path: String },
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on, listening on `0.0.0.0`
    /// - `NODEPRESS_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:3000`)
    /// - `NODEPRESS_STORAGE`: `memory`, `redb`, or `rocksdb` (default: `memory`)
    /// - `NODEPRESS_STORAGE_PATH`: path for persistent backends (default: `./data`)
    /// - `NODEPRESS_LOG_LEVEL`: log filter (default: `info`)
    /// - `NODEPRESS_DOMAIN`: public base URL (default: `http://localhost:3000`)
    /// - `NODEPRESS_MAIL_FROM`: sender address (default: `NodePress <no-reply@localhost>`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        // Priority: NODEPRESS_BIND_ADDR > PORT > default 127.0.0.1:3000
        let bind_addr = if let Some(addr) = var("NODEPRESS_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
        } else if let Some(port) = var("PORT") {
            let port: u16 = port.parse().unwrap_or(DEFAULT_PORT);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
        };

        let storage_path = var("NODEPRESS_STORAGE_PATH").unwrap_or_else(|| "./data".to_owned());

        let storage_backend = match var("NODEPRESS_STORAGE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "redb" => StorageBackendType::Redb { path: storage_path },
            "rocksdb" => StorageBackendType::RocksDb { path: storage_path },
            _ => StorageBackendType::Memory,
        };

        let log_level = var("NODEPRESS_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let domain = var("NODEPRESS_DOMAIN")
            .unwrap_or_else(|| format!("http://localhost:{DEFAULT_PORT}"));

        let mail_from = var("NODEPRESS_MAIL_FROM")
            .unwrap_or_else(|| "NodePress <no-reply@localhost>".to_owned());

        Self {
            bind_addr,
            storage_backend,
            log_level,
            domain,
            mail_from,
        }
    }
}
