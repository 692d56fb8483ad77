//! Server configuration from environment variables.

use kg_store::{InMemoryGraphBackend, Neo4jConfig, Neo4jConnector, StoreAdapter, StoreError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8780";
pub const DEFAULT_MIN_TRUST: f64 = 0.7;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var} value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which graph backend the server runs against.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendChoice {
    Neo4j,
    Snapshot(PathBuf),
    /// No store: every endpoint answers with empty results.
    Degraded,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub neo4j: Neo4jConfig,
    /// Default `min_trust` for `search_knowledge` and `/knowledge/search`.
    pub min_trust: f64,
    pub snapshot: Option<PathBuf>,
    /// Interval between SSE `ping` events.
    pub heartbeat: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_raw = var("KG_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let mut listen: SocketAddr = listen_raw.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                var: "KG_LISTEN",
                value: listen_raw.clone(),
                reason: e.to_string(),
            }
        })?;
        if let Some(port) = var("MCP_PORT") {
            let parsed = port.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "MCP_PORT",
                value: port.clone(),
                reason: e.to_string(),
            })?;
            listen.set_port(parsed);
        }

        let min_trust = match var("MIN_TRUST_SCORE") {
            Some(raw) => {
                let parsed = raw.parse::<f64>().map_err(|e| ConfigError::Invalid {
                    var: "MIN_TRUST_SCORE",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
                if !(0.0..=1.0).contains(&parsed) {
                    return Err(ConfigError::Invalid {
                        var: "MIN_TRUST_SCORE",
                        value: raw,
                        reason: "must be within [0, 1]".to_string(),
                    });
                }
                parsed
            }
            None => DEFAULT_MIN_TRUST,
        };

        let heartbeat_secs = match var("KG_HEARTBEAT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        var: "KG_HEARTBEAT_SECS",
                        value: raw,
                        reason: "must be positive".to_string(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "KG_HEARTBEAT_SECS",
                        value: raw,
                        reason: e.to_string(),
                    })
                }
            },
            None => DEFAULT_HEARTBEAT_SECS,
        };

        let defaults = Neo4jConfig::default();
        let neo4j = Neo4jConfig {
            uri: var("NEO4J_URI").unwrap_or(defaults.uri),
            user: var("NEO4J_USER").unwrap_or(defaults.user),
            password: var("NEO4J_PASSWORD").unwrap_or_default(),
            database: var("NEO4J_DATABASE").unwrap_or(defaults.database),
        };

        Ok(Self {
            listen,
            neo4j,
            min_trust,
            snapshot: var("KG_SNAPSHOT").map(PathBuf::from),
            heartbeat: Duration::from_secs(heartbeat_secs),
        })
    }

    /// Neo4j when credentials are set, else the snapshot, else degraded.
    pub fn backend(&self) -> BackendChoice {
        if self.neo4j.has_credentials() {
            BackendChoice::Neo4j
        } else if let Some(path) = &self.snapshot {
            BackendChoice::Snapshot(path.clone())
        } else {
            BackendChoice::Degraded
        }
    }

    /// Build the process-wide store adapter for the configured backend.
    pub async fn connect_store(&self) -> Result<Arc<StoreAdapter>, ConfigError> {
        let adapter = match self.backend() {
            BackendChoice::Neo4j => {
                tracing::info!(uri = %self.neo4j.uri, "using neo4j backend");
                StoreAdapter::shared(Arc::new(Neo4jConnector::new(self.neo4j.clone())))
            }
            BackendChoice::Snapshot(path) => {
                let backend = InMemoryGraphBackend::from_snapshot_file(&path).await?;
                StoreAdapter::shared(Arc::new(backend))
            }
            BackendChoice::Degraded => {
                tracing::warn!("no graph store configured, serving empty results");
                StoreAdapter::unconfigured()
            }
        };
        Ok(Arc::new(adapter))
    }
}
