//! Node configuration with TOML file support.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sehat_types::ValidatorConfig;

use crate::NodeError;

/// Configuration for a Sehat node.
///
/// Loaded from a TOML file via [`NodeConfig::from_toml_file`] or built
/// programmatically (e.g. for tests). Every node in a network must list the
/// same validators.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's identity. Validators use their configured id.
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Shared secret used for handshakes and the mock signature.
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Port to listen on for P2P connections. 0 picks an ephemeral port.
    #[serde(default = "default_p2p_port")]
    pub port: u16,

    /// Mempool size that triggers a round, and the most transactions a
    /// block may carry.
    #[serde(default = "default_max_block_txs")]
    pub max_block_txs: usize,

    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_validators")]
    pub validators: Vec<ValidatorConfig>,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

/// Outbound connection policy towards the other validators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Handshake attempts per validator before giving up.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// How long the peer with the greater id waits for the other side to
    /// dial first.
    #[serde(default = "default_tie_break_wait_ms")]
    pub tie_break_wait_ms: u64,

    /// Pause between connecting and starting catch-up sync.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Catch-up sync timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Delay before retrying a height no peer served.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pause between consecutive block fetches.
    #[serde(default = "default_fetch_pause_ms")]
    pub fetch_pause_ms: u64,

    /// Consecutive rounds without progress before sync gives up.
    #[serde(default = "default_max_idle_rounds")]
    pub max_idle_rounds: u32,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_node_id() -> String {
    "validator-1".to_string()
}

fn default_secret() -> String {
    "secret-validator-1".to_string()
}

fn default_p2p_port() -> u16 {
    9001
}

fn default_max_block_txs() -> usize {
    1
}

fn default_handshake_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_validators() -> Vec<ValidatorConfig> {
    (1..=3)
        .map(|i| ValidatorConfig {
            id: format!("validator-{i}"),
            secret: format!("secret-validator-{i}"),
            address: format!("127.0.0.1:{}", 9000 + i),
        })
        .collect()
}

fn default_attempts() -> u32 {
    10
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_tie_break_wait_ms() -> u64 {
    2_000
}

fn default_settle_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    2_000
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_fetch_pause_ms() -> u64 {
    50
}

fn default_max_idle_rounds() -> u32 {
    30
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Whether this node's id appears in the validator list.
    pub fn is_validator(&self) -> bool {
        self.validators.iter().any(|v| v.id == self.node_id)
    }

    /// Validators other than this node.
    pub fn other_validators(&self) -> impl Iterator<Item = &ValidatorConfig> {
        self.validators.iter().filter(move |v| v.id != self.node_id)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if self.node_id.trim().is_empty() {
            return Err(NodeError::Config("node_id must not be empty".into()));
        }
        if self.secret.is_empty() {
            return Err(NodeError::Config("secret must not be empty".into()));
        }
        if self.validators.is_empty() {
            return Err(NodeError::Config("at least one validator is required".into()));
        }
        if self.max_block_txs == 0 {
            return Err(NodeError::Config("max_block_txs must be at least 1".into()));
        }
        let mut seen = HashSet::new();
        for v in &self.validators {
            if v.id.trim().is_empty() {
                return Err(NodeError::Config("validator id must not be empty".into()));
            }
            if !seen.insert(v.id.as_str()) {
                return Err(NodeError::Config(format!("duplicate validator id {}", v.id)));
            }
            if v.id == self.node_id && v.secret != self.secret {
                return Err(NodeError::Config(format!(
                    "secret does not match validator entry {}",
                    v.id
                )));
            }
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            secret: default_secret(),
            port: default_p2p_port(),
            max_block_txs: default_max_block_txs(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            validators: default_validators(),
            bootstrap: BootstrapConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
            tie_break_wait_ms: default_tie_break_wait_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            fetch_pause_ms: default_fetch_pause_ms(),
            max_idle_rounds: default_max_idle_rounds(),
        }
    }
}
