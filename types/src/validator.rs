use serde::{Deserialize, Serialize};

/// A permissioned validator as listed in every node's configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub id: String,
    /// Shared secret standing in for the validator's signing key.
    pub secret: String,
    /// `host:port` of the validator's P2P listener.
    pub address: String,
}
