//! Shared-secret signing.
//!
//! Every validator's secret is distributed in configuration, so any node
//! can check any validator's signature. This is a trust stand-in, not
//! public-key cryptography.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SECRET_CHECK_LABEL: &[u8] = b"sehat-secret-check";

/// A node's signing secret.
#[derive(Clone)]
pub struct Credential {
    secret: Vec<u8>,
}

impl Credential {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Hex-encoded HMAC-SHA256 of `data` under this secret.
    pub fn sign(&self, data: &[u8]) -> String {
        match HmacSha256::new_from_slice(&self.secret) {
            Ok(mut mac) => {
                mac.update(data);
                hex::encode(mac.finalize().into_bytes())
            }
            Err(_) => String::new(),
        }
    }

    /// Constant-time check of a hex signature produced by [`Credential::sign`].
    pub fn verify(&self, data: &[u8], signature: &str) -> bool {
        let Ok(bytes) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(data);
        mac.verify_slice(&bytes).is_ok()
    }

    /// Whether `secret` is this credential's secret. Compares HMAC tags of a
    /// fixed label in constant time rather than the raw bytes.
    pub fn matches_secret(&self, secret: &str) -> bool {
        let Ok(mut own) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        own.update(SECRET_CHECK_LABEL);
        let expected = own.finalize().into_bytes();

        let Ok(mut candidate) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        candidate.update(SECRET_CHECK_LABEL);
        candidate.verify_slice(&expected).is_ok()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(..)")
    }
}
