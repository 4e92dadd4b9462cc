//! Cryptographic primitives for the Sehat claims chain.
//!
//! - **Blake2b-256** for header, transaction, and state hashing
//! - **HMAC-SHA256** over a validator's shared secret as a stand-in for
//!   public-key signatures

pub mod hash;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi, hash_header, hash_transaction, tx_root};
pub use sign::Credential;
