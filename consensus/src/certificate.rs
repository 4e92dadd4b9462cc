//! Vote-collection seam.
//!
//! A [`Certifier`] decides what proof accompanies a block. The current
//! [`LeaderCertifier`] collects no votes: the certificate holds the header
//! hash and the proposer's own signature. A multi-phase protocol that
//! gathers follower signatures would replace it here without touching the
//! transport or the ledger.

use sehat_crypto::hash_header;
use sehat_types::{Block, BlockHeader, QuorumCertificate};

use crate::{ConsensusError, ConsensusHost, ValidatorSet};

pub trait Certifier: Send + Sync {
    /// Certificate for a header this node proposes.
    fn certify(&self, header: &BlockHeader, host: &dyn ConsensusHost) -> QuorumCertificate;

    /// Check the certificate of a block received from a peer.
    fn verify(&self, block: &Block, validators: &ValidatorSet) -> Result<(), ConsensusError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LeaderCertifier;

impl Certifier for LeaderCertifier {
    fn certify(&self, header: &BlockHeader, host: &dyn ConsensusHost) -> QuorumCertificate {
        let header_hash = hash_header(header);
        let signature = host.sign(header_hash.as_bytes());
        QuorumCertificate {
            header_hash,
            signatures: [(header.proposer_id.clone(), signature)].into_iter().collect(),
        }
    }

    fn verify(&self, block: &Block, validators: &ValidatorSet) -> Result<(), ConsensusError> {
        let height = block.header.height;
        let bad = |reason: &str| ConsensusError::BadCertificate {
            height,
            reason: reason.to_string(),
        };

        let header_hash = hash_header(&block.header);
        if block.certificate.header_hash != header_hash {
            return Err(bad("header hash mismatch"));
        }
        let proposer = &block.header.proposer_id;
        let signature = block
            .certificate
            .signatures
            .get(proposer)
            .ok_or_else(|| bad("missing proposer signature"))?;
        let credential = validators
            .credential(proposer)
            .ok_or_else(|| bad("proposer is not a validator"))?;
        if !credential.verify(header_hash.as_bytes(), signature) {
            return Err(bad("invalid proposer signature"));
        }
        Ok(())
    }
}
