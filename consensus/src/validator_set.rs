use sehat_crypto::Credential;
use sehat_types::ValidatorConfig;

use crate::ConsensusError;

struct Member {
    id: String,
    credential: Credential,
}

/// The fixed validator list, sorted by id. Identical on every node that
/// is configured with the same validators.
pub struct ValidatorSet {
    members: Vec<Member>,
}

impl ValidatorSet {
    /// Build from configuration. Duplicate ids keep their first entry.
    pub fn new(validators: &[ValidatorConfig]) -> Result<Self, ConsensusError> {
        let mut members: Vec<Member> = Vec::with_capacity(validators.len());
        for v in validators {
            if members.iter().any(|m| m.id == v.id) {
                continue;
            }
            members.push(Member {
                id: v.id.clone(),
                credential: Credential::new(&v.secret),
            });
        }
        if members.is_empty() {
            return Err(ConsensusError::EmptyValidatorSet);
        }
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self { members })
    }

    /// `sorted[height mod N]`.
    pub fn leader_for(&self, height: u64) -> &str {
        let index = (height % self.members.len() as u64) as usize;
        &self.members[index].id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    pub fn credential(&self, id: &str) -> Option<&Credential> {
        self.members
            .iter()
            .find(|m| m.id == id)
            .map(|m| &m.credential)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
