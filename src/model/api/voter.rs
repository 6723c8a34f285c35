use serde::{Deserialize, Serialize};

use crate::model::{common::VoterId, db::Voter};

/// A voter as shown to admins. Password hashes are never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterSummary {
    pub id: VoterId,
    pub identity: String,
    pub has_voted: bool,
}

impl From<Voter> for VoterSummary {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id,
            identity: voter.voter.identity,
            has_voted: voter.voter.has_voted,
        }
    }
}

/// Result of bulk provisioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    /// Identities newly created.
    pub created: Vec<String>,
    /// Identities that already existed and were left untouched.
    pub skipped: Vec<String>,
    /// Identities of entries that failed validation. Nothing was written
    /// for them.
    pub rejected: Vec<String>,
}
