use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, ElectionId, DEFAULT_PHOTO};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// Foreign Key election ID.
    pub election_id: ElectionId,
    /// Candidate name, unique within the election.
    pub name: String,
    /// Photo reference, resolved by whoever renders the ballot.
    pub photo: String,
    /// Withdrawn candidates keep their ballots but cannot receive new ones.
    #[serde(default)]
    pub withdrawn: bool,
}

impl CandidateCore {
    pub fn new(election_id: ElectionId, name: String, photo: Option<String>) -> Self {
        Self {
            election_id,
            name,
            photo: photo.unwrap_or_else(|| DEFAULT_PHOTO.to_string()),
            withdrawn: false,
        }
    }

    /// Can this candidate receive a vote in the given election?
    pub fn accepts_votes_in(&self, election_id: ElectionId) -> bool {
        self.election_id == election_id && !self.withdrawn
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: CandidateId,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Candidate {
    pub fn new(id: CandidateId, candidate: NewCandidate) -> Self {
        Self { id, candidate }
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
