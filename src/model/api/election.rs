use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    common::{CandidateId, ElectionId},
    db::{Candidate, Election, NewCandidate, NewElection},
};

/// An election as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    /// Open the election for voting straight away, closing any other.
    #[serde(default)]
    pub activate: bool,
}

impl TryFrom<ElectionSpec> for NewElection {
    type Error = Error;

    fn try_from(spec: ElectionSpec) -> Result<Self, Self::Error> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Election name is required".to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            is_active: spec.activate,
        })
    }
}

/// A candidate as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub photo: Option<String>,
}

impl CandidateSpec {
    /// Validate the candidate details and attach them to an election.
    pub fn into_candidate(self, election_id: ElectionId) -> Result<NewCandidate, Error> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Candidate name is required".to_string()));
        }
        let photo = self
            .photo
            .map(|photo| photo.trim().to_string())
            .filter(|photo| !photo.is_empty());
        Ok(NewCandidate::new(election_id, name.to_string(), photo))
    }
}

/// A corrected photo reference for a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoUpdate {
    pub photo: String,
}

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ElectionId,
    pub name: String,
    pub is_active: bool,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            name: election.election.name,
            is_active: election.election.is_active,
        }
    }
}

/// An API-friendly candidate description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: CandidateId,
    pub election_id: ElectionId,
    pub name: String,
    pub photo: String,
    pub withdrawn: bool,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            election_id: candidate.candidate.election_id,
            name: candidate.candidate.name,
            photo: candidate.candidate.photo,
            withdrawn: candidate.candidate.withdrawn,
        }
    }
}

/// What a voter sees before voting: the active election, if any, with the
/// candidates still standing in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterBallot {
    pub election: Option<ElectionDescription>,
    pub candidates: Vec<CandidateDescription>,
    pub has_voted: bool,
}
