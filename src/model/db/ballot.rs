use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CandidateId, ElectionId},
    mongodb::Id,
};

/// Core ballot data, as stored in the database.
///
/// Ballots carry no reference to the voter who cast them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCore {
    /// Foreign Key election ID.
    pub election_id: ElectionId,
    /// Foreign Key candidate ID.
    pub candidate_id: CandidateId,
    /// When the ballot was cast.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl BallotCore {
    /// A ballot for the given candidate, cast now.
    pub fn new(election_id: ElectionId, candidate_id: CandidateId) -> Self {
        Self {
            election_id,
            candidate_id,
            timestamp: Utc::now(),
        }
    }
}

/// A ballot without an ID.
pub type NewBallot = BallotCore;

/// A ballot from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub ballot: BallotCore,
}

impl Deref for Ballot {
    type Target = BallotCore;

    fn deref(&self) -> &Self::Target {
        &self.ballot
    }
}
