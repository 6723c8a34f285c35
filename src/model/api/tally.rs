use serde::{Deserialize, Serialize};

use crate::model::api::election::{CandidateDescription, ElectionDescription};

/// One row of a tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyEntry {
    pub candidate: CandidateDescription,
    pub votes: u64,
}

/// The tally of one election, ranked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election: ElectionDescription,
    pub total_votes: u64,
    pub entries: Vec<TallyEntry>,
}
