use rocket::{
    http::Status,
    response::{self, Responder, Response},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::voting::{VoteError, VoteStatus};

/// The vote form. The selection is kept raw; the engine parses it.
#[derive(Debug, Clone, FromForm)]
pub struct VoteForm {
    pub candidate: Option<String>,
}

/// Every distinguishable result of a vote submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    Accepted,
    AlreadyVoted,
    NoActiveElection,
    InvalidCandidate,
    MalformedSelection,
    PersistenceError,
    Unauthenticated,
}

impl VoteOutcome {
    pub fn status(self) -> Status {
        match self {
            Self::Accepted | Self::AlreadyVoted => Status::Ok,
            Self::NoActiveElection => Status::NotFound,
            Self::InvalidCandidate => Status::UnprocessableEntity,
            Self::MalformedSelection => Status::BadRequest,
            Self::PersistenceError => Status::ServiceUnavailable,
            Self::Unauthenticated => Status::Unauthorized,
        }
    }

    /// A message fit to show the voter.
    pub fn message(self) -> &'static str {
        match self {
            Self::Accepted => "Thank you, your vote has been recorded.",
            Self::AlreadyVoted => "You have already voted in this election.",
            Self::NoActiveElection => "There is no election open for voting right now.",
            Self::InvalidCandidate => "That candidate is not standing in this election.",
            Self::MalformedSelection => "Please select a candidate.",
            Self::PersistenceError => {
                "Your vote could not be recorded. Please try again in a moment."
            }
            Self::Unauthenticated => "Please log in to vote.",
        }
    }
}

impl From<&VoteError> for VoteOutcome {
    fn from(err: &VoteError) -> Self {
        match err {
            VoteError::UnauthenticatedVoter => Self::Unauthenticated,
            VoteError::MalformedSelection(_) => Self::MalformedSelection,
            VoteError::NoActiveElection => Self::NoActiveElection,
            VoteError::InvalidCandidate { .. } => Self::InvalidCandidate,
            VoteError::Persistence(_) => Self::PersistenceError,
        }
    }
}

impl From<VoteStatus> for VoteOutcome {
    fn from(status: VoteStatus) -> Self {
        match status {
            VoteStatus::Accepted => Self::Accepted,
            VoteStatus::AlreadyVoted => Self::AlreadyVoted,
        }
    }
}

/// The JSON body returned for a vote submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReport {
    pub outcome: VoteOutcome,
    pub message: String,
}

impl From<VoteOutcome> for VoteReport {
    fn from(outcome: VoteOutcome) -> Self {
        Self {
            outcome,
            message: outcome.message().to_string(),
        }
    }
}

impl From<Result<VoteStatus, VoteError>> for VoteReport {
    fn from(result: Result<VoteStatus, VoteError>) -> Self {
        match result {
            Ok(status) => VoteOutcome::from(status).into(),
            Err(err) => VoteOutcome::from(&err).into(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for VoteReport {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.outcome.status();
        Response::build_from(Json(self).respond_to(req)?)
            .status(status)
            .ok()
    }
}
