//! Voting workflow: registration and login, vote casting, and tallying.

pub mod credentials;
mod engine;
pub mod tally;

pub use engine::{cast_vote, parse_selection, VoteError, VoteStatus, MAX_CONFLICT_RESTARTS};
