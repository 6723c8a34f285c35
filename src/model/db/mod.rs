//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs are stored under `_id`.
//! - Datetimes are serialised in MongoDB's own format.
//!
//! Each record comes in two flavours: a `NewX` core without an ID, and an
//! `X` that pairs the core with its ID and derefs to it.

pub mod admin;
pub mod ballot;
pub mod candidate;
pub mod election;
pub mod voter;

pub use admin::{Admin, NewAdmin};
pub use ballot::{Ballot, NewBallot};
pub use candidate::{Candidate, NewCandidate};
pub use election::{Election, NewElection};
pub use voter::{NewVoter, Voter};
