//! Types shared between the API and database representations.

/// Voter IDs are allocated sequentially from 1.
pub type VoterId = u32;

/// Admin IDs are allocated sequentially from 1.
pub type AdminId = u32;

/// Election IDs are allocated sequentially from 1.
pub type ElectionId = u32;

/// Candidate IDs are allocated sequentially from 1, across all elections,
/// so ordering by ID is ordering by insertion.
pub type CandidateId = u32;

/// Photo used for candidates added without one.
pub const DEFAULT_PHOTO: &str = "default.png";
