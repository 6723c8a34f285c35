//! API-compatible types.
//!
//! The types in this module are what handlers accept and return. They never
//! carry password hashes.

pub mod auth;
pub mod credentials;
pub mod election;
pub mod tally;
pub mod vote;
pub mod voter;
