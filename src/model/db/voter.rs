use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::common::VoterId;

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Externally issued identity, e.g. a college roll number. Unique.
    pub identity: String,
    /// Argon2 encoded password hash.
    pub password_hash: String,
    /// Flipped from false to true exactly once, by the vote transaction.
    pub has_voted: bool,
}

impl VoterCore {
    /// Create a voter who has not yet voted.
    pub fn new(identity: String, password_hash: String) -> Self {
        Self {
            identity,
            password_hash,
            has_voted: false,
        }
    }

    /// Check whether the given password is correct.
    /// A malformed stored hash never verifies.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: VoterId,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Voter {
    pub fn new(id: VoterId, voter: NewVoter) -> Self {
        Self { id, voter }
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
