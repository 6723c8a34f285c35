use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::common::ElectionId;

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// Whether the election is accepting votes. At most one election is
    /// active at any time.
    pub is_active: bool,
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: ElectionId,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    pub fn new(id: ElectionId, election: NewElection) -> Self {
        Self { id, election }
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionCore {
        pub fn active_example() -> Self {
            Self {
                name: "Council of CR 2025".to_string(),
                is_active: true,
            }
        }

        pub fn inactive_example() -> Self {
            Self {
                name: "Sports Secretary 2024".to_string(),
                is_active: false,
            }
        }
    }
}
