use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::{
    db::{Admin, Voter},
    store::{Storage, StoreResult},
};

/// A user of our application, having defined rights.
#[rocket::async_trait]
pub trait User {
    /// The rights of this user type.
    const RIGHTS: Rights;

    /// Get the user's ID.
    fn id(&self) -> u32;

    /// Does a user of this type with the given ID still exist?
    async fn exists(storage: &Storage, id: u32) -> StoreResult<bool>;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

#[rocket::async_trait]
impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;

    fn id(&self) -> u32 {
        self.id
    }

    async fn exists(storage: &Storage, id: u32) -> StoreResult<bool> {
        Ok(storage.find_voter(id).await?.is_some())
    }
}

#[rocket::async_trait]
impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;

    fn id(&self) -> u32 {
        self.id
    }

    async fn exists(storage: &Storage, id: u32) -> StoreResult<bool> {
        Ok(storage.find_admin(id).await?.is_some())
    }
}
