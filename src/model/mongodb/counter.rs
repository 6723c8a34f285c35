use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use serde::{Deserialize, Serialize};

use crate::model::{mongodb::Coll, store::StoreError};

pub const VOTER_ID_COUNTER: &str = "voter_id";
pub const ADMIN_ID_COUNTER: &str = "admin_id";
pub const ELECTION_ID_COUNTER: &str = "election_id";
pub const CANDIDATE_ID_COUNTER: &str = "candidate_id";

const ALL_COUNTERS: [&str; 4] = [
    VOTER_ID_COUNTER,
    ADMIN_ID_COUNTER,
    ELECTION_ID_COUNTER,
    CANDIDATE_ID_COUNTER,
];

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub name: String,
    pub next: u32,
}

impl Counter {
    /// Atomically retrieve the next value of the named counter.
    pub async fn next(counters: &Coll<Counter>, name: &str) -> Result<u32, StoreError> {
        let counter = counters
            .find_one_and_update(doc! {"_id": name}, Self::increment(), Self::options())
            .await?;
        Self::value_of(counter, name)
    }

    fn increment() -> mongodb::bson::Document {
        doc! {
            "$inc": { "next": 1 }
        }
    }

    fn options() -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build()
    }

    fn value_of(counter: Option<Counter>, name: &str) -> Result<u32, StoreError> {
        counter
            .map(|counter| counter.next)
            .ok_or_else(|| StoreError::not_found(format!("Counter '{name}'")))
    }
}

/// Ensure every ID counter exists, starting at 1. Existing counters are left
/// untouched.
///
/// This operation is idempotent.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> Result<(), DbError> {
    let upsert = UpdateOptions::builder().upsert(true).build();
    for name in ALL_COUNTERS {
        let update = doc! {
            "$setOnInsert": { "next": 1 }
        };
        counters
            .update_one(doc! {"_id": name}, update, upsert.clone())
            .await?;
    }
    Ok(())
}
