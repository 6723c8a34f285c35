//! The storage seam.
//!
//! Everything the server persists goes through the traits in this module.
//! There are two backends: [`MongoStore`](crate::model::mongodb::MongoStore)
//! for deployments, and [`MemoryStore`](crate::model::memory::MemoryStore) for
//! local development and tests.

use std::{collections::HashMap, ops::Deref, sync::Arc};

use mongodb::error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};
use thiserror::Error;

use crate::model::{
    common::{AdminId, CandidateId, ElectionId, VoterId},
    db::{
        Admin, Candidate, Election, NewAdmin, NewBallot, NewCandidate, NewElection, NewVoter,
        Voter,
    },
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Identity '{0}' is already registered")]
    DuplicateIdentity(String),
    #[error("Candidate '{name}' already stands in election {election_id}")]
    DuplicateCandidate {
        election_id: ElectionId,
        name: String,
    },
    #[error("Admin username already in use: {0}")]
    DuplicateAdmin(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// A concurrent transaction touched the same data. The whole unit of work
    /// may be restarted from the beginning.
    #[error("Transaction conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Db(DbError),
    /// A fault raised by the in-memory backend's fault injection.
    #[error("Injected storage fault at {0}")]
    Fault(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
            Self::Conflict(err.to_string())
        } else {
            Self::Db(err)
        }
    }
}

/// Voter records.
#[rocket::async_trait]
pub trait CredentialStore {
    async fn find_voter(&self, id: VoterId) -> StoreResult<Option<Voter>>;

    async fn find_voter_by_identity(&self, identity: &str) -> StoreResult<Option<Voter>>;

    /// Insert a voter, allocating its ID. Fails with
    /// [`StoreError::DuplicateIdentity`] if the identity is taken.
    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter>;

    /// All voters, in ID order.
    async fn list_voters(&self) -> StoreResult<Vec<Voter>>;
}

/// Admin records.
#[rocket::async_trait]
pub trait AdminStore {
    async fn find_admin(&self, id: AdminId) -> StoreResult<Option<Admin>>;

    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>>;

    /// Insert an admin, allocating its ID. Fails with
    /// [`StoreError::DuplicateAdmin`] if the username is taken.
    async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin>;

    async fn count_admins(&self) -> StoreResult<u64>;
}

/// Elections and their candidates.
#[rocket::async_trait]
pub trait ElectionCatalog {
    /// The election currently accepting votes, if any.
    async fn active_election(&self) -> StoreResult<Option<Election>>;

    async fn find_election(&self, id: ElectionId) -> StoreResult<Option<Election>>;

    /// All elections, newest first.
    async fn list_elections(&self) -> StoreResult<Vec<Election>>;

    /// Insert an election, allocating its ID. If it is active, every other
    /// election is deactivated as part of the same write.
    async fn insert_election(&self, election: NewElection) -> StoreResult<Election>;

    /// Atomically deactivate every other election and activate this one.
    async fn activate_election(&self, id: ElectionId) -> StoreResult<()>;

    async fn deactivate_election(&self, id: ElectionId) -> StoreResult<()>;

    /// Candidates of an election in insertion order, withdrawn ones included.
    async fn list_candidates(&self, election_id: ElectionId) -> StoreResult<Vec<Candidate>>;

    async fn find_candidate(&self, id: CandidateId) -> StoreResult<Option<Candidate>>;

    async fn candidate_belongs_to(
        &self,
        candidate_id: CandidateId,
        election_id: ElectionId,
    ) -> StoreResult<bool>;

    /// Insert a candidate, allocating its ID. Fails with
    /// [`StoreError::NotFound`] for an unknown election and
    /// [`StoreError::DuplicateCandidate`] if the name is taken in it.
    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate>;

    async fn set_candidate_photo(&self, id: CandidateId, photo: &str) -> StoreResult<()>;

    async fn withdraw_candidate(&self, id: CandidateId) -> StoreResult<()>;

    /// Delete the candidate together with every ballot cast for them.
    /// Returns the number of purged ballots.
    async fn delete_candidate(&self, id: CandidateId) -> StoreResult<u64>;
}

/// The append-only record of cast ballots.
#[rocket::async_trait]
pub trait BallotLedger {
    /// Ballot counts per candidate for the election. Candidates without
    /// ballots are absent.
    async fn ballot_counts(&self, election_id: ElectionId)
        -> StoreResult<HashMap<CandidateId, u64>>;

    async fn count_ballots(&self, election_id: ElectionId) -> StoreResult<u64>;
}

/// One vote-casting unit of work.
///
/// Reads observe a consistent view, writes become visible only on
/// [`commit`](VoteTransaction::commit), and dropping the transaction without
/// committing discards them.
#[rocket::async_trait]
pub trait VoteTransaction: Send {
    async fn active_election(&mut self) -> StoreResult<Option<Election>>;

    async fn voter(&mut self, id: VoterId) -> StoreResult<Option<Voter>>;

    /// Does the candidate stand, not withdrawn, in the given election?
    async fn candidate_accepts_votes(
        &mut self,
        candidate_id: CandidateId,
        election_id: ElectionId,
    ) -> StoreResult<bool>;

    /// Compare-and-set `has_voted` from false to true. Returns false, without
    /// writing, if the flag was already set.
    async fn mark_voted(&mut self, id: VoterId) -> StoreResult<bool>;

    async fn append_ballot(&mut self, ballot: NewBallot) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn abort(self: Box<Self>) -> StoreResult<()>;
}

/// A backend able to run vote transactions.
#[rocket::async_trait]
pub trait VoteStore {
    async fn begin_vote<'a>(&'a self) -> StoreResult<Box<dyn VoteTransaction + 'a>>;
}

/// A complete storage backend.
pub trait Store:
    CredentialStore + AdminStore + ElectionCatalog + BallotLedger + VoteStore + Send + Sync
{
}

impl<T> Store for T where
    T: CredentialStore + AdminStore + ElectionCatalog + BallotLedger + VoteStore + Send + Sync
{
}

/// Shared handle on the configured backend; lives in managed state and is
/// available to handlers as a request guard.
#[derive(Clone)]
pub struct Storage(Arc<dyn Store>);

impl Storage {
    pub fn new(store: impl Store + 'static) -> Self {
        Self(Arc::new(store))
    }
}

impl Deref for Storage {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Storage {
    type Error = ();

    /// Get the backend from the managed state.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<Storage>>()
            .await
            .map(|storage| storage.inner().clone())
    }
}
