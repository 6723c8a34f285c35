//! In-memory storage backend, for local development and tests.
//!
//! All tables sit behind a single async mutex. A vote transaction holds the
//! lock for its whole duration, which makes every transaction serializable.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use rocket::tokio::sync::{Mutex, MutexGuard};

use crate::model::{
    common::{AdminId, CandidateId, ElectionId, VoterId},
    db::{
        Admin, Ballot, Candidate, Election, NewAdmin, NewBallot, NewCandidate, NewElection,
        NewVoter, Voter,
    },
    mongodb::Id,
    store::{
        AdminStore, BallotLedger, CredentialStore, ElectionCatalog, StoreError, StoreResult,
        VoteStore, VoteTransaction,
    },
};

/// A point in the vote transaction at which a storage fault can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    AppendBallot,
    MarkVoted,
    Commit,
}

impl Display for FaultPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AppendBallot => "append_ballot",
            Self::MarkVoted => "mark_voted",
            Self::Commit => "commit",
        };
        write!(f, "{name}")
    }
}

#[derive(Default)]
struct Tables {
    voters: BTreeMap<VoterId, Voter>,
    admins: BTreeMap<AdminId, Admin>,
    elections: BTreeMap<ElectionId, Election>,
    candidates: BTreeMap<CandidateId, Candidate>,
    ballots: Vec<Ballot>,
    last_voter_id: VoterId,
    last_admin_id: AdminId,
    last_election_id: ElectionId,
    last_candidate_id: CandidateId,
    fault: Option<FaultPoint>,
}

impl Tables {
    /// Fail once if a fault is armed at this point.
    fn trip(&mut self, point: FaultPoint) -> StoreResult<()> {
        if self.fault == Some(point) {
            self.fault = None;
            return Err(StoreError::Fault(point.to_string()));
        }
        Ok(())
    }

    fn set_active(&mut self, id: ElectionId) {
        for election in self.elections.values_mut() {
            election.is_active = election.id == id;
        }
    }

    fn candidate_mut(&mut self, id: CandidateId) -> StoreResult<&mut Candidate> {
        self.candidates
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("Candidate {id}")))
    }
}

fn next_id(last: &mut u32) -> u32 {
    *last += 1;
    *last
}

/// Storage backend that keeps everything in process memory.
///
/// Cloning yields another handle on the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next vote transaction to reach `point` fail there.
    pub async fn inject_fault(&self, point: FaultPoint) {
        self.tables.lock().await.fault = Some(point);
    }

    /// A snapshot of every ballot in the ledger.
    pub async fn ballots(&self) -> Vec<Ballot> {
        self.tables.lock().await.ballots.clone()
    }
}

#[rocket::async_trait]
impl CredentialStore for MemoryStore {
    async fn find_voter(&self, id: VoterId) -> StoreResult<Option<Voter>> {
        Ok(self.tables.lock().await.voters.get(&id).cloned())
    }

    async fn find_voter_by_identity(&self, identity: &str) -> StoreResult<Option<Voter>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .voters
            .values()
            .find(|voter| voter.identity == identity)
            .cloned())
    }

    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        let mut tables = self.tables.lock().await;
        if tables.voters.values().any(|v| v.identity == voter.identity) {
            return Err(StoreError::DuplicateIdentity(voter.identity));
        }
        let voter = Voter::new(next_id(&mut tables.last_voter_id), voter);
        tables.voters.insert(voter.id, voter.clone());
        Ok(voter)
    }

    async fn list_voters(&self) -> StoreResult<Vec<Voter>> {
        Ok(self.tables.lock().await.voters.values().cloned().collect())
    }
}

#[rocket::async_trait]
impl AdminStore for MemoryStore {
    async fn find_admin(&self, id: AdminId) -> StoreResult<Option<Admin>> {
        Ok(self.tables.lock().await.admins.get(&id).cloned())
    }

    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .admins
            .values()
            .find(|admin| admin.username == username)
            .cloned())
    }

    async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let mut tables = self.tables.lock().await;
        if tables.admins.values().any(|a| a.username == admin.username) {
            return Err(StoreError::DuplicateAdmin(admin.username));
        }
        let admin = Admin::new(next_id(&mut tables.last_admin_id), admin);
        tables.admins.insert(admin.id, admin.clone());
        Ok(admin)
    }

    async fn count_admins(&self) -> StoreResult<u64> {
        Ok(self.tables.lock().await.admins.len() as u64)
    }
}

#[rocket::async_trait]
impl ElectionCatalog for MemoryStore {
    async fn active_election(&self) -> StoreResult<Option<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables.elections.values().find(|e| e.is_active).cloned())
    }

    async fn find_election(&self, id: ElectionId) -> StoreResult<Option<Election>> {
        Ok(self.tables.lock().await.elections.get(&id).cloned())
    }

    async fn list_elections(&self) -> StoreResult<Vec<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables.elections.values().rev().cloned().collect())
    }

    async fn insert_election(&self, election: NewElection) -> StoreResult<Election> {
        let mut tables = self.tables.lock().await;
        let election = Election::new(next_id(&mut tables.last_election_id), election);
        tables.elections.insert(election.id, election.clone());
        if election.is_active {
            tables.set_active(election.id);
        }
        Ok(election)
    }

    async fn activate_election(&self, id: ElectionId) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.elections.contains_key(&id) {
            return Err(StoreError::not_found(format!("Election {id}")));
        }
        tables.set_active(id);
        Ok(())
    }

    async fn deactivate_election(&self, id: ElectionId) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let election = tables
            .elections
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("Election {id}")))?;
        election.is_active = false;
        Ok(())
    }

    async fn list_candidates(&self, election_id: ElectionId) -> StoreResult<Vec<Candidate>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .candidates
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn find_candidate(&self, id: CandidateId) -> StoreResult<Option<Candidate>> {
        Ok(self.tables.lock().await.candidates.get(&id).cloned())
    }

    async fn candidate_belongs_to(
        &self,
        candidate_id: CandidateId,
        election_id: ElectionId,
    ) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .candidates
            .get(&candidate_id)
            .map_or(false, |c| c.election_id == election_id))
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate> {
        let mut tables = self.tables.lock().await;
        if !tables.elections.contains_key(&candidate.election_id) {
            return Err(StoreError::not_found(format!(
                "Election {}",
                candidate.election_id
            )));
        }
        if tables
            .candidates
            .values()
            .any(|c| c.election_id == candidate.election_id && c.name == candidate.name)
        {
            return Err(StoreError::DuplicateCandidate {
                election_id: candidate.election_id,
                name: candidate.name,
            });
        }
        let candidate = Candidate::new(next_id(&mut tables.last_candidate_id), candidate);
        tables.candidates.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn set_candidate_photo(&self, id: CandidateId, photo: &str) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.candidate_mut(id)?.photo = photo.to_string();
        Ok(())
    }

    async fn withdraw_candidate(&self, id: CandidateId) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.candidate_mut(id)?.withdrawn = true;
        Ok(())
    }

    async fn delete_candidate(&self, id: CandidateId) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        if tables.candidates.remove(&id).is_none() {
            return Err(StoreError::not_found(format!("Candidate {id}")));
        }
        let before = tables.ballots.len();
        tables.ballots.retain(|ballot| ballot.candidate_id != id);
        Ok((before - tables.ballots.len()) as u64)
    }
}

#[rocket::async_trait]
impl BallotLedger for MemoryStore {
    async fn ballot_counts(
        &self,
        election_id: ElectionId,
    ) -> StoreResult<HashMap<CandidateId, u64>> {
        let tables = self.tables.lock().await;
        let mut counts = HashMap::new();
        for ballot in tables.ballots.iter().filter(|b| b.election_id == election_id) {
            *counts.entry(ballot.candidate_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_ballots(&self, election_id: ElectionId) -> StoreResult<u64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ballots
            .iter()
            .filter(|b| b.election_id == election_id)
            .count() as u64)
    }
}

/// A vote transaction over the in-memory tables. Writes are staged and only
/// applied on commit.
pub struct MemoryVoteTransaction<'a> {
    tables: MutexGuard<'a, Tables>,
    staged_ballots: Vec<Ballot>,
    staged_voted: Vec<VoterId>,
}

#[rocket::async_trait]
impl<'a> VoteTransaction for MemoryVoteTransaction<'a> {
    async fn active_election(&mut self) -> StoreResult<Option<Election>> {
        Ok(self.tables.elections.values().find(|e| e.is_active).cloned())
    }

    async fn voter(&mut self, id: VoterId) -> StoreResult<Option<Voter>> {
        let mut voter = self.tables.voters.get(&id).cloned();
        if let Some(voter) = voter.as_mut() {
            voter.has_voted |= self.staged_voted.contains(&id);
        }
        Ok(voter)
    }

    async fn candidate_accepts_votes(
        &mut self,
        candidate_id: CandidateId,
        election_id: ElectionId,
    ) -> StoreResult<bool> {
        Ok(self
            .tables
            .candidates
            .get(&candidate_id)
            .map_or(false, |c| c.accepts_votes_in(election_id)))
    }

    async fn mark_voted(&mut self, id: VoterId) -> StoreResult<bool> {
        self.tables.trip(FaultPoint::MarkVoted)?;
        let unvoted = self
            .tables
            .voters
            .get(&id)
            .map_or(false, |voter| !voter.has_voted);
        if !unvoted || self.staged_voted.contains(&id) {
            return Ok(false);
        }
        self.staged_voted.push(id);
        Ok(true)
    }

    async fn append_ballot(&mut self, ballot: NewBallot) -> StoreResult<()> {
        self.tables.trip(FaultPoint::AppendBallot)?;
        self.staged_ballots.push(Ballot {
            id: Id::new(),
            ballot,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryVoteTransaction {
            mut tables,
            staged_ballots,
            staged_voted,
        } = *self;
        tables.trip(FaultPoint::Commit)?;
        for id in staged_voted {
            if let Some(voter) = tables.voters.get_mut(&id) {
                voter.has_voted = true;
            }
        }
        tables.ballots.extend(staged_ballots);
        Ok(())
    }

    async fn abort(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryStore {
    async fn begin_vote<'a>(&'a self) -> StoreResult<Box<dyn VoteTransaction + 'a>> {
        Ok(Box::new(MemoryVoteTransaction {
            tables: self.tables.lock().await,
            staged_ballots: Vec::new(),
            staged_voted: Vec::new(),
        }))
    }
}
