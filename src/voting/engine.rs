use thiserror::Error;

use crate::model::{
    common::{CandidateId, ElectionId, VoterId},
    db::NewBallot,
    store::{StoreError, VoteStore, VoteTransaction},
};

/// How many times a vote is restarted after losing a transaction conflict.
pub const MAX_CONFLICT_RESTARTS: usize = 5;

/// Successful outcomes of a vote submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    /// A ballot was recorded and the voter marked as having voted.
    Accepted,
    /// The voter had already voted; nothing was written.
    AlreadyVoted,
}

/// Failed vote submissions. None of these leave any trace in storage.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Voter is not registered")]
    UnauthenticatedVoter,
    #[error("Malformed candidate selection: {0:?}")]
    MalformedSelection(String),
    #[error("No election is accepting votes")]
    NoActiveElection,
    #[error("Candidate {candidate_id} does not stand in election {election_id}")]
    InvalidCandidate {
        candidate_id: CandidateId,
        election_id: ElectionId,
    },
    #[error("Vote could not be recorded: {0}")]
    Persistence(#[from] StoreError),
}

/// Parse an untrusted candidate selection into a candidate ID.
pub fn parse_selection(raw: Option<&str>) -> Result<CandidateId, VoteError> {
    let raw = raw.unwrap_or_default();
    match raw.trim().parse::<CandidateId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(VoteError::MalformedSelection(raw.to_string())),
    }
}

/// Cast a vote for `voter_id`.
///
/// The whole check-and-write sequence runs in one storage transaction. If the
/// transaction loses a conflict with a concurrent one it is restarted from the
/// top, so the voted flag is always re-read before anything is written.
/// Other storage failures are returned as [`VoteError::Persistence`] and never
/// retried.
pub async fn cast_vote<S>(
    store: &S,
    voter_id: VoterId,
    raw_selection: Option<&str>,
) -> Result<VoteStatus, VoteError>
where
    S: VoteStore + ?Sized,
{
    let mut restarts = 0;
    loop {
        let mut txn = store.begin_vote().await?;
        let result = attempt(&mut *txn, voter_id, raw_selection).await;

        let result = match result {
            Ok(Some(ballot)) => match txn.commit().await {
                Ok(()) => {
                    info!(
                        "Voter {voter_id} cast a ballot in election {}",
                        ballot.election_id
                    );
                    Ok(VoteStatus::Accepted)
                }
                Err(e) => Err(VoteError::from(e)),
            },
            Ok(None) => {
                abandon(txn).await;
                Ok(VoteStatus::AlreadyVoted)
            }
            Err(e) => {
                abandon(txn).await;
                Err(e)
            }
        };

        match result {
            Err(VoteError::Persistence(e)) if e.is_conflict() => {
                if restarts == MAX_CONFLICT_RESTARTS {
                    warn!("Voter {voter_id} gave up after {restarts} conflicting attempts");
                    return Err(e.into());
                }
                restarts += 1;
                debug!("Vote transaction for voter {voter_id} conflicted, restarting ({restarts})");
            }
            Err(VoteError::Persistence(e)) => {
                warn!("Vote for voter {voter_id} rolled back: {e}");
                return Err(e.into());
            }
            other => return other,
        }
    }
}

/// Abort a transaction that wrote nothing worth keeping. Nothing has been
/// committed, so dropping it is enough if the abort itself fails.
async fn abandon(txn: Box<dyn VoteTransaction + '_>) {
    if let Err(e) = txn.abort().await {
        debug!("Abort of vote transaction failed: {e}");
    }
}

/// One pass over the vote sequence inside `txn`.
///
/// Returns the ballot that was staged, or `None` if the voter had already
/// voted. Nothing is committed here.
async fn attempt(
    txn: &mut (dyn VoteTransaction + '_),
    voter_id: VoterId,
    raw_selection: Option<&str>,
) -> Result<Option<NewBallot>, VoteError> {
    let election = txn
        .active_election()
        .await?
        .ok_or(VoteError::NoActiveElection)?;

    let voter = txn
        .voter(voter_id)
        .await?
        .ok_or(VoteError::UnauthenticatedVoter)?;
    if voter.has_voted {
        return Ok(None);
    }

    let candidate_id = parse_selection(raw_selection)?;
    if !txn.candidate_accepts_votes(candidate_id, election.id).await? {
        return Err(VoteError::InvalidCandidate {
            candidate_id,
            election_id: election.id,
        });
    }

    // Compare-and-set: a concurrent vote may have landed since the read above.
    if !txn.mark_voted(voter_id).await? {
        return Ok(None);
    }
    let ballot = NewBallot::new(election.id, candidate_id);
    txn.append_ballot(ballot.clone()).await?;

    Ok(Some(ballot))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rocket::futures::future::join_all;

    use super::*;

    use crate::model::{
        db::{
            candidate::CandidateCore, election::ElectionCore, voter::VoterCore, Candidate,
            Election, Voter,
        },
        memory::{FaultPoint, MemoryStore},
        store::{CredentialStore, ElectionCatalog, StoreResult},
    };

    struct Fixture {
        store: MemoryStore,
        voter: Voter,
        election: Election,
        candidates: Vec<Candidate>,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let voter = store.insert_voter(VoterCore::example("CS2025001")).await.unwrap();
        let election = store
            .insert_election(ElectionCore::active_example())
            .await
            .unwrap();
        let mut candidates = Vec::new();
        for name in ["Aman", "Ankit", "Aayush"] {
            let candidate = CandidateCore::new(election.id, name.to_string(), None);
            candidates.push(store.insert_candidate(candidate).await.unwrap());
        }
        Fixture {
            store,
            voter,
            election,
            candidates,
        }
    }

    async fn assert_untouched(fixture: &Fixture) {
        assert!(fixture.store.ballots().await.is_empty());
        let voter = fixture.store.find_voter(fixture.voter.id).await.unwrap();
        assert!(!voter.unwrap().has_voted);
    }

    #[test]
    fn selection_parsing() {
        assert_eq!(parse_selection(Some("3")).unwrap(), 3);
        assert_eq!(parse_selection(Some(" 12\n")).unwrap(), 12);
        for raw in [None, Some(""), Some("  "), Some("0"), Some("-1"), Some("abc"), Some("1.5")] {
            assert!(
                matches!(parse_selection(raw), Err(VoteError::MalformedSelection(_))),
                "{raw:?} should be malformed"
            );
        }
    }

    #[rocket::async_test]
    async fn vote_accepted() {
        let fixture = fixture().await;
        let candidate = fixture.candidates[1].id.to_string();

        let status = cast_vote(&fixture.store, fixture.voter.id, Some(&candidate))
            .await
            .unwrap();
        assert_eq!(status, VoteStatus::Accepted);

        let ballots = fixture.store.ballots().await;
        assert_eq!(ballots.len(), 1);
        assert_eq!(ballots[0].election_id, fixture.election.id);
        assert_eq!(ballots[0].candidate_id, fixture.candidates[1].id);
        let voter = fixture.store.find_voter(fixture.voter.id).await.unwrap();
        assert!(voter.unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn no_active_election() {
        let fixture = fixture().await;
        fixture
            .store
            .deactivate_election(fixture.election.id)
            .await
            .unwrap();

        let result = cast_vote(&fixture.store, fixture.voter.id, Some("1")).await;
        assert!(matches!(result, Err(VoteError::NoActiveElection)));
        assert_untouched(&fixture).await;
    }

    #[rocket::async_test]
    async fn malformed_selection() {
        let fixture = fixture().await;
        for raw in [None, Some(""), Some("zero"), Some("0"), Some("-2")] {
            let result = cast_vote(&fixture.store, fixture.voter.id, raw).await;
            assert!(matches!(result, Err(VoteError::MalformedSelection(_))));
        }
        assert_untouched(&fixture).await;
    }

    #[rocket::async_test]
    async fn unknown_voter() {
        let fixture = fixture().await;
        let result = cast_vote(&fixture.store, 999, Some("1")).await;
        assert!(matches!(result, Err(VoteError::UnauthenticatedVoter)));
        assert_untouched(&fixture).await;
    }

    #[rocket::async_test]
    async fn candidate_from_another_election() {
        let fixture = fixture().await;
        // A new election takes over, so the fixture's candidates are stale.
        let mut next = ElectionCore::active_example();
        next.name = "Council of CR 2026".into();
        let next = fixture.store.insert_election(next).await.unwrap();
        fixture
            .store
            .insert_candidate(CandidateCore::new(next.id, "Aman".into(), None))
            .await
            .unwrap();

        let stale = fixture.candidates[0].id.to_string();
        let result = cast_vote(&fixture.store, fixture.voter.id, Some(&stale)).await;
        assert!(matches!(
            result,
            Err(VoteError::InvalidCandidate { candidate_id, election_id })
                if candidate_id == fixture.candidates[0].id && election_id == next.id
        ));
        assert_untouched(&fixture).await;
    }

    #[rocket::async_test]
    async fn unknown_candidate() {
        let fixture = fixture().await;
        let result = cast_vote(&fixture.store, fixture.voter.id, Some("404")).await;
        assert!(matches!(result, Err(VoteError::InvalidCandidate { .. })));
        assert_untouched(&fixture).await;
    }

    #[rocket::async_test]
    async fn withdrawn_candidate() {
        let fixture = fixture().await;
        let withdrawn = fixture.candidates[2].id;
        fixture.store.withdraw_candidate(withdrawn).await.unwrap();

        let selection = withdrawn.to_string();
        let result = cast_vote(&fixture.store, fixture.voter.id, Some(&selection)).await;
        assert!(matches!(result, Err(VoteError::InvalidCandidate { .. })));
        assert_untouched(&fixture).await;
    }

    #[rocket::async_test]
    async fn repeat_vote_is_idempotent() {
        let fixture = fixture().await;
        let first = fixture.candidates[0].id.to_string();
        let second = fixture.candidates[1].id.to_string();

        let status = cast_vote(&fixture.store, fixture.voter.id, Some(&first))
            .await
            .unwrap();
        assert_eq!(status, VoteStatus::Accepted);

        // Any selection, even a malformed one, reports the earlier vote.
        for raw in [Some(first.as_str()), Some(second.as_str()), Some("junk"), None] {
            let status = cast_vote(&fixture.store, fixture.voter.id, raw)
                .await
                .unwrap();
            assert_eq!(status, VoteStatus::AlreadyVoted);
        }

        let ballots = fixture.store.ballots().await;
        assert_eq!(ballots.len(), 1);
        assert_eq!(ballots[0].candidate_id, fixture.candidates[0].id);
    }

    #[rocket::async_test]
    async fn concurrent_votes_count_once() {
        const SUBMISSIONS: usize = 16;
        log4rs_test_utils::test_logging::init_logging_once_for(["ballotbox_backend"], None, None);
        let fixture = fixture().await;

        let handles = (0..SUBMISSIONS).map(|i| {
            let store = fixture.store.clone();
            let voter_id = fixture.voter.id;
            let candidate = fixture.candidates[i % 3].id.to_string();
            rocket::tokio::spawn(async move {
                cast_vote(&store, voter_id, Some(&candidate)).await
            })
        });
        let statuses: Vec<VoteStatus> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let accepted = statuses
            .iter()
            .filter(|status| **status == VoteStatus::Accepted)
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(statuses.len() - accepted, SUBMISSIONS - 1);
        assert_eq!(fixture.store.ballots().await.len(), 1);
    }

    #[rocket::async_test]
    async fn storage_faults_roll_back() {
        for point in [
            FaultPoint::MarkVoted,
            FaultPoint::AppendBallot,
            FaultPoint::Commit,
        ] {
            let fixture = fixture().await;
            fixture.store.inject_fault(point).await;

            let result = cast_vote(&fixture.store, fixture.voter.id, Some("1")).await;
            assert!(
                matches!(result, Err(VoteError::Persistence(StoreError::Fault(_)))),
                "fault at {point} should surface"
            );
            assert_untouched(&fixture).await;

            // The fault fires once; voting afterwards works normally.
            let status = cast_vote(&fixture.store, fixture.voter.id, Some("1"))
                .await
                .unwrap();
            assert_eq!(status, VoteStatus::Accepted);
        }
    }

    /// Wraps the memory store, failing the first few transactions with a
    /// conflict as a concurrent MongoDB writer would.
    struct Conflicting {
        inner: MemoryStore,
        conflicts_left: AtomicUsize,
    }

    struct ConflictingTransaction<'a> {
        inner: Box<dyn VoteTransaction + 'a>,
        conflict: bool,
    }

    #[rocket::async_trait]
    impl<'a> VoteTransaction for ConflictingTransaction<'a> {
        async fn active_election(&mut self) -> StoreResult<Option<Election>> {
            self.inner.active_election().await
        }

        async fn voter(&mut self, id: VoterId) -> StoreResult<Option<Voter>> {
            self.inner.voter(id).await
        }

        async fn candidate_accepts_votes(
            &mut self,
            candidate_id: CandidateId,
            election_id: ElectionId,
        ) -> StoreResult<bool> {
            self.inner
                .candidate_accepts_votes(candidate_id, election_id)
                .await
        }

        async fn mark_voted(&mut self, id: VoterId) -> StoreResult<bool> {
            if self.conflict {
                return Err(StoreError::Conflict("write conflict".to_string()));
            }
            self.inner.mark_voted(id).await
        }

        async fn append_ballot(&mut self, ballot: NewBallot) -> StoreResult<()> {
            self.inner.append_ballot(ballot).await
        }

        async fn commit(self: Box<Self>) -> StoreResult<()> {
            self.inner.commit().await
        }

        async fn abort(self: Box<Self>) -> StoreResult<()> {
            self.inner.abort().await
        }
    }

    #[rocket::async_trait]
    impl VoteStore for Conflicting {
        async fn begin_vote<'a>(&'a self) -> StoreResult<Box<dyn VoteTransaction + 'a>> {
            let conflict = self
                .conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            Ok(Box::new(ConflictingTransaction {
                inner: self.inner.begin_vote().await?,
                conflict,
            }))
        }
    }

    #[rocket::async_test]
    async fn conflicts_restart_the_vote() {
        let fixture = fixture().await;
        let store = Conflicting {
            inner: fixture.store.clone(),
            conflicts_left: AtomicUsize::new(2),
        };

        let status = cast_vote(&store, fixture.voter.id, Some("1")).await.unwrap();
        assert_eq!(status, VoteStatus::Accepted);
        assert_eq!(fixture.store.ballots().await.len(), 1);
    }

    #[rocket::async_test]
    async fn endless_conflicts_give_up() {
        let fixture = fixture().await;
        let store = Conflicting {
            inner: fixture.store.clone(),
            conflicts_left: AtomicUsize::new(usize::MAX),
        };

        let result = cast_vote(&store, fixture.voter.id, Some("1")).await;
        assert!(matches!(
            result,
            Err(VoteError::Persistence(StoreError::Conflict(_)))
        ));
        assert_untouched(&fixture).await;
    }

    /// Wraps the memory store, hiding the voted flag from the transaction's
    /// read as a vote landing between the read and the write would.
    struct StaleRead {
        inner: MemoryStore,
        aborts: AtomicUsize,
        commits: AtomicUsize,
    }

    struct StaleReadTransaction<'a> {
        inner: Box<dyn VoteTransaction + 'a>,
        aborts: &'a AtomicUsize,
        commits: &'a AtomicUsize,
    }

    #[rocket::async_trait]
    impl<'a> VoteTransaction for StaleReadTransaction<'a> {
        async fn active_election(&mut self) -> StoreResult<Option<Election>> {
            self.inner.active_election().await
        }

        async fn voter(&mut self, id: VoterId) -> StoreResult<Option<Voter>> {
            let voter = self.inner.voter(id).await?;
            Ok(voter.map(|mut voter| {
                voter.has_voted = false;
                voter
            }))
        }

        async fn candidate_accepts_votes(
            &mut self,
            candidate_id: CandidateId,
            election_id: ElectionId,
        ) -> StoreResult<bool> {
            self.inner
                .candidate_accepts_votes(candidate_id, election_id)
                .await
        }

        async fn mark_voted(&mut self, id: VoterId) -> StoreResult<bool> {
            self.inner.mark_voted(id).await
        }

        async fn append_ballot(&mut self, ballot: NewBallot) -> StoreResult<()> {
            self.inner.append_ballot(ballot).await
        }

        async fn commit(self: Box<Self>) -> StoreResult<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            self.inner.commit().await
        }

        async fn abort(self: Box<Self>) -> StoreResult<()> {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            self.inner.abort().await
        }
    }

    #[rocket::async_trait]
    impl VoteStore for StaleRead {
        async fn begin_vote<'a>(&'a self) -> StoreResult<Box<dyn VoteTransaction + 'a>> {
            Ok(Box::new(StaleReadTransaction {
                inner: self.inner.begin_vote().await?,
                aborts: &self.aborts,
                commits: &self.commits,
            }))
        }
    }

    #[rocket::async_test]
    async fn lost_compare_and_set_reports_already_voted() {
        let fixture = fixture().await;

        // The voter's flag is set without a ballot of ours in the ledger.
        let mut txn = fixture.store.begin_vote().await.unwrap();
        assert!(txn.mark_voted(fixture.voter.id).await.unwrap());
        txn.commit().await.unwrap();

        let store = StaleRead {
            inner: fixture.store.clone(),
            aborts: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
        };
        let status = cast_vote(&store, fixture.voter.id, Some("1")).await.unwrap();

        assert_eq!(status, VoteStatus::AlreadyVoted);
        assert!(fixture.store.ballots().await.is_empty());
        assert_eq!(store.aborts.load(Ordering::SeqCst), 1);
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }
}
