use crate::model::{
    api::{
        election::ElectionDescription,
        tally::{ElectionResults, TallyEntry},
    },
    common::ElectionId,
    store::{Store, StoreError, StoreResult},
};

/// Tally an election.
///
/// Entries are ranked by descending vote count. Ties keep candidate insertion
/// order, and candidates without ballots are listed with zero votes.
pub async fn tally(
    store: &(dyn Store + '_),
    election_id: ElectionId,
) -> StoreResult<ElectionResults> {
    let election = store
        .find_election(election_id)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("Election {election_id}")))?;
    let candidates = store.list_candidates(election_id).await?;
    let counts = store.ballot_counts(election_id).await?;

    let mut entries: Vec<TallyEntry> = candidates
        .into_iter()
        .map(|candidate| TallyEntry {
            votes: counts.get(&candidate.id).copied().unwrap_or(0),
            candidate: candidate.into(),
        })
        .collect();
    // `sort_by` is stable.
    entries.sort_by(|a, b| b.votes.cmp(&a.votes));

    Ok(ElectionResults {
        election: ElectionDescription::from(election),
        total_votes: entries.iter().map(|entry| entry.votes).sum(),
        entries,
    })
}

/// Tally every election, newest first.
pub async fn results(store: &(dyn Store + '_)) -> StoreResult<Vec<ElectionResults>> {
    let mut all = Vec::new();
    for election in store.list_elections().await? {
        all.push(tally(store, election.id).await?);
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{
        common::CandidateId,
        db::{candidate::CandidateCore, election::ElectionCore, NewBallot},
        memory::MemoryStore,
        store::{ElectionCatalog, VoteStore},
    };

    async fn add_ballots(
        store: &MemoryStore,
        election_id: ElectionId,
        candidate_id: CandidateId,
        n: usize,
    ) {
        let mut txn = store.begin_vote().await.unwrap();
        for _ in 0..n {
            txn.append_ballot(NewBallot::new(election_id, candidate_id))
                .await
                .unwrap();
        }
        txn.commit().await.unwrap();
    }

    #[rocket::async_test]
    async fn ties_keep_insertion_order() {
        let store = MemoryStore::new();
        let election = store
            .insert_election(ElectionCore::active_example())
            .await
            .unwrap();
        let mut ids = Vec::new();
        for name in ["Aman", "Ankit", "Aayush", "Nobody"] {
            let candidate = CandidateCore::new(election.id, name.to_string(), None);
            ids.push(store.insert_candidate(candidate).await.unwrap().id);
        }
        // Counts [3, 5, 5, 0] in insertion order.
        add_ballots(&store, election.id, ids[0], 3).await;
        add_ballots(&store, election.id, ids[1], 5).await;
        add_ballots(&store, election.id, ids[2], 5).await;

        let results = tally(&store, election.id).await.unwrap();
        let ranking: Vec<_> = results
            .entries
            .iter()
            .map(|entry| (entry.candidate.name.as_str(), entry.votes))
            .collect();
        assert_eq!(
            ranking,
            vec![("Ankit", 5), ("Aayush", 5), ("Aman", 3), ("Nobody", 0)]
        );
        assert_eq!(results.total_votes, 13);
    }

    #[rocket::async_test]
    async fn ballots_of_other_elections_ignored() {
        let store = MemoryStore::new();
        let old = store
            .insert_election(ElectionCore::inactive_example())
            .await
            .unwrap();
        let current = store
            .insert_election(ElectionCore::active_example())
            .await
            .unwrap();
        let old_candidate = store
            .insert_candidate(CandidateCore::new(old.id, "Aman".into(), None))
            .await
            .unwrap();
        let current_candidate = store
            .insert_candidate(CandidateCore::new(current.id, "Aman".into(), None))
            .await
            .unwrap();
        add_ballots(&store, old.id, old_candidate.id, 2).await;
        add_ballots(&store, current.id, current_candidate.id, 1).await;

        let all = results(&store).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].election.id, current.id);
        assert_eq!(all[0].total_votes, 1);
        assert_eq!(all[1].election.id, old.id);
        assert_eq!(all[1].total_votes, 2);
    }

    #[rocket::async_test]
    async fn withdrawn_candidates_still_counted() {
        let store = MemoryStore::new();
        let election = store
            .insert_election(ElectionCore::active_example())
            .await
            .unwrap();
        let candidate = store
            .insert_candidate(CandidateCore::new(election.id, "Aman".into(), None))
            .await
            .unwrap();
        add_ballots(&store, election.id, candidate.id, 4).await;
        store.withdraw_candidate(candidate.id).await.unwrap();

        let results = tally(&store, election.id).await.unwrap();
        assert_eq!(results.entries.len(), 1);
        assert!(results.entries[0].candidate.withdrawn);
        assert_eq!(results.entries[0].votes, 4);
    }

    #[rocket::async_test]
    async fn unknown_election() {
        let store = MemoryStore::new();
        assert!(matches!(
            tally(&store, 3).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
