use std::collections::HashMap;

use mongodb::{
    bson::{doc, from_document, Document},
    error::Error as DbError,
    options::{
        Acknowledgment, FindOptions, ReadConcern, TransactionOptions, WriteConcern,
    },
    Client, ClientSession, Database,
};
use rocket::futures::{StreamExt, TryStreamExt};
use serde::Deserialize;

use crate::model::{
    common::{AdminId, CandidateId, ElectionId, VoterId},
    db::{
        Admin, Candidate, Election, NewAdmin, NewBallot, NewCandidate, NewElection, NewVoter,
        Voter,
    },
    mongodb::{
        collection::ensure_indexes_exist,
        counter::{
            ensure_counters_exist, Counter, ADMIN_ID_COUNTER, CANDIDATE_ID_COUNTER,
            ELECTION_ID_COUNTER, VOTER_ID_COUNTER,
        },
        errors::is_duplicate_key_error,
        u32_id_filter, Coll, MongoCollection,
    },
    store::{
        AdminStore, BallotLedger, CredentialStore, ElectionCatalog, StoreError, StoreResult,
        VoteStore, VoteTransaction,
    },
};

/// Storage backend on a MongoDB replica set. Multi-document writes use
/// transactions, so a standalone server is not supported.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the database and perform any setup necessary.
    pub async fn connect(db_uri: &str, db_name: &str) -> Result<Self, DbError> {
        let client = Client::with_uri_str(db_uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        ensure_counters_exist(&Coll::from_db(&db)).await?;
        Ok(Self { client, db })
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    /// Start a session with a transaction already open on it.
    async fn transaction(&self) -> Result<ClientSession, DbError> {
        let options = TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .build();
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(options).await?;
        Ok(session)
    }
}

/// Shape of the documents produced by the tally aggregation.
#[derive(Deserialize)]
struct CandidateCount {
    #[serde(rename = "_id")]
    candidate_id: CandidateId,
    count: u64,
}

#[rocket::async_trait]
impl CredentialStore for MongoStore {
    async fn find_voter(&self, id: VoterId) -> StoreResult<Option<Voter>> {
        Ok(self.coll::<Voter>().find_one(u32_id_filter(id), None).await?)
    }

    async fn find_voter_by_identity(&self, identity: &str) -> StoreResult<Option<Voter>> {
        let filter = doc! {
            "identity": identity,
        };
        Ok(self.coll::<Voter>().find_one(filter, None).await?)
    }

    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        let id = Counter::next(&self.coll(), VOTER_ID_COUNTER).await?;
        let voter = Voter::new(id, voter);
        match self.coll::<Voter>().insert_one(&voter, None).await {
            Ok(_) => Ok(voter),
            Err(e) if is_duplicate_key_error(&e) => {
                Err(StoreError::DuplicateIdentity(voter.voter.identity))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_voters(&self) -> StoreResult<Vec<Voter>> {
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let voters = self
            .coll::<Voter>()
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(voters)
    }
}

#[rocket::async_trait]
impl AdminStore for MongoStore {
    async fn find_admin(&self, id: AdminId) -> StoreResult<Option<Admin>> {
        Ok(self.coll::<Admin>().find_one(u32_id_filter(id), None).await?)
    }

    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>> {
        let filter = doc! {
            "username": username,
        };
        Ok(self.coll::<Admin>().find_one(filter, None).await?)
    }

    async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let id = Counter::next(&self.coll(), ADMIN_ID_COUNTER).await?;
        let admin = Admin::new(id, admin);
        match self.coll::<Admin>().insert_one(&admin, None).await {
            Ok(_) => Ok(admin),
            Err(e) if is_duplicate_key_error(&e) => {
                Err(StoreError::DuplicateAdmin(admin.admin.username))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count_admins(&self) -> StoreResult<u64> {
        Ok(self.coll::<Admin>().count_documents(None, None).await?)
    }
}

#[rocket::async_trait]
impl ElectionCatalog for MongoStore {
    async fn active_election(&self) -> StoreResult<Option<Election>> {
        let filter = doc! {
            "is_active": true,
        };
        Ok(self.coll::<Election>().find_one(filter, None).await?)
    }

    async fn find_election(&self, id: ElectionId) -> StoreResult<Option<Election>> {
        Ok(self
            .coll::<Election>()
            .find_one(u32_id_filter(id), None)
            .await?)
    }

    async fn list_elections(&self) -> StoreResult<Vec<Election>> {
        let options = FindOptions::builder().sort(doc! {"_id": -1}).build();
        let elections = self
            .coll::<Election>()
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn insert_election(&self, election: NewElection) -> StoreResult<Election> {
        let elections = self.coll::<Election>();
        let id = Counter::next(&self.coll(), ELECTION_ID_COUNTER).await?;
        let election = Election::new(id, election);

        let mut session = self.transaction().await?;
        if election.is_active {
            deactivate_all_with_session(&elections, &mut session).await?;
        }
        elections
            .insert_one_with_session(&election, None, &mut session)
            .await?;
        session.commit_transaction().await?;

        Ok(election)
    }

    async fn activate_election(&self, id: ElectionId) -> StoreResult<()> {
        let elections = self.coll::<Election>();
        let mut session = self.transaction().await?;

        // Deactivate first, so the single-active index never sees two.
        deactivate_all_with_session(&elections, &mut session).await?;
        let update = doc! {
            "$set": { "is_active": true }
        };
        let result = elections
            .update_one_with_session(u32_id_filter(id), update, None, &mut session)
            .await?;
        if result.matched_count == 0 {
            session.abort_transaction().await?;
            return Err(StoreError::not_found(format!("Election {id}")));
        }

        session.commit_transaction().await?;
        Ok(())
    }

    async fn deactivate_election(&self, id: ElectionId) -> StoreResult<()> {
        let update = doc! {
            "$set": { "is_active": false }
        };
        let result = self
            .coll::<Election>()
            .update_one(u32_id_filter(id), update, None)
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::not_found(format!("Election {id}")));
        }
        Ok(())
    }

    async fn list_candidates(&self, election_id: ElectionId) -> StoreResult<Vec<Candidate>> {
        let filter = doc! {
            "election_id": election_id,
        };
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let candidates = self
            .coll::<Candidate>()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn find_candidate(&self, id: CandidateId) -> StoreResult<Option<Candidate>> {
        Ok(self
            .coll::<Candidate>()
            .find_one(u32_id_filter(id), None)
            .await?)
    }

    async fn candidate_belongs_to(
        &self,
        candidate_id: CandidateId,
        election_id: ElectionId,
    ) -> StoreResult<bool> {
        let filter = doc! {
            "_id": candidate_id,
            "election_id": election_id,
        };
        let count = self
            .coll::<Candidate>()
            .count_documents(filter, None)
            .await?;
        Ok(count > 0)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate> {
        if self.find_election(candidate.election_id).await?.is_none() {
            return Err(StoreError::not_found(format!(
                "Election {}",
                candidate.election_id
            )));
        }
        let id = Counter::next(&self.coll(), CANDIDATE_ID_COUNTER).await?;
        let candidate = Candidate::new(id, candidate);
        match self.coll::<Candidate>().insert_one(&candidate, None).await {
            Ok(_) => Ok(candidate),
            Err(e) if is_duplicate_key_error(&e) => Err(StoreError::DuplicateCandidate {
                election_id: candidate.election_id,
                name: candidate.candidate.name,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_candidate_photo(&self, id: CandidateId, photo: &str) -> StoreResult<()> {
        let update = doc! {
            "$set": { "photo": photo }
        };
        self.update_candidate(id, update).await
    }

    async fn withdraw_candidate(&self, id: CandidateId) -> StoreResult<()> {
        let update = doc! {
            "$set": { "withdrawn": true }
        };
        self.update_candidate(id, update).await
    }

    async fn delete_candidate(&self, id: CandidateId) -> StoreResult<u64> {
        let candidates = self.coll::<Candidate>();
        let ballots = self.coll::<NewBallot>();
        let mut session = self.transaction().await?;

        let purged = ballots
            .delete_many_with_session(doc! {"candidate_id": id}, None, &mut session)
            .await?
            .deleted_count;
        let result = candidates
            .delete_one_with_session(u32_id_filter(id), None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            session.abort_transaction().await?;
            return Err(StoreError::not_found(format!("Candidate {id}")));
        }

        session.commit_transaction().await?;
        Ok(purged)
    }
}

impl MongoStore {
    async fn update_candidate(&self, id: CandidateId, update: Document) -> StoreResult<()> {
        let result = self
            .coll::<Candidate>()
            .update_one(u32_id_filter(id), update, None)
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::not_found(format!("Candidate {id}")));
        }
        Ok(())
    }
}

async fn deactivate_all_with_session(
    elections: &Coll<Election>,
    session: &mut ClientSession,
) -> Result<(), DbError> {
    let update = doc! {
        "$set": { "is_active": false }
    };
    elections
        .update_many_with_session(doc! {"is_active": true}, update, None, session)
        .await?;
    Ok(())
}

#[rocket::async_trait]
impl BallotLedger for MongoStore {
    async fn ballot_counts(
        &self,
        election_id: ElectionId,
    ) -> StoreResult<HashMap<CandidateId, u64>> {
        let pipeline = vec![
            doc! {
                "$match": { "election_id": election_id }
            },
            doc! {
                "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } }
            },
        ];
        let mut cursor = self.coll::<NewBallot>().aggregate(pipeline, None).await?;
        let mut counts = HashMap::new();
        while let Some(document) = cursor.next().await {
            let CandidateCount {
                candidate_id,
                count,
            } = from_document(document?).map_err(DbError::from)?;
            counts.insert(candidate_id, count);
        }
        Ok(counts)
    }

    async fn count_ballots(&self, election_id: ElectionId) -> StoreResult<u64> {
        let filter = doc! {
            "election_id": election_id,
        };
        Ok(self
            .coll::<NewBallot>()
            .count_documents(filter, None)
            .await?)
    }
}

/// A vote transaction on a MongoDB session.
pub struct MongoVoteTransaction {
    session: ClientSession,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    ballots: Coll<NewBallot>,
}

#[rocket::async_trait]
impl VoteTransaction for MongoVoteTransaction {
    async fn active_election(&mut self) -> StoreResult<Option<Election>> {
        let filter = doc! {
            "is_active": true,
        };
        Ok(self
            .elections
            .find_one_with_session(filter, None, &mut self.session)
            .await?)
    }

    async fn voter(&mut self, id: VoterId) -> StoreResult<Option<Voter>> {
        Ok(self
            .voters
            .find_one_with_session(u32_id_filter(id), None, &mut self.session)
            .await?)
    }

    async fn candidate_accepts_votes(
        &mut self,
        candidate_id: CandidateId,
        election_id: ElectionId,
    ) -> StoreResult<bool> {
        let filter = doc! {
            "_id": candidate_id,
            "election_id": election_id,
            "withdrawn": { "$ne": true },
        };
        let count = self
            .candidates
            .count_documents_with_session(filter, None, &mut self.session)
            .await?;
        Ok(count > 0)
    }

    async fn mark_voted(&mut self, id: VoterId) -> StoreResult<bool> {
        let filter = doc! {
            "_id": id,
            "has_voted": false,
        };
        let update = doc! {
            "$set": { "has_voted": true }
        };
        let result = self
            .voters
            .update_one_with_session(filter, update, None, &mut self.session)
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn append_ballot(&mut self, ballot: NewBallot) -> StoreResult<()> {
        self.ballots
            .insert_one_with_session(&ballot, None, &mut self.session)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut session = self.session;
        session.commit_transaction().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> StoreResult<()> {
        let mut session = self.session;
        session.abort_transaction().await?;
        Ok(())
    }
}

#[rocket::async_trait]
impl VoteStore for MongoStore {
    async fn begin_vote<'a>(&'a self) -> StoreResult<Box<dyn VoteTransaction + 'a>> {
        Ok(Box::new(MongoVoteTransaction {
            session: self.transaction().await?,
            voters: self.coll(),
            elections: self.coll(),
            candidates: self.coll(),
            ballots: self.coll(),
        }))
    }
}
