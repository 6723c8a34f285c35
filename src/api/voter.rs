use rocket::{form::Form, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    logging::RequestId,
    model::{
        api::{
            auth::AuthToken,
            election::VoterBallot,
            vote::{VoteForm, VoteOutcome, VoteReport},
        },
        db::Voter,
        store::Storage,
    },
    voting::cast_vote,
};

pub fn routes() -> Vec<Route> {
    routes![get_ballot, vote]
}

#[get("/voter/ballot")]
async fn get_ballot(token: AuthToken<Voter>, storage: Storage) -> Result<Json<VoterBallot>> {
    let voter = storage
        .find_voter(token.id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {}", token.id)))?;

    let Some(election) = storage.active_election().await? else {
        return Ok(Json(VoterBallot {
            election: None,
            candidates: Vec::new(),
            has_voted: voter.has_voted,
        }));
    };
    let candidates = storage
        .list_candidates(election.id)
        .await?
        .into_iter()
        .filter(|candidate| !candidate.withdrawn)
        .map(Into::into)
        .collect();

    Ok(Json(VoterBallot {
        election: Some(election.into()),
        candidates,
        has_voted: voter.has_voted,
    }))
}

/// Cast a vote. Every outcome, including a missing session, is reported in
/// the body rather than by forwarding.
///
/// A body that is not a vote form counts as a missing selection.
#[post("/voter/vote", data = "<form>")]
async fn vote(
    token: Option<AuthToken<Voter>>,
    form: Option<Form<VoteForm>>,
    storage: Storage,
    request_id: &RequestId,
) -> VoteReport {
    let Some(token) = token else {
        return VoteOutcome::Unauthenticated.into();
    };
    debug!("req{request_id} is a vote from voter {}", token.id);
    let selection = form.as_ref().and_then(|form| form.candidate.as_deref());
    cast_vote(&*storage, token.id, selection).await.into()
}
