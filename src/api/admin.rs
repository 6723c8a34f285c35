use rocket::{serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            credentials::VoterCredentials,
            election::{
                CandidateDescription, CandidateSpec, ElectionDescription, ElectionSpec,
                PhotoUpdate,
            },
            tally::ElectionResults,
            voter::{ProvisionReport, VoterSummary},
        },
        common::{CandidateId, ElectionId},
        db::{Admin, NewElection},
        store::Storage,
    },
    voting::{credentials::provision, tally},
};

pub fn routes() -> Vec<Route> {
    routes![
        get_elections,
        create_election,
        activate_election,
        deactivate_election,
        get_candidates,
        add_candidate,
        get_tally,
        get_results,
        set_candidate_photo,
        withdraw_candidate,
        delete_candidate,
        get_voters,
        provision_voters,
    ]
}

#[get("/admin/elections")]
async fn get_elections(
    _token: AuthToken<Admin>,
    storage: Storage,
) -> Result<Json<Vec<ElectionDescription>>> {
    let elections = storage.list_elections().await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[post("/admin/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    storage: Storage,
) -> Result<Json<ElectionDescription>> {
    let election: NewElection = spec.0.try_into()?;
    let election = storage.insert_election(election).await?;
    info!(
        "Admin {} created election {} '{}' (active: {})",
        token.id, election.id, election.name, election.is_active
    );
    Ok(Json(election.into()))
}

#[post("/admin/elections/<election_id>/activate")]
async fn activate_election(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    storage: Storage,
) -> Result<()> {
    storage.activate_election(election_id).await?;
    info!("Admin {} activated election {election_id}", token.id);
    Ok(())
}

#[post("/admin/elections/<election_id>/deactivate")]
async fn deactivate_election(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    storage: Storage,
) -> Result<()> {
    storage.deactivate_election(election_id).await?;
    info!("Admin {} deactivated election {election_id}", token.id);
    Ok(())
}

#[get("/admin/elections/<election_id>/candidates")]
async fn get_candidates(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    storage: Storage,
) -> Result<Json<Vec<CandidateDescription>>> {
    if storage.find_election(election_id).await?.is_none() {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    let candidates = storage.list_candidates(election_id).await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[post("/admin/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    spec: Json<CandidateSpec>,
    storage: Storage,
) -> Result<Json<CandidateDescription>> {
    let candidate = spec.0.into_candidate(election_id)?;
    let candidate = storage.insert_candidate(candidate).await?;
    Ok(Json(candidate.into()))
}

#[get("/admin/elections/<election_id>/tally")]
async fn get_tally(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    storage: Storage,
) -> Result<Json<ElectionResults>> {
    Ok(Json(tally::tally(&*storage, election_id).await?))
}

#[get("/admin/results")]
async fn get_results(
    _token: AuthToken<Admin>,
    storage: Storage,
) -> Result<Json<Vec<ElectionResults>>> {
    Ok(Json(tally::results(&*storage).await?))
}

#[put("/admin/candidates/<candidate_id>/photo", data = "<update>", format = "json")]
async fn set_candidate_photo(
    _token: AuthToken<Admin>,
    candidate_id: CandidateId,
    update: Json<PhotoUpdate>,
    storage: Storage,
) -> Result<()> {
    let photo = update.photo.trim();
    if photo.is_empty() {
        return Err(Error::InvalidInput("Photo reference is required".to_string()));
    }
    storage.set_candidate_photo(candidate_id, photo).await?;
    Ok(())
}

#[post("/admin/candidates/<candidate_id>/withdraw")]
async fn withdraw_candidate(
    token: AuthToken<Admin>,
    candidate_id: CandidateId,
    storage: Storage,
) -> Result<()> {
    storage.withdraw_candidate(candidate_id).await?;
    info!("Admin {} withdrew candidate {candidate_id}", token.id);
    Ok(())
}

#[delete("/admin/candidates/<candidate_id>")]
async fn delete_candidate(
    token: AuthToken<Admin>,
    candidate_id: CandidateId,
    storage: Storage,
) -> Result<Json<u64>> {
    let purged = storage.delete_candidate(candidate_id).await?;
    warn!(
        "Admin {} deleted candidate {candidate_id}, purging {purged} ballots",
        token.id
    );
    Ok(Json(purged))
}

#[get("/admin/voters")]
async fn get_voters(
    _token: AuthToken<Admin>,
    storage: Storage,
) -> Result<Json<Vec<VoterSummary>>> {
    let voters = storage.list_voters().await?;
    Ok(Json(voters.into_iter().map(Into::into).collect()))
}

#[post("/admin/voters", data = "<credentials>", format = "json")]
async fn provision_voters(
    _token: AuthToken<Admin>,
    credentials: Json<Vec<VoterCredentials>>,
    storage: Storage,
) -> Result<Json<ProvisionReport>> {
    Ok(Json(provision(&*storage, credentials.0).await?))
}
