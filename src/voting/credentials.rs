use crate::error::{Error, Result};
use crate::model::{
    api::{
        credentials::{AdminCredentials, VoterCredentials, VoterRegistration},
        voter::ProvisionReport,
    },
    db::{Admin, NewAdmin, NewVoter, Voter},
    store::{Store, StoreError},
};

/// Register a new voter.
pub async fn register(
    store: &(dyn Store + '_),
    registration: VoterRegistration,
) -> Result<Voter> {
    let voter: NewVoter = registration.try_into()?;
    let voter = store.insert_voter(voter).await?;
    info!("Registered voter {} ({})", voter.id, voter.identity);
    Ok(voter)
}

/// Check a voter's identity and password.
///
/// Unknown identities and wrong passwords are indistinguishable to the caller.
pub async fn verify_credentials(
    store: &(dyn Store + '_),
    identity: &str,
    password: &str,
) -> Result<Voter> {
    store
        .find_voter_by_identity(identity.trim())
        .await?
        .filter(|voter| voter.verify_password(password))
        .ok_or(Error::AuthFailure)
}

/// Check an admin's username and password.
pub async fn verify_admin(
    store: &(dyn Store + '_),
    credentials: &AdminCredentials,
) -> Result<Admin> {
    store
        .find_admin_by_username(&credentials.username)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or(Error::AuthFailure)
}

/// Create voters in bulk. Identities that already exist are skipped, never
/// overwritten, and invalid entries are rejected.
///
/// Every entry is validated and hashed before anything is inserted.
pub async fn provision(
    store: &(dyn Store + '_),
    credentials: Vec<VoterCredentials>,
) -> Result<ProvisionReport> {
    let mut report = ProvisionReport::default();
    let mut voters = Vec::with_capacity(credentials.len());
    for credential in credentials {
        let identity = credential.identity.trim().to_string();
        match NewVoter::try_from(credential) {
            Ok(voter) => voters.push(voter),
            Err(Error::InvalidInput(reason)) => {
                debug!("Rejected voter '{identity}': {reason}");
                report.rejected.push(identity);
            }
            Err(e) => return Err(e),
        }
    }

    for voter in voters {
        let identity = voter.identity.clone();
        match store.insert_voter(voter).await {
            Ok(_) => report.created.push(identity),
            Err(StoreError::DuplicateIdentity(_)) => report.skipped.push(identity),
            Err(e) => return Err(e.into()),
        }
    }
    info!(
        "Provisioned {} voters, skipped {} existing, rejected {} invalid",
        report.created.len(),
        report.skipped.len(),
        report.rejected.len()
    );
    Ok(report)
}

/// Ensure there is at least one admin user, creating one from the given
/// credentials if not.
///
/// This operation is idempotent.
pub async fn ensure_admin_exists(
    store: &(dyn Store + '_),
    credentials: AdminCredentials,
) -> Result<()> {
    if store.count_admins().await? == 0 {
        let username = credentials.username.clone();
        let admin: NewAdmin = credentials.try_into()?;
        store.insert_admin(admin).await?;
        warn!("No admin existed, created bootstrap admin '{username}'");
    }
    Ok(())
}
