//! Demo data for a fresh deployment.

use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::error::Result;
use crate::model::{
    api::credentials::VoterCredentials,
    db::{NewCandidate, NewElection},
    store::{Storage, Store},
};
use crate::voting::credentials::provision;

/// A candidate of the demo election.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedCandidate {
    pub name: String,
    pub photo: String,
}

/// The demo election and electorate, configured under `seed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoSeed {
    pub election: String,
    pub candidates: Vec<SeedCandidate>,
    /// Voter identities are this prefix followed by a 3-digit number.
    pub voter_prefix: String,
    pub voter_count: u32,
    /// Each voter's password is their identity followed by this suffix.
    pub password_suffix: String,
}

impl Default for DemoSeed {
    fn default() -> Self {
        let candidate = |name: &str, photo: &str| SeedCandidate {
            name: name.to_string(),
            photo: photo.to_string(),
        };
        Self {
            election: "Council of CR 2025".to_string(),
            candidates: vec![
                candidate("Aman", "aman.jpg"),
                candidate("Ankit", "ankit.jpg"),
                candidate("Aayush", "aayush.jpg"),
            ],
            voter_prefix: "0905CS241".to_string(),
            voter_count: 64,
            password_suffix: "#".to_string(),
        }
    }
}

impl DemoSeed {
    /// Login credentials of every demo voter.
    pub fn voters(&self) -> Vec<VoterCredentials> {
        (1..=self.voter_count)
            .map(|n| {
                let identity = format!("{}{n:03}", self.voter_prefix);
                VoterCredentials {
                    password: format!("{identity}{}", self.password_suffix),
                    identity,
                }
            })
            .collect()
    }
}

/// Seed the demo election if the catalog is empty. Returns whether anything
/// was seeded.
pub async fn seed_demo(store: &(dyn Store + '_), seed: &DemoSeed) -> Result<bool> {
    if !store.list_elections().await?.is_empty() {
        debug!("Elections exist, not seeding demo data");
        return Ok(false);
    }

    let election = store
        .insert_election(NewElection {
            name: seed.election.clone(),
            is_active: true,
        })
        .await?;
    for candidate in &seed.candidates {
        let candidate = NewCandidate::new(
            election.id,
            candidate.name.clone(),
            Some(candidate.photo.clone()),
        );
        store.insert_candidate(candidate).await?;
    }
    provision(store, seed.voters()).await?;

    info!(
        "Seeded demo election {} '{}' with {} candidates and {} voters",
        election.id,
        election.name,
        seed.candidates.len(),
        seed.voter_count
    );
    Ok(true)
}

#[derive(Deserialize)]
struct SeedConfig {
    #[serde(default)]
    seed_demo: bool,
    #[serde(default)]
    seed: DemoSeed,
}

/// A fairing that seeds demo data when `seed_demo` is set. Must be attached
/// after the storage fairing.
pub struct SeedFairing;

#[rocket::async_trait]
impl Fairing for SeedFairing {
    fn info(&self) -> Info {
        Info {
            name: "Demo seed",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<SeedConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load seed config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if !config.seed_demo {
            return Ok(rocket);
        }

        let Some(storage) = rocket.state::<Storage>().cloned() else {
            error!("Seed fairing attached before storage fairing");
            return Err(rocket);
        };
        if let Err(e) = seed_demo(&*storage, &config.seed).await {
            error!("Failed to seed demo data: {e}");
            return Err(rocket);
        }
        Ok(rocket)
    }
}
