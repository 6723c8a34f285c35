use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    api::credentials::AdminCredentials, memory::MemoryStore, mongodb::MongoStore,
    store::Storage,
};
use crate::voting::credentials::ensure_admin_exists;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    admin_username: String,
    // secrets
    jwt_secret: String,
    admin_password: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Credentials of the admin created when none exists.
    pub fn bootstrap_admin(&self) -> AdminCredentials {
        AdminCredentials {
            username: self.admin_username.clone(),
            password: self.admin_password.clone(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which storage backend to run on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Mongodb,
    Memory,
}

fn default_db_name() -> String {
    "ballotbox".to_string()
}

/// Configuration for the storage backend.
#[derive(Deserialize)]
struct StorageConfig {
    // non-secrets
    #[serde(default)]
    storage: Backend,
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: Option<String>,
}

/// A fairing that connects the configured storage backend, performs any setup
/// necessary, and places a [`Storage`] handle into managed state. If a
/// backend is already managed it is used as is.
///
/// Must be attached after [`ConfigFairing`], since it bootstraps the admin
/// user from the application config.
pub struct StorageFairing;

#[rocket::async_trait]
impl Fairing for StorageFairing {
    fn info(&self) -> Info {
        Info {
            name: "Storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let managed = rocket.state::<Storage>().cloned();
        let storage = match managed {
            Some(storage) => storage,
            None => {
                // Load the config.
                let config = match rocket.figment().extract::<StorageConfig>() {
                    Ok(config) => config,
                    Err(e) => {
                        error!("Failed to load storage config");
                        rocket::config::pretty_print_error(e);
                        return Err(rocket);
                    }
                };
                let Some(storage) = connect(config).await else {
                    return Err(rocket);
                };
                rocket = rocket.manage(storage.clone());
                storage
            }
        };

        // Ensure there is at least one admin user.
        let admin = match rocket.state::<Config>() {
            Some(config) => config.bootstrap_admin(),
            None => {
                error!("Storage fairing attached before config fairing");
                return Err(rocket);
            }
        };
        if let Err(e) = ensure_admin_exists(&*storage, admin).await {
            error!("Failed to bootstrap admin user: {e}");
            return Err(rocket);
        }

        Ok(rocket)
    }
}

/// Build the configured backend, logging why if that fails.
async fn connect(config: StorageConfig) -> Option<Storage> {
    match config.storage {
        Backend::Memory => {
            warn!("Using in-memory storage; nothing will be persisted");
            Some(Storage::new(MemoryStore::new()))
        }
        Backend::Mongodb => {
            let Some(db_uri) = config.db_uri else {
                error!("`db_uri` must be set for MongoDB storage");
                return None;
            };
            info!("Loaded database config, connecting...");
            match MongoStore::connect(&db_uri, &config.db_name).await {
                Ok(store) => {
                    info!("...database connection online!");
                    Some(Storage::new(store))
                }
                Err(e) => {
                    error!("Failed to connect to database: {e}");
                    None
                }
            }
        }
    }
}
