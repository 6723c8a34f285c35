#[macro_use]
extern crate rocket;
#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::api::NoStoreFairing;
use crate::config::{ConfigFairing, StorageFairing};
use crate::logging::LoggerFairing;
use crate::seed::SeedFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod seed;
pub mod voting;

/// Build a rocket on the configured storage backend.
pub fn build() -> Rocket<Build> {
    attach_fairings(rocket::build())
}

fn attach_fairings(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(NoStoreFairing)
        .attach(ConfigFairing)
        .attach(StorageFairing)
        .attach(SeedFairing)
}

/// Build a rocket on the given backend, with fixed test configuration.
#[cfg(test)]
pub(crate) fn rocket_for_storage(storage: model::store::Storage) -> Rocket<Build> {
    use model::api::credentials::AdminCredentials;

    let admin = AdminCredentials::example();
    let figment = rocket::Config::figment()
        .merge(("auth_ttl", 600))
        .merge(("jwt_secret", "test-jwt-secret"))
        .merge(("admin_username", admin.username))
        .merge(("admin_password", admin.password))
        .merge(("storage", "memory"))
        .merge(("seed_demo", false));

    attach_fairings(rocket::custom(figment).manage(storage))
}
