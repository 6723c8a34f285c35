use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::Result,
    model::{
        api::{
            auth::{AuthToken, AUTH_TOKEN_COOKIE},
            credentials::{AdminCredentials, VoterCredentials, VoterRegistration},
            voter::VoterSummary,
        },
        store::Storage,
    },
    voting::credentials::{register as register_voter, verify_admin, verify_credentials},
};

pub fn routes() -> Vec<Route> {
    routes![authenticate, register, login, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    storage: Storage,
    config: &State<Config>,
) -> Result<()> {
    let admin = verify_admin(&*storage, &credentials).await?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config)?);

    Ok(())
}

#[post("/auth/voter/register", data = "<registration>", format = "json")]
pub async fn register(
    registration: Json<VoterRegistration>,
    storage: Storage,
) -> Result<Json<VoterSummary>> {
    let voter = register_voter(&*storage, registration.0).await?;
    Ok(Json(voter.into()))
}

#[post("/auth/voter/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: Json<VoterCredentials>,
    storage: Storage,
    config: &State<Config>,
) -> Result<()> {
    let voter = verify_credentials(&*storage, &credentials.identity, &credentials.password).await?;

    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config)?);

    Ok(())
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use rocket::{http::ContentType, local::asynchronous::Client, serde::json::serde_json::json};

    use crate::model::{memory::MemoryStore, store::CredentialStore};

    use super::*;

    #[backend_test]
    async fn admin_authenticate_valid(client: Client) {
        // The bootstrap admin is created on ignite.
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn admin_authenticate_invalid(client: Client) {
        // Use invalid username to attempt admin login
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::empty()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        // Use invalid password to attempt admin login
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(
                json! ({
                    "username": &AdminCredentials::example().username,
                    "password": "",
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn voter_register_and_login(client: Client, store: MemoryStore) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(VoterRegistration::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let summary: VoterSummary = response.into_json().await.unwrap();
        assert_eq!(summary.identity, VoterRegistration::example().identity);
        assert!(!summary.has_voted);

        // Check voter was inserted
        let voter = store
            .find_voter_by_identity(&summary.identity)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(voter.id, summary.id);

        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!(VoterCredentials::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test(voter)]
    async fn duplicate_registration(client: Client) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(VoterRegistration::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Conflict, response.status());
    }

    #[backend_test]
    async fn invalid_registration(client: Client, store: MemoryStore) {
        let registration = VoterRegistration {
            confirm: "not the same".into(),
            ..VoterRegistration::example()
        };
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(registration).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::BadRequest, response.status());
        assert!(store.list_voters().await.unwrap().is_empty());
    }

    #[backend_test(voter)]
    async fn voter_wrong_password(client: Client) {
        client.delete(uri!(logout)).dispatch().await;

        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(
                json!({
                    "identity": VoterCredentials::example().identity,
                    "password": "not my password",
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test(admin)]
    async fn logout_admin(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test(voter)]
    async fn logout_voter(client: Client) {
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn logout_not_logged_in(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
    }
}
