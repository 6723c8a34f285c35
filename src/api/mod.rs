use rocket::{
    fairing::{Fairing, Info, Kind},
    http::Header,
    Request, Response, Route,
};

pub mod admin;
pub mod auth;
pub mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(voter::routes());
    routes
}

/// A fairing that marks every response as uncacheable.
#[derive(Debug, Copy, Clone)]
pub struct NoStoreFairing;

#[rocket::async_trait]
impl Fairing for NoStoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Cache-Control: no-store",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, res: &mut Response<'r>) {
        res.set_header(Header::new("Cache-Control", "no-store"));
    }
}
