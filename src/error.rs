use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Invalid credentials")]
    AuthFailure,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Store(StoreError::not_found(what))
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Store(err) => match err {
                StoreError::DuplicateIdentity(_)
                | StoreError::DuplicateCandidate { .. }
                | StoreError::DuplicateAdmin(_) => Status::Conflict,
                StoreError::NotFound(_) => Status::NotFound,
                StoreError::Conflict(_) | StoreError::Db(_) | StoreError::Fault(_) => {
                    Status::ServiceUnavailable
                }
            },
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Argon2(_) => Status::InternalServerError,
            Self::AuthFailure => Status::Unauthorized,
            Self::InvalidInput(_) => Status::BadRequest,
            Self::Status(status, _) => *status,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        Err(status)
    }
}
