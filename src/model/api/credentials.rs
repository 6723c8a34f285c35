use argon2::{Config, Error as Argon2Error};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::db::{NewAdmin, NewVoter};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, Argon2Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &Config::default())
}

/// A voter registration form. The password is in plaintext and never stored.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterRegistration {
    pub identity: String,
    pub password: String,
    pub confirm: String,
}

impl TryFrom<VoterRegistration> for NewVoter {
    type Error = Error;

    /// Validate the registration and hash the password.
    fn try_from(registration: VoterRegistration) -> Result<Self, Self::Error> {
        let identity = registration.identity.trim();
        if identity.is_empty() || registration.password.is_empty() {
            return Err(Error::InvalidInput(
                "Identity and password are required".to_string(),
            ));
        }
        if registration.password != registration.confirm {
            return Err(Error::InvalidInput("Passwords do not match".to_string()));
        }
        let password_hash = hash_password(&registration.password)?;
        Ok(Self::new(identity.to_string(), password_hash))
    }
}

/// Voter login credentials, also used for bulk provisioning.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterCredentials {
    pub identity: String,
    pub password: String,
}

impl TryFrom<VoterCredentials> for NewVoter {
    type Error = Error;

    fn try_from(credentials: VoterCredentials) -> Result<Self, Self::Error> {
        let password = credentials.password.clone();
        VoterRegistration {
            identity: credentials.identity,
            password,
            confirm: credentials.password,
        }
        .try_into()
    }
}

/// Raw admin credentials, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = Error;

    /// Convert [`AdminCredentials`] to a new admin by hashing the password.
    /// This enforces that the username is non-empty, and the password meets minimum length.
    fn try_from(cred: AdminCredentials) -> Result<Self, Self::Error> {
        if cred.username.is_empty() || cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::InvalidInput("Illegal admin credentials".to_string()));
        }
        Ok(Self {
            password_hash: hash_password(&cred.password)?,
            username: cred.username,
        })
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl VoterRegistration {
        pub fn example() -> Self {
            Self {
                identity: "CS2025001".into(),
                password: "correct horse".into(),
                confirm: "correct horse".into(),
            }
        }
    }

    impl VoterCredentials {
        pub fn example() -> Self {
            let registration = VoterRegistration::example();
            Self {
                identity: registration.identity,
                password: registration.password,
            }
        }

        pub fn example2() -> Self {
            Self {
                identity: "CS2025002".into(),
                password: "battery staple".into(),
            }
        }
    }

    impl AdminCredentials {
        pub fn example() -> Self {
            Self {
                username: "returning-officer".into(),
                password: "ballotbox4lyfe".into(),
            }
        }

        pub fn empty() -> Self {
            Self {
                username: "".into(),
                password: "".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_trims_identity() {
        let registration = VoterRegistration {
            identity: "  CS2025001 ".into(),
            ..VoterRegistration::example()
        };
        let voter = NewVoter::try_from(registration).unwrap();
        assert_eq!(voter.identity, "CS2025001");
        assert!(!voter.has_voted);
        assert!(voter.verify_password("correct horse"));
        assert!(!voter.verify_password("wrong"));
    }

    #[test]
    fn registration_rejects_mismatched_confirmation() {
        let registration = VoterRegistration {
            confirm: "something else".into(),
            ..VoterRegistration::example()
        };
        assert!(matches!(
            NewVoter::try_from(registration),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn registration_rejects_blank_fields() {
        let blank_identity = VoterRegistration {
            identity: "   ".into(),
            ..VoterRegistration::example()
        };
        assert!(NewVoter::try_from(blank_identity).is_err());

        let blank_password = VoterRegistration {
            password: "".into(),
            confirm: "".into(),
            ..VoterRegistration::example()
        };
        assert!(NewVoter::try_from(blank_password).is_err());
    }

    #[test]
    fn admin_password_minimum_length() {
        assert!(NewAdmin::try_from(AdminCredentials::empty()).is_err());
        let short = AdminCredentials {
            password: "short".into(),
            ..AdminCredentials::example()
        };
        assert!(NewAdmin::try_from(short).is_err());
        let admin = NewAdmin::try_from(AdminCredentials::example()).unwrap();
        assert!(admin.verify_password("ballotbox4lyfe"));
    }
}
