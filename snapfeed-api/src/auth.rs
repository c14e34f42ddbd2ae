use regex::Regex;
use uuid::Uuid;

use crate::{Error, ValidationError, STUB_UUID};

pub const MIN_PASSWORD_CHARS: usize = 6;

lazy_static::lazy_static! {
    static ref EMAIL_ADDRESS: Regex = Regex::new(
        r"^[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+$"
    )
    .expect("email address regex is valid");
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_ADDRESS.is_match(email.trim())
}

pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_CHARS
}

pub fn validate_otp(code: &str) -> Result<(), Error> {
    if code.len() != 4 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Validation(ValidationError::InvalidOtp));
    }
    Ok(())
}

fn check_email_and_password(email: &str, password: &str) -> Result<(), Error> {
    if !validate_email(email) {
        return Err(Error::Validation(ValidationError::InvalidEmail {
            email: String::from(email),
        }));
    }
    if !validate_password(password) {
        return Err(Error::Validation(ValidationError::WeakPassword {
            min: MIN_PASSWORD_CHARS,
        }));
    }
    Ok(())
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub username: String,
}

impl NewAccount {
    pub fn new(email: &str, password: String, username: &str) -> NewAccount {
        NewAccount {
            email: String::from(email.trim()),
            password,
            username: String::from(username.trim()),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.email)?;
        crate::validate_string(&self.password)?;
        crate::validate_string(&self.username)?;
        if self.email.trim().is_empty()
            || self.password.trim().is_empty()
            || self.username.trim().is_empty()
        {
            return Err(Error::Validation(ValidationError::MissingFields));
        }
        check_email_and_password(&self.email, &self.password)
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: &str, password: String) -> Credentials {
        Credentials {
            email: String::from(email.trim()),
            password,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.email)?;
        crate::validate_string(&self.password)?;
        check_email_and_password(&self.email, &self.password)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(STUB_UUID)
    }
}
