use std::time::Duration;

use anyhow::{anyhow, Context};
use serde_json::json;

#[derive(
    Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize, thiserror::Error,
)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum ValidationError {
    #[error("Comment cannot be empty")]
    EmptyText,

    #[error("Comment is limited to {max} characters, got {len}")]
    TextTooLong { len: usize, max: usize },

    #[error("Media reference cannot be empty")]
    BlankMediaRef,

    #[error("Media reference must be an http(s) URL, got {media_ref:?}")]
    UnsupportedScheme { media_ref: String },

    #[error("All fields must be filled")]
    MissingFields,

    #[error("Invalid email address {email:?}")]
    InvalidEmail { email: String },

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("OTP code must be exactly 4 digits")]
    InvalidOtp,

    #[error("Null byte in string is not allowed {string:?}")]
    NullByteInString { string: String },
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Too many submissions, try again in {} seconds", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already used {0}")]
    EmailAlreadyUsed(String),

    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Error::InvalidCredentials => StatusCode::FORBIDDEN,
            Error::EmailAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::RemoteUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        let message = self.to_string();
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::Validation(v) => json!({
                "message": message,
                "type": "validation",
                "details": v,
            }),
            Error::RateLimited { retry_after } => json!({
                "message": message,
                "type": "rate-limited",
                "retry-after-ms": retry_after.as_millis() as u64,
            }),
            Error::NotAuthenticated => json!({
                "message": message,
                "type": "not-authenticated",
            }),
            Error::InvalidCredentials => json!({
                "message": message,
                "type": "invalid-credentials",
            }),
            Error::EmailAlreadyUsed(email) => json!({
                "message": message,
                "type": "conflict-email",
                "email": email,
            }),
            Error::RemoteUnavailable(msg) => json!({
                "message": message,
                "type": "remote-unavailable",
                "cause": msg,
            }),
            Error::NotFound(what) => json!({
                "message": message,
                "type": "not-found",
                "what": what,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let field = |name: &str| -> anyhow::Result<String> {
            data.get(name)
                .and_then(|v| v.as_str())
                .map(String::from)
                .ok_or_else(|| anyhow!("error contents has no string field {name:?}"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(field("message").unwrap_or_default()),
                "validation" => Error::Validation(
                    serde_json::from_value(
                        data.get("details")
                            .cloned()
                            .ok_or_else(|| anyhow!("validation error without details"))?,
                    )
                    .context("parsing validation error details")?,
                ),
                "rate-limited" => Error::RateLimited {
                    retry_after: Duration::from_millis(
                        data.get("retry-after-ms")
                            .and_then(|ms| ms.as_u64())
                            .ok_or_else(|| anyhow!("rate-limited error without retry delay"))?,
                    ),
                },
                "not-authenticated" => Error::NotAuthenticated,
                "invalid-credentials" => Error::InvalidCredentials,
                "conflict-email" => Error::EmailAlreadyUsed(field("email")?),
                "remote-unavailable" => Error::RemoteUnavailable(field("cause")?),
                "not-found" => Error::NotFound(field("what")?),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
