use chrono::{TimeZone, Utc};

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod auth;
pub use auth::{validate_email, validate_otp, validate_password, AuthToken, Credentials, NewAccount};

mod comment;
pub use comment::{Comment, CommentId, CommentLike, Thread, MAX_COMMENT_CHARS};

mod document;
pub use document::{Collection, Document};

mod error;
pub use error::{Error, ValidationError};

mod post;
pub use post::{LikeDelta, MediaKind, MediaPath, NewPost, Post, PostId, PostLikeIncrement};

mod user;
pub use user::{Account, UserId};

// Strings coming from the outside end up in documents and cache lines, neither
// of which can hold a null byte
pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::Validation(ValidationError::NullByteInString {
            string: String::from(s),
        }));
    }
    Ok(())
}

/// Converts epoch milliseconds, as stored in documents and cache lines, to a `Time`
pub fn time_from_millis(ms: i64) -> Option<Time> {
    Utc.timestamp_millis_opt(ms).single()
}
