use std::str::FromStr;

use serde_json::json;

use crate::{
    document::{get_count, get_i64, get_str, get_time},
    Document, Error, Time, UserId, ValidationError,
};

/// Creation time in epoch milliseconds
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct PostId(pub i64);

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Guesses the kind of the media behind a URL
    pub fn from_url(url: &str) -> MediaKind {
        let low = url.to_lowercase();
        if low.ends_with(".mp4") || low.contains("/video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
        }
    }
}

impl FromStr for MediaKind {
    type Err = ();

    fn from_str(s: &str) -> Result<MediaKind, ()> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            _ => Err(()),
        }
    }
}

/// Object-store path of uploaded media
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct MediaPath(pub String);

impl MediaPath {
    pub fn for_post(owner: UserId, post: PostId, kind: MediaKind) -> MediaPath {
        MediaPath(format!("posts/{owner}/{post}.{}", kind.extension()))
    }
}

impl std::fmt::Display for MediaPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub id: PostId,
    pub owner_id: UserId,
    pub kind: MediaKind,
    pub media_ref: String,
    pub storage_path: Option<MediaPath>,
    pub caption: String,
    pub created_at: Time,
    pub like_count: u32,
}

impl Post {
    pub fn to_document(&self) -> Document {
        let mut doc = match json!({
            "id": self.id.0,
            "uid": self.owner_id.0,
            "kind": self.kind.as_str(),
            "uri": self.media_ref,
            "caption": self.caption,
            "time": self.created_at.timestamp_millis(),
            "likes": self.like_count,
        }) {
            serde_json::Value::Object(doc) => doc,
            _ => unreachable!(),
        };
        if let Some(path) = &self.storage_path {
            doc.insert(String::from("path"), json!(path.0));
        }
        doc
    }

    /// Returns `None` if a required field (`id`, `uid`, `kind`, non-blank `uri`) is missing
    pub fn from_document(doc: &Document, now: Time) -> Option<Post> {
        let media_ref = get_str(doc, "uri").filter(|u| !u.trim().is_empty())?;
        Some(Post {
            id: PostId(get_i64(doc, "id")?),
            owner_id: UserId(get_str(doc, "uid")?.parse().ok()?),
            kind: get_str(doc, "kind")?.parse().ok()?,
            media_ref: String::from(media_ref),
            storage_path: get_str(doc, "path").map(|p| MediaPath(String::from(p))),
            caption: String::from(get_str(doc, "caption").unwrap_or("")),
            created_at: get_time(doc, "time", now),
            like_count: get_count(doc, "likes"),
        })
    }
}

/// A post as submitted by the creation form, before the owner is attached
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    pub id: PostId,
    pub kind: MediaKind,
    pub media_ref: String,
    pub caption: String,
    pub created_at: Time,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.media_ref)?;
        crate::validate_string(&self.caption)?;
        let media_ref = self.media_ref.trim();
        if media_ref.is_empty() {
            return Err(Error::Validation(ValidationError::BlankMediaRef));
        }
        let low = media_ref.to_lowercase();
        if !low.starts_with("http://") && !low.starts_with("https://") {
            return Err(Error::Validation(ValidationError::UnsupportedScheme {
                media_ref: String::from(media_ref),
            }));
        }
        Ok(())
    }

    pub fn into_post(self, owner_id: UserId) -> Post {
        Post {
            id: self.id,
            owner_id,
            kind: self.kind,
            media_ref: String::from(self.media_ref.trim()),
            storage_path: None,
            caption: self.caption,
            created_at: self.created_at,
            like_count: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum LikeDelta {
    Up,
    Down,
}

impl LikeDelta {
    pub fn for_liked(now_liked: bool) -> LikeDelta {
        match now_liked {
            true => LikeDelta::Up,
            false => LikeDelta::Down,
        }
    }
}

impl From<LikeDelta> for i64 {
    fn from(d: LikeDelta) -> i64 {
        match d {
            LikeDelta::Up => 1,
            LikeDelta::Down => -1,
        }
    }
}

impl TryFrom<i64> for LikeDelta {
    type Error = String;

    fn try_from(d: i64) -> Result<LikeDelta, String> {
        match d {
            1 => Ok(LikeDelta::Up),
            -1 => Ok(LikeDelta::Down),
            _ => Err(format!("like delta must be +1 or -1, got {d}")),
        }
    }
}

/// Body of an atomic like-counter increment
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostLikeIncrement {
    pub delta: LikeDelta,
}
