use serde_json::json;

use crate::{
    document::{get_count, get_i64, get_str, get_time},
    Collection, Document, PostId, Time,
};

pub const MAX_COMMENT_CHARS: usize = 500;

/// Creation time in epoch milliseconds, unique within a thread
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub i64);

/// Comment collection a comment lives in
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub enum Thread {
    Global,
    Post(PostId),
}

impl Thread {
    pub fn collection(&self) -> Collection {
        Collection::Comments(*self)
    }

    /// Key under which the thread is persisted in the local cache
    pub fn cache_key(&self) -> String {
        match self {
            Thread::Global => String::from("comments"),
            Thread::Post(PostId(p)) => format!("comments-post-{p}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: String,
    pub created_at: Time,
    pub text: String,
    pub like_count: u32,

    /// Relative to the viewer of the current session
    pub liked_by_me: bool,
}

impl Comment {
    pub fn to_document(&self) -> Document {
        match json!({
            "id": self.id.0,
            "user": self.author,
            "time": self.created_at.timestamp_millis(),
            "text": self.text,
            "likes": self.like_count,
            "liked": self.liked_by_me,
        }) {
            serde_json::Value::Object(doc) => doc,
            _ => unreachable!(),
        }
    }

    /// Returns `None` if a required field (`id`, `user`, `text`) is missing
    pub fn from_document(doc: &Document, now: Time) -> Option<Comment> {
        Some(Comment {
            id: CommentId(get_i64(doc, "id")?),
            author: String::from(get_str(doc, "user")?),
            created_at: get_time(doc, "time", now),
            text: String::from(get_str(doc, "text")?),
            like_count: get_count(doc, "likes"),
            liked_by_me: doc.get("liked").and_then(|l| l.as_bool()).unwrap_or(false),
        })
    }
}

/// Body of a like-state update for one comment
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentLike {
    pub liked: bool,
    pub likes: u32,
}
