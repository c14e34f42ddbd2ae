use crate::{PostId, Thread, Time};

/// Loosely-typed record as held by the remote document store
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Collection {
    Comments(Thread),
    Posts,
}

impl Collection {
    /// Store path of the collection, documents being keyed below it by stringified id
    pub fn path(&self) -> String {
        match self {
            Collection::Comments(Thread::Global) => String::from("comments"),
            Collection::Comments(Thread::Post(PostId(p))) => format!("posts/{p}/comments"),
            Collection::Posts => String::from("posts"),
        }
    }
}

pub(crate) fn get_i64(doc: &Document, field: &str) -> Option<i64> {
    doc.get(field).and_then(|v| v.as_i64())
}

pub(crate) fn get_str<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(|v| v.as_str())
}

/// Reads a timestamp field, defaulting to `now` when absent or out of range
pub(crate) fn get_time(doc: &Document, field: &str, now: Time) -> Time {
    get_i64(doc, field)
        .and_then(crate::time_from_millis)
        .unwrap_or(now)
}

/// Reads a counter field; absent counters were never incremented
pub(crate) fn get_count(doc: &Document, field: &str) -> u32 {
    get_i64(doc, field)
        .map(|c| c.clamp(0, u32::MAX as i64) as u32)
        .unwrap_or(0)
}
