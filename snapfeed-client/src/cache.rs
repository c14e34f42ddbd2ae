use std::{collections::HashMap, path::PathBuf};

use anyhow::Context;
use parking_lot::Mutex;

use crate::api::{time_from_millis, Comment, CommentId};

/// Flat key-value store that survives the session
pub trait Cache: Send + Sync {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn store(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One file per key in a directory
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<FileCache> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating cache directory {dir:?}"))?;
        Ok(FileCache { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.txt"))
    }
}

impl Cache for FileCache {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading cache file {path:?}")),
        }
    }

    fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("txt.tmp");
        std::fs::write(&tmp, value).with_context(|| format!("writing cache file {tmp:?}"))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("moving cache file {tmp:?} into {path:?}"))
    }
}

#[derive(Default)]
pub struct MemoryCache(Mutex<HashMap<String, String>>);

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }
}

impl Cache for MemoryCache {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.0.lock().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.0.lock().insert(String::from(key), String::from(value));
        Ok(())
    }
}

fn escape_field(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => res.push_str("\\\\"),
            '|' => res.push_str("\\|"),
            '\n' => res.push_str("\\n"),
            c => res.push(c),
        }
    }
    res
}

// Splits on unescaped `|`, unescaping every field along the way
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => cur.push('\n'),
                Some(escaped) => cur.push(escaped),
                None => cur.push('\\'),
            },
            '|' => fields.push(std::mem::take(&mut cur)),
            c => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}

/// Serializes comments as `id|author|createdAt|text|likeCount|likedFlag` lines
pub fn encode_comments(comments: &[Comment]) -> String {
    comments
        .iter()
        .map(|c| {
            format!(
                "{}|{}|{}|{}|{}|{}",
                c.id.0,
                escape_field(&c.author),
                c.created_at.timestamp_millis(),
                escape_field(&c.text),
                c.like_count,
                if c.liked_by_me { "1" } else { "0" },
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_line(line: &str) -> Option<Comment> {
    let mut fields = split_fields(line).into_iter();
    let id = fields.next()?.parse().ok()?;
    let author = fields.next()?;
    let created_at = time_from_millis(fields.next()?.parse().ok()?)?;
    let text = fields.next()?;
    let like_count = fields.next()?.parse().ok()?;
    let liked_by_me = fields.next()? == "1";
    Some(Comment {
        id: CommentId(id),
        author,
        created_at,
        text,
        like_count,
        liked_by_me,
    })
}

/// Parses the output of `encode_comments`, skipping lines that do not parse
pub fn decode_comments(raw: &str) -> Vec<Comment> {
    raw.split('\n')
        .filter(|l| !l.is_empty())
        .filter_map(|l| {
            let res = decode_line(l);
            if res.is_none() {
                tracing::warn!(line = l, "skipping unparsable comment cache line");
            }
            res
        })
        .collect()
}
