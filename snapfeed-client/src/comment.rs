use std::{collections::HashSet, time::Duration};

use crate::{
    api::{Comment, CommentId, Error, Thread, Time, ValidationError, MAX_COMMENT_CHARS},
    IdGenerator, SubmissionLimiter,
};

pub const MAX_SUBMISSIONS_PER_WINDOW: usize = 5;
pub const SUBMISSION_WINDOW: Duration = Duration::from_secs(60);

/// Flips a liked flag and moves its counter along, never below zero
pub(crate) fn flip_like(liked: &mut bool, count: &mut u32) -> (bool, u32) {
    *liked = !*liked;
    *count = match *liked {
        true => count.saturating_add(1),
        false => count.saturating_sub(1),
    };
    (*liked, *count)
}

/// Comments of one thread as shown to the viewer, most recent first
#[derive(Clone, Debug)]
pub struct CommentList {
    thread: Thread,
    comments: Vec<Comment>,
    limiter: SubmissionLimiter,
    placeholders: HashSet<CommentId>,
    ids: IdGenerator,
}

impl CommentList {
    pub fn new(thread: Thread) -> CommentList {
        CommentList {
            thread,
            comments: Vec::new(),
            limiter: SubmissionLimiter::new(MAX_SUBMISSIONS_PER_WINDOW, SUBMISSION_WINDOW),
            placeholders: HashSet::new(),
            ids: IdGenerator::default(),
        }
    }

    pub fn thread(&self) -> Thread {
        self.thread
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Whether the comment is one of the locally shown seed comments
    pub fn is_placeholder(&self, id: CommentId) -> bool {
        self.placeholders.contains(&id)
    }

    /// Comments worth caching, seed comments excluded
    pub fn snapshot(&self) -> Vec<Comment> {
        self.comments
            .iter()
            .filter(|c| !self.placeholders.contains(&c.id))
            .cloned()
            .collect()
    }

    /// Returns the new `(liked, count)` pair, or `None` if the comment is not in the list
    pub fn toggle_like(&mut self, id: CommentId) -> Option<(bool, u32)> {
        let c = self.comments.iter_mut().find(|c| c.id == id)?;
        Some(flip_like(&mut c.liked_by_me, &mut c.like_count))
    }

    pub fn submit(&mut self, text: &str, author: &str, now: Time) -> Result<Comment, Error> {
        if text.trim().is_empty() {
            return Err(Error::Validation(ValidationError::EmptyText));
        }
        let len = text.chars().count();
        if len > MAX_COMMENT_CHARS {
            return Err(Error::Validation(ValidationError::TextTooLong {
                len,
                max: MAX_COMMENT_CHARS,
            }));
        }
        crate::api::validate_string(text)?;
        self.limiter.check(now)?;

        let comment = Comment {
            id: CommentId(self.ids.next(now)),
            author: String::from(author),
            created_at: now,
            text: String::from(text.trim()),
            like_count: 0,
            liked_by_me: false,
        };
        self.limiter.record(now);
        self.comments.insert(0, comment.clone());
        Ok(comment)
    }

    pub fn replace_all(&mut self, mut comments: Vec<Comment>) {
        comments.sort_unstable_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        if let Some(max) = comments.iter().map(|c| c.id.0).max() {
            self.ids.observe(max);
        }
        self.placeholders.clear();
        self.comments = comments;
    }

    /// Replaces the list with a cached snapshot, or with the seed comments if there is none
    pub fn merge_fallback(&mut self, cached: Option<Vec<Comment>>, now: Time) {
        match cached {
            Some(cached) if !cached.is_empty() => self.replace_all(cached),
            _ => {
                self.replace_all(seed_comments(now));
                self.placeholders = self.comments.iter().map(|c| c.id).collect();
            }
        }
    }
}

/// Shown when neither the remote store nor the cache has anything
pub fn seed_comments(now: Time) -> Vec<Comment> {
    let ms = now.timestamp_millis();
    let ago = |d: chrono::Duration| now - d;
    vec![
        Comment {
            id: CommentId(ms),
            author: String::from("grassrootssp"),
            created_at: ago(chrono::Duration::days(28)),
            text: String::from(
                "Amazing, thank you so much for being a part of @mentalhealthunitedfc’s \
                 tournament for a second year. We are so grateful for such amazing community \
                 support all working together to help prevent suicide.❤️",
            ),
            like_count: 1,
            liked_by_me: true,
        },
        Comment {
            id: CommentId(ms - 1_000),
            author: String::from("chloesim___"),
            created_at: ago(chrono::Duration::seconds(14)),
            text: String::from("Great work!"),
            like_count: 0,
            liked_by_me: false,
        },
        Comment {
            id: CommentId(ms - 2_000),
            author: String::from("alexmkeith"),
            created_at: ago(chrono::Duration::seconds(37)),
            text: String::from("👏👏👏"),
            like_count: 0,
            liked_by_me: false,
        },
    ]
}
