use std::collections::HashSet;

use crate::{
    api::{MediaKind, Post, PostId, Time, UserId},
    comment::flip_like,
    IdGenerator,
};

/// Media shown in place of the feed before anything could be loaded
pub const PLACEHOLDER_MEDIA: &str = "asset://png/Rectangle.png";

/// Home feed, most recent post first
#[derive(Clone, Debug, Default)]
pub struct PostFeed {
    posts: Vec<Post>,
    liked: HashSet<PostId>,
    placeholders: HashSet<PostId>,
    ids: IdGenerator,
}

impl PostFeed {
    pub fn new() -> PostFeed {
        PostFeed::default()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn is_liked(&self, id: PostId) -> bool {
        self.liked.contains(&id)
    }

    /// Whether the post only exists locally as part of the seed feed
    pub fn is_placeholder(&self, id: PostId) -> bool {
        self.placeholders.contains(&id)
    }

    /// Posts worth caching, that is all but the placeholders
    pub fn snapshot(&self) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|p| !self.placeholders.contains(&p.id))
            .collect()
    }

    pub fn next_id(&mut self, now: Time) -> PostId {
        PostId(self.ids.next(now))
    }

    /// Returns the new `(liked, count)` pair, or `None` if the post is not in the feed
    pub fn toggle_like(&mut self, id: PostId) -> Option<(bool, u32)> {
        let post = self.posts.iter_mut().find(|p| p.id == id)?;
        let mut liked = self.liked.contains(&id);
        let res = flip_like(&mut liked, &mut post.like_count);
        match liked {
            true => self.liked.insert(id),
            false => self.liked.remove(&id),
        };
        Some(res)
    }

    pub fn replace_all(&mut self, mut posts: Vec<Post>) {
        posts.sort_unstable_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        if let Some(max) = posts.iter().map(|p| p.id.0).max() {
            self.ids.observe(max);
        }
        self.placeholders.clear();
        self.posts = posts;
    }

    /// Replaces the feed with a cached snapshot, or with the seed feed if there is none
    pub fn merge_fallback(&mut self, cached: Option<Vec<Post>>, now: Time) {
        match cached {
            Some(cached) if !cached.is_empty() => self.replace_all(cached),
            _ => {
                self.replace_all(seed_posts(now));
                self.placeholders = self.posts.iter().map(|p| p.id).collect();
            }
        }
    }

    /// Adds a post the remote store acknowledged
    pub fn append_confirmed(&mut self, post: Post) {
        self.ids.observe(post.id.0);
        self.posts.retain(|p| p.id != post.id);
        let at = self
            .posts
            .partition_point(|p| (p.created_at, p.id) > (post.created_at, post.id));
        self.posts.insert(at, post);
    }
}

pub fn seed_posts(now: Time) -> Vec<Post> {
    vec![Post {
        id: PostId(now.timestamp_millis()),
        owner_id: UserId::stub(),
        kind: MediaKind::Image,
        media_ref: String::from(PLACEHOLDER_MEDIA),
        storage_path: None,
        caption: String::new(),
        created_at: now,
        like_count: 0,
    }]
}
