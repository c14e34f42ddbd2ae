use std::{collections::HashMap, sync::Arc};

use tokio::sync::mpsc;

use crate::{
    api::{
        validate_string, Collection, Comment, CommentId, CommentLike, Error, LikeDelta,
        MediaKind, MediaPath, NewPost, Post, PostId, Thread,
    },
    cache::{decode_comments, encode_comments},
    resolve_with_retry, Cache, ClientConfig, Clock, CommentList, Completion, Dispatcher, Gateway,
    PostFeed, WriteOp,
};

const POSTS_CACHE_KEY: &str = "posts";

/// Where the data currently shown comes from
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Freshness {
    Live,

    /// The remote fetch failed with this error, cached or seed data is shown
    Fallback(Error),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Connectivity {
    Checking,
    Connected,
    Disconnected(String),
}

/// Single owner of the local interaction state
///
/// Every mutation is applied locally first and returns synchronously; the
/// matching remote write is then dispatched in the background and its outcome
/// is only reported on the completion channel.
pub struct Interactions {
    gateway: Arc<dyn Gateway>,
    clock: Arc<dyn Clock>,
    cache: Arc<dyn Cache>,
    dispatcher: Dispatcher,
    config: ClientConfig,
    threads: HashMap<Thread, CommentList>,
    feed: PostFeed,
    connectivity: Connectivity,
    dispatched: usize,
}

impl Interactions {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        clock: Arc<dyn Clock>,
        cache: Arc<dyn Cache>,
        config: ClientConfig,
    ) -> (Interactions, mpsc::UnboundedReceiver<Completion>) {
        let (dispatcher, completions) = Dispatcher::new();
        let this = Interactions {
            gateway,
            clock,
            cache,
            dispatcher,
            config,
            threads: HashMap::new(),
            feed: PostFeed::new(),
            connectivity: Connectivity::Checking,
            dispatched: 0,
        };
        (this, completions)
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn feed(&self) -> &PostFeed {
        &self.feed
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Number of remote writes dispatched so far, each one yields a completion
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Comments of a thread, empty if it was never opened
    pub fn comments(&self, thread: Thread) -> &[Comment] {
        self.threads
            .get(&thread)
            .map(|l| l.comments())
            .unwrap_or(&[])
    }

    /// Returns the list of a thread, filled from the cache the first time
    pub fn open(&mut self, thread: Thread) -> &CommentList {
        self.list(thread)
    }

    fn list(&mut self, thread: Thread) -> &mut CommentList {
        let cache = &self.cache;
        self.threads.entry(thread).or_insert_with(|| {
            let mut list = CommentList::new(thread);
            if let Some(cached) = load_comments(cache.as_ref(), thread) {
                list.replace_all(cached);
            }
            list
        })
    }

    fn author(&self) -> String {
        self.gateway
            .session()
            .map(|a| a.username)
            .unwrap_or_else(|| self.config.author.clone())
    }

    fn persist_comments(&self, thread: Thread) {
        let Some(list) = self.threads.get(&thread) else {
            return;
        };
        if let Err(err) = self
            .cache
            .store(&thread.cache_key(), &encode_comments(&list.snapshot()))
        {
            tracing::warn!(?thread, ?err, "failed persisting comments");
        }
    }

    fn persist_posts(&self) {
        let res = serde_json::to_string(&self.feed.snapshot())
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.cache.store(POSTS_CACHE_KEY, &raw));
        if let Err(err) = res {
            tracing::warn!(?err, "failed persisting posts");
        }
    }

    fn dispatch<F>(&mut self, op: WriteOp, write: F)
    where
        F: 'static + Send + std::future::Future<Output = Result<(), Error>>,
    {
        self.dispatched += 1;
        self.dispatcher.dispatch(op, write);
    }

    /// Seed comments only ever change locally
    pub fn toggle_comment_like(&mut self, thread: Thread, id: CommentId) -> Option<(bool, u32)> {
        let list = self.list(thread);
        let (liked, likes) = list.toggle_like(id)?;
        if list.is_placeholder(id) {
            tracing::debug!(?thread, ?id, "seed comment like kept local");
            return Some((liked, likes));
        }
        self.persist_comments(thread);
        let gateway = self.gateway.clone();
        self.dispatch(
            WriteOp::CommentLike { thread, id, liked },
            async move {
                gateway
                    .write_like_state(thread, id, CommentLike { liked, likes })
                    .await
            },
        );
        Some((liked, likes))
    }

    pub fn submit_comment(&mut self, thread: Thread, text: &str) -> Result<Comment, Error> {
        let author = self.author();
        let now = self.clock.now();
        let comment = self.list(thread).submit(text, &author, now)?;
        self.persist_comments(thread);
        let gateway = self.gateway.clone();
        let written = comment.clone();
        self.dispatch(
            WriteOp::Comment {
                thread,
                id: comment.id,
            },
            async move { gateway.write_comment(thread, &written).await },
        );
        Ok(comment)
    }

    pub async fn refresh_comments(&mut self, thread: Thread) -> Freshness {
        let fetched = self
            .gateway
            .fetch_recent(thread.collection(), self.config.comment_fetch_limit)
            .await;
        let now = self.clock.now();
        match fetched {
            Ok(docs) => {
                let total = docs.len();
                let comments: Vec<Comment> = docs
                    .iter()
                    .filter_map(|d| Comment::from_document(d, now))
                    .collect();
                if comments.len() != total {
                    tracing::warn!(
                        ?thread,
                        dropped = total - comments.len(),
                        "dropped incomplete comment documents"
                    );
                }
                self.list(thread).replace_all(comments);
                self.persist_comments(thread);
                Freshness::Live
            }
            Err(err) => {
                tracing::warn!(?thread, %err, "fetching comments failed, falling back");
                let cached = load_comments(self.cache.as_ref(), thread);
                self.list(thread).merge_fallback(cached, now);
                Freshness::Fallback(err)
            }
        }
    }

    /// The placeholder post only ever changes locally
    pub fn toggle_post_like(&mut self, post: PostId) -> Option<(bool, u32)> {
        let (liked, likes) = self.feed.toggle_like(post)?;
        if self.feed.is_placeholder(post) {
            tracing::debug!(%post, "placeholder post like kept local");
            return Some((liked, likes));
        }
        self.persist_posts();
        let delta = LikeDelta::for_liked(liked);
        let gateway = self.gateway.clone();
        self.dispatch(WriteOp::PostLike { post, delta }, async move {
            gateway.increment_post_like_counter(post, delta).await
        });
        Some((liked, likes))
    }

    pub async fn refresh_posts(&mut self) -> Freshness {
        let fetched = self
            .gateway
            .fetch_recent(Collection::Posts, self.config.post_fetch_limit)
            .await;
        let now = self.clock.now();
        match fetched {
            Ok(docs) => {
                let total = docs.len();
                let posts: Vec<Post> = docs
                    .iter()
                    .filter_map(|d| Post::from_document(d, now))
                    .collect();
                if posts.len() != total {
                    tracing::warn!(
                        dropped = total - posts.len(),
                        "dropped incomplete post documents"
                    );
                }
                self.feed.replace_all(posts);
                self.persist_posts();
                Freshness::Live
            }
            Err(err) => {
                tracing::warn!(%err, "fetching posts failed, falling back");
                let cached = self.load_posts();
                self.feed.merge_fallback(cached, now);
                Freshness::Fallback(err)
            }
        }
    }

    fn load_posts(&self) -> Option<Vec<Post>> {
        let raw = match self.cache.load(POSTS_CACHE_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(?err, "failed loading cached posts");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(posts) => Some(posts),
            Err(err) => {
                tracing::warn!(%err, "ignoring unparsable cached posts");
                None
            }
        }
    }

    /// Publishes a post pointing to already-hosted media
    ///
    /// The feed only changes once the remote store accepted the post.
    pub async fn create_post(&mut self, media_ref: &str, caption: &str) -> Result<Post, Error> {
        let now = self.clock.now();
        let new_post = NewPost {
            id: self.feed.next_id(now),
            kind: MediaKind::from_url(media_ref),
            media_ref: String::from(media_ref),
            caption: String::from(caption.trim()),
            created_at: now,
        };
        let post = self.gateway.create_post(new_post).await?;
        tracing::info!(post_id = %post.id, "post created");
        self.feed.append_confirmed(post.clone());
        self.persist_posts();
        Ok(post)
    }

    /// Uploads media, waits for its public URL, then publishes the post
    pub async fn publish_upload(
        &mut self,
        kind: MediaKind,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<Post, Error> {
        validate_string(caption)?;
        let owner = self.gateway.session().ok_or(Error::NotAuthenticated)?;
        let now = self.clock.now();
        let id = self.feed.next_id(now);
        let path = MediaPath::for_post(owner.id, id, kind);

        self.gateway.upload_media(&path, kind, bytes).await?;
        tracing::debug!(%path, "media uploaded, resolving its URL");
        let gateway = &self.gateway;
        let url = resolve_with_retry(&self.config.media_retry, self.clock.as_ref(), || {
            gateway.resolve_media_url(&path)
        })
        .await?;

        let post = Post {
            id,
            owner_id: owner.id,
            kind,
            media_ref: url,
            storage_path: Some(path),
            caption: String::from(caption.trim()),
            created_at: now,
            like_count: 0,
        };
        self.gateway.write_post(&post).await?;
        tracing::info!(post_id = %post.id, "uploaded post published");
        self.feed.append_confirmed(post.clone());
        self.persist_posts();
        Ok(post)
    }

    pub async fn check_connectivity(&mut self) -> Connectivity {
        self.connectivity = Connectivity::Checking;
        let timeout = self.config.health_timeout;
        self.connectivity =
            match tokio::time::timeout(timeout, self.gateway.health_check()).await {
                Ok(Ok(())) => Connectivity::Connected,
                Ok(Err(err)) => Connectivity::Disconnected(err.to_string()),
                Err(_) => Connectivity::Disconnected(format!(
                    "health check timed out after {}ms",
                    timeout.as_millis()
                )),
            };
        tracing::info!(connectivity = ?self.connectivity, "connectivity checked");
        self.connectivity.clone()
    }
}

fn load_comments(cache: &dyn Cache, thread: Thread) -> Option<Vec<Comment>> {
    match cache.load(&thread.cache_key()) {
        Ok(raw) => raw.map(|raw| decode_comments(&raw)),
        Err(err) => {
            tracing::warn!(?thread, ?err, "failed loading cached comments");
            None
        }
    }
}
