use async_trait::async_trait;

use crate::api::{
    Account, Collection, Comment, CommentId, CommentLike, Credentials, Document, Error, LikeDelta,
    MediaKind, MediaPath, NewAccount, NewPost, Post, PostId, Thread,
};

/// Everything the client asks of the remote store, object storage and auth service
///
/// Implementations map backend failures into `Error` and never panic on them.
/// Writes are upserts keyed by id; `increment_post_like_counter` must be atomic
/// on the backend side.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Account of the active session, if any
    fn session(&self) -> Option<Account>;

    async fn register(&self, account: NewAccount) -> Result<Account, Error>;

    async fn login(&self, credentials: Credentials) -> Result<Account, Error>;

    async fn logout(&self) -> Result<(), Error>;

    async fn write_comment(&self, thread: Thread, comment: &Comment) -> Result<(), Error>;

    async fn write_like_state(
        &self,
        thread: Thread,
        id: CommentId,
        like: CommentLike,
    ) -> Result<(), Error>;

    async fn increment_post_like_counter(&self, post: PostId, delta: LikeDelta)
        -> Result<(), Error>;

    /// Up to `limit` documents, most recently created first
    async fn fetch_recent(
        &self,
        collection: Collection,
        limit: usize,
    ) -> Result<Vec<Document>, Error>;

    /// Checks that the media is reachable before writing anything
    async fn create_post(&self, post: NewPost) -> Result<Post, Error>;

    async fn upload_media(
        &self,
        path: &MediaPath,
        kind: MediaKind,
        bytes: Vec<u8>,
    ) -> Result<(), Error>;

    /// May fail for a while after the upload completed
    async fn resolve_media_url(&self, path: &MediaPath) -> Result<String, Error>;

    /// Writes a post whose media was already resolved
    async fn write_post(&self, post: &Post) -> Result<(), Error>;

    async fn health_check(&self) -> Result<(), Error>;
}
