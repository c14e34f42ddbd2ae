use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde_json::json;
use snapfeed_client::{
    api::{
        Account, AuthToken, Collection, Comment, CommentId, CommentLike, Credentials, Document,
        Error, LikeDelta, MediaKind, MediaPath, NewAccount, NewPost, Post, PostId, Thread, UserId,
        Uuid,
    },
    Gateway,
};

const HEALTH_COLLECTION: &str = "health";
const HEALTH_DOCUMENT: i64 = 0;

/// In-memory document store, object storage and auth service
///
/// Documents live in collections named by their path (`comments`, `posts`,
/// `posts/{id}/comments`) and are keyed by numeric id. User profiles are keyed
/// by uid.
pub struct MockServer {
    users: BTreeMap<UserId, MockUser>,
    sessions: HashMap<AuthToken, UserId>,
    collections: HashMap<String, BTreeMap<i64, Document>>,
    media: HashMap<MediaPath, StoredMedia>,
    url_propagation_misses: usize,
    base_url: String,
}

#[derive(Debug)]
struct MockUser {
    account: Account,
    // tests do not hash passwords
    password: String,
    profile: Document,
}

#[derive(Debug)]
struct StoredMedia {
    content_type: String,
    bytes: Vec<u8>,
    misses_left: usize,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::with_base_url("http://localhost")
    }

    /// `base_url` prefixes the download URLs handed out for stored media
    pub fn with_base_url(base_url: impl Into<String>) -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            sessions: HashMap::new(),
            collections: HashMap::new(),
            media: HashMap::new(),
            url_propagation_misses: 0,
            base_url: base_url.into(),
        }
    }

    /// Media uploaded from now on fails URL resolution `misses` times before succeeding
    pub fn set_url_propagation_misses(&mut self, misses: usize) {
        self.url_propagation_misses = misses;
    }

    /// Return the current number of users
    pub fn test_num_users(&self) -> usize {
        self.users.len()
    }

    pub fn register(&mut self, a: NewAccount) -> Result<AuthToken, Error> {
        a.validate()?;
        if self
            .users
            .values()
            .any(|u| u.account.email.eq_ignore_ascii_case(&a.email))
        {
            return Err(Error::EmailAlreadyUsed(a.email));
        }
        let account = Account {
            id: UserId(Uuid::new_v4()),
            email: a.email,
            username: a.username,
        };
        let mut profile = Document::new();
        profile.insert(String::from("uid"), json!(account.id.0));
        profile.insert(String::from("email"), json!(account.email));
        profile.insert(String::from("username"), json!(account.username));
        profile.insert(
            String::from("createdAt"),
            json!(chrono::Utc::now().timestamp_millis()),
        );
        let id = account.id;
        tracing::debug!(user = %id, "registered account");
        self.users.insert(
            id,
            MockUser {
                account,
                password: a.password,
                profile,
            },
        );
        Ok(self.open_session(id))
    }

    /// The `users` document written at registration
    pub fn user_document(&self, id: UserId) -> Option<&Document> {
        self.users.get(&id).map(|u| &u.profile)
    }

    fn open_session(&mut self, user: UserId) -> AuthToken {
        let tok = AuthToken(Uuid::new_v4());
        self.sessions.insert(tok, user);
        tok
    }

    pub fn login(&mut self, c: Credentials) -> Result<AuthToken, Error> {
        c.validate()?;
        let user = self
            .users
            .values()
            .find(|u| u.account.email.eq_ignore_ascii_case(&c.email) && u.password == c.password)
            .map(|u| u.account.id)
            .ok_or(Error::InvalidCredentials)?;
        Ok(self.open_session(user))
    }

    pub fn logout(&mut self, tok: AuthToken) -> Result<(), Error> {
        self.sessions
            .remove(&tok)
            .map(|_| ())
            .ok_or(Error::NotAuthenticated)
    }

    pub fn whoami(&self, tok: AuthToken) -> Result<Account, Error> {
        self.sessions
            .get(&tok)
            .and_then(|id| self.users.get(id))
            .map(|u| u.account.clone())
            .ok_or(Error::NotAuthenticated)
    }

    fn collection(&mut self, path: &str) -> &mut BTreeMap<i64, Document> {
        self.collections.entry(String::from(path)).or_default()
    }

    pub fn document(&self, path: &str, id: i64) -> Option<&Document> {
        self.collections.get(path)?.get(&id)
    }

    /// Replaces the whole document
    pub fn set_document(&mut self, path: &str, id: i64, doc: Document) {
        self.collection(path).insert(id, doc);
    }

    /// Overwrites the given fields, creating the document if needed
    pub fn merge_document(&mut self, path: &str, id: i64, fields: Document) {
        self.collection(path).entry(id).or_default().extend(fields);
    }

    /// Adds `delta` to a numeric field in place, a missing field counting as zero
    pub fn increment(&mut self, path: &str, id: i64, field: &str, delta: i64) -> Result<i64, Error> {
        let doc = self
            .collections
            .get_mut(path)
            .and_then(|c| c.get_mut(&id))
            .ok_or_else(|| Error::NotFound(format!("document {path}/{id}")))?;
        let value = doc.get(field).and_then(|v| v.as_i64()).unwrap_or(0) + delta;
        doc.insert(String::from(field), json!(value));
        Ok(value)
    }

    /// Documents ordered by their `time` field, most recent first
    ///
    /// Documents without a numeric `time` are not part of the ordering and are left out.
    pub fn list_recent(&self, path: &str, limit: usize) -> Vec<Document> {
        let Some(c) = self.collections.get(path) else {
            return Vec::new();
        };
        let mut docs: Vec<(i64, i64, &Document)> = c
            .iter()
            .filter_map(|(id, d)| Some((d.get("time")?.as_i64()?, *id, d)))
            .collect();
        docs.sort_unstable_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
        docs.into_iter()
            .take(limit)
            .map(|(_, _, d)| d.clone())
            .collect()
    }

    /// Users may only write media below `posts/{their uid}/`
    pub fn put_media(
        &mut self,
        tok: AuthToken,
        path: MediaPath,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), Error> {
        let owner = self.whoami(tok)?;
        if !path.0.starts_with(&format!("posts/{}/", owner.id)) {
            tracing::debug!(%path, user = %owner.id, "refusing media write outside of own folder");
            return Err(Error::NotAuthenticated);
        }
        self.media.insert(
            path,
            StoredMedia {
                content_type: String::from(content_type),
                bytes,
                misses_left: self.url_propagation_misses,
            },
        );
        Ok(())
    }

    pub fn media_url(&mut self, path: &MediaPath) -> Result<String, Error> {
        let m = self
            .media
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(format!("media {path}")))?;
        if m.misses_left > 0 {
            m.misses_left -= 1;
            return Err(Error::NotFound(String::from(
                "download URL not available yet",
            )));
        }
        Ok(format!("{}/api/media/{path}", self.base_url))
    }

    pub fn get_media(&self, path: &MediaPath) -> Option<(&str, &[u8])> {
        self.media
            .get(path)
            .map(|m| (m.content_type.as_str(), m.bytes.as_slice()))
    }

    /// Writes then reads back a probe document
    pub fn health(&mut self) -> Result<(), Error> {
        let doc = match json!({ "ok": true }) {
            serde_json::Value::Object(doc) => doc,
            _ => unreachable!(),
        };
        self.set_document(HEALTH_COLLECTION, HEALTH_DOCUMENT, doc.clone());
        match self.document(HEALTH_COLLECTION, HEALTH_DOCUMENT) {
            Some(read) if *read == doc => Ok(()),
            _ => Err(Error::RemoteUnavailable(String::from(
                "health document did not read back",
            ))),
        }
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

/// `Gateway` over a shared `MockServer`, with knobs to simulate failures
pub struct MockGateway {
    server: Arc<tokio::sync::Mutex<MockServer>>,
    session: parking_lot::Mutex<Option<(AuthToken, Account)>>,
    offline: AtomicBool,
    stalled_health: AtomicBool,
    probe_statuses: parking_lot::Mutex<HashMap<String, u16>>,
}

impl MockGateway {
    pub fn new(server: Arc<tokio::sync::Mutex<MockServer>>) -> MockGateway {
        MockGateway {
            server,
            session: parking_lot::Mutex::new(None),
            offline: AtomicBool::new(false),
            stalled_health: AtomicBool::new(false),
            probe_statuses: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn server(&self) -> &Arc<tokio::sync::Mutex<MockServer>> {
        &self.server
    }

    /// While offline, every remote call fails with `RemoteUnavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes health checks hang until the caller gives up
    pub fn stall_health_checks(&self, stalled: bool) {
        self.stalled_health.store(stalled, Ordering::SeqCst);
    }

    /// Status answered to reachability probes of `url`, 200 when unset
    pub fn set_probe_status(&self, url: &str, status: u16) {
        self.probe_statuses.lock().insert(String::from(url), status);
    }

    fn online(&self) -> Result<(), Error> {
        match self.offline.load(Ordering::SeqCst) {
            true => Err(Error::RemoteUnavailable(String::from("network is offline"))),
            false => Ok(()),
        }
    }

    fn token(&self) -> Result<AuthToken, Error> {
        self.session
            .lock()
            .as_ref()
            .map(|(t, _)| *t)
            .ok_or(Error::NotAuthenticated)
    }

    fn probe(&self, url: &str) -> Result<(), Error> {
        let status = self.probe_statuses.lock().get(url).copied().unwrap_or(200);
        match status {
            200..=399 => Ok(()),
            code => Err(Error::NotFound(format!("media URL not found (HTTP {code})"))),
        }
    }

    async fn start_session(&self, tok: AuthToken) -> Result<Account, Error> {
        let account = self.server.lock().await.whoami(tok)?;
        *self.session.lock() = Some((tok, account.clone()));
        Ok(account)
    }
}

#[async_trait::async_trait]
impl Gateway for MockGateway {
    fn session(&self) -> Option<Account> {
        self.session.lock().as_ref().map(|(_, a)| a.clone())
    }

    async fn register(&self, account: NewAccount) -> Result<Account, Error> {
        self.online()?;
        let tok = self.server.lock().await.register(account)?;
        self.start_session(tok).await
    }

    async fn login(&self, credentials: Credentials) -> Result<Account, Error> {
        self.online()?;
        let tok = self.server.lock().await.login(credentials)?;
        self.start_session(tok).await
    }

    async fn logout(&self) -> Result<(), Error> {
        let tok = self.token()?;
        *self.session.lock() = None;
        self.online()?;
        self.server.lock().await.logout(tok)
    }

    async fn write_comment(&self, thread: Thread, comment: &Comment) -> Result<(), Error> {
        self.online()?;
        self.server.lock().await.set_document(
            &thread.collection().path(),
            comment.id.0,
            comment.to_document(),
        );
        Ok(())
    }

    async fn write_like_state(
        &self,
        thread: Thread,
        id: CommentId,
        like: CommentLike,
    ) -> Result<(), Error> {
        self.online()?;
        let fields = match json!({ "liked": like.liked, "likes": like.likes }) {
            serde_json::Value::Object(f) => f,
            _ => unreachable!(),
        };
        self.server
            .lock()
            .await
            .merge_document(&thread.collection().path(), id.0, fields);
        Ok(())
    }

    async fn increment_post_like_counter(
        &self,
        post: PostId,
        delta: LikeDelta,
    ) -> Result<(), Error> {
        self.token()?;
        self.online()?;
        self.server.lock().await.increment(
            &Collection::Posts.path(),
            post.0,
            "likes",
            i64::from(delta),
        )?;
        Ok(())
    }

    async fn fetch_recent(
        &self,
        collection: Collection,
        limit: usize,
    ) -> Result<Vec<Document>, Error> {
        self.online()?;
        Ok(self.server.lock().await.list_recent(&collection.path(), limit))
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, Error> {
        let (_, owner) = self
            .session
            .lock()
            .clone()
            .ok_or(Error::NotAuthenticated)?;
        post.validate()?;
        self.online()?;
        self.probe(post.media_ref.trim())?;
        let post = post.into_post(owner.id);
        self.write_post(&post).await?;
        Ok(post)
    }

    async fn upload_media(
        &self,
        path: &MediaPath,
        kind: MediaKind,
        bytes: Vec<u8>,
    ) -> Result<(), Error> {
        let tok = self.token()?;
        self.online()?;
        self.server
            .lock()
            .await
            .put_media(tok, path.clone(), kind.content_type(), bytes)
    }

    async fn resolve_media_url(&self, path: &MediaPath) -> Result<String, Error> {
        self.online()?;
        self.server.lock().await.media_url(path)
    }

    async fn write_post(&self, post: &Post) -> Result<(), Error> {
        self.token()?;
        self.online()?;
        self.server
            .lock()
            .await
            .set_document(&Collection::Posts.path(), post.id.0, post.to_document());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        if self.stalled_health.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.online()?;
        self.server.lock().await.health()
    }
}
