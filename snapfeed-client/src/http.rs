use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    api::{
        Account, AuthToken, Collection, Comment, CommentId, CommentLike, Credentials, Document,
        Error, LikeDelta, MediaKind, MediaPath, NewAccount, NewPost, Post, PostId,
        PostLikeIncrement, Thread,
    },
    Gateway,
};

#[derive(Clone, Debug)]
struct Session {
    token: AuthToken,
    account: Account,
}

/// Gateway talking to a snapfeed server over its REST API
pub struct HttpGateway {
    host: String,
    client: reqwest::Client,
    probe_timeout: Duration,
    session: Mutex<Option<Session>>,
}

fn transport(e: reqwest::Error) -> Error {
    Error::RemoteUnavailable(e.to_string())
}

/// Maps a non-success response into the error it carries
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.bytes().await.map_err(transport)?;
    Err(match Error::parse(&body) {
        Ok(e) => e,
        Err(_) if status.is_server_error() => {
            Error::RemoteUnavailable(format!("server answered HTTP {status}"))
        }
        Err(_) => Error::Unknown(format!("server answered HTTP {status}")),
    })
}

async fn json<T: for<'de> serde::Deserialize<'de>>(resp: reqwest::Response) -> Result<T, Error> {
    check(resp)
        .await?
        .json()
        .await
        .map_err(|e| Error::Unknown(format!("parsing server response: {e}")))
}

/// Checks that `url` answers a HEAD request with a 2xx or 3xx status
///
/// The request runs on its own task, so a slow remote never holds the caller's.
pub async fn probe_reachable(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<(), Error> {
    let req = client.head(url).timeout(timeout).send();
    let res = tokio::spawn(req)
        .await
        .map_err(|e| Error::Unknown(format!("reachability probe task failed: {e}")))?;
    match res {
        Ok(resp) if (200..=399).contains(&resp.status().as_u16()) => Ok(()),
        Ok(resp) => Err(Error::NotFound(format!(
            "media URL not found (HTTP {})",
            resp.status().as_u16()
        ))),
        Err(e) => Err(Error::NotFound(format!("media URL unreachable: {e}"))),
    }
}

impl HttpGateway {
    pub fn new(host: impl Into<String>) -> HttpGateway {
        HttpGateway {
            host: host.into(),
            client: reqwest::Client::new(),
            probe_timeout: Duration::from_secs(5),
            session: Mutex::new(None),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> HttpGateway {
        self.probe_timeout = timeout;
        self
    }

    /// Restores a session from a previously issued token
    pub async fn resume(&self, token: AuthToken) -> Result<Account, Error> {
        let account: Account = json(
            self.client
                .get(self.url("whoami"))
                .bearer_auth(token.0)
                .send()
                .await
                .map_err(transport)?,
        )
        .await?;
        *self.session.lock() = Some(Session {
            token,
            account: account.clone(),
        });
        tracing::info!(user = %account.username, "session started");
        Ok(account)
    }

    pub fn token(&self) -> Option<AuthToken> {
        self.session.lock().as_ref().map(|s| s.token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.host, path)
    }

    fn require_token(&self) -> Result<AuthToken, Error> {
        self.token().ok_or(Error::NotAuthenticated)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(t) => req.bearer_auth(t.0),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<(), Error> {
        check(self.authed(req).send().await.map_err(transport)?).await?;
        Ok(())
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    fn session(&self) -> Option<Account> {
        self.session.lock().as_ref().map(|s| s.account.clone())
    }

    async fn register(&self, account: NewAccount) -> Result<Account, Error> {
        account.validate()?;
        let token: AuthToken = json(
            self.client
                .post(self.url("register"))
                .json(&account)
                .send()
                .await
                .map_err(transport)?,
        )
        .await?;
        self.resume(token).await
    }

    async fn login(&self, credentials: Credentials) -> Result<Account, Error> {
        credentials.validate()?;
        let token: AuthToken = json(
            self.client
                .post(self.url("login"))
                .json(&credentials)
                .send()
                .await
                .map_err(transport)?,
        )
        .await?;
        self.resume(token).await
    }

    async fn logout(&self) -> Result<(), Error> {
        let token = self.require_token()?;
        self.send(self.client.post(self.url("logout"))).await?;
        let mut session = self.session.lock();
        if session.as_ref().map(|s| s.token) == Some(token) {
            *session = None;
        }
        Ok(())
    }

    async fn write_comment(&self, thread: Thread, comment: &Comment) -> Result<(), Error> {
        let path = format!("{}/{}", thread.collection().path(), comment.id.0);
        self.send(self.client.put(self.url(&path)).json(&comment.to_document()))
            .await
    }

    async fn write_like_state(
        &self,
        thread: Thread,
        id: CommentId,
        like: CommentLike,
    ) -> Result<(), Error> {
        let path = format!("{}/{}/like", thread.collection().path(), id.0);
        self.send(self.client.patch(self.url(&path)).json(&like))
            .await
    }

    async fn increment_post_like_counter(
        &self,
        post: PostId,
        delta: LikeDelta,
    ) -> Result<(), Error> {
        self.require_token()?;
        self.send(
            self.client
                .post(self.url(&format!("posts/{post}/like")))
                .json(&PostLikeIncrement { delta }),
        )
        .await
    }

    async fn fetch_recent(
        &self,
        collection: Collection,
        limit: usize,
    ) -> Result<Vec<Document>, Error> {
        json(
            self.authed(self.client.get(self.url(&collection.path())))
                .query(&[("limit", limit)])
                .send()
                .await
                .map_err(transport)?,
        )
        .await
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, Error> {
        let owner = self.session().ok_or(Error::NotAuthenticated)?;
        post.validate()?;
        probe_reachable(&self.client, post.media_ref.trim(), self.probe_timeout).await?;
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
        self.require_token()?;
        self.send(
            self.client
                .put(self.url(&format!("media/{path}")))
                .header(reqwest::header::CONTENT_TYPE, kind.content_type())
                .body(bytes),
        )
        .await
    }

    async fn resolve_media_url(&self, path: &MediaPath) -> Result<String, Error> {
        json(
            self.client
                .get(self.url(&format!("media-url/{path}")))
                .send()
                .await
                .map_err(transport)?,
        )
        .await
    }

    async fn write_post(&self, post: &Post) -> Result<(), Error> {
        self.require_token()?;
        self.send(
            self.client
                .put(self.url(&format!("posts/{}", post.id)))
                .json(&post.to_document()),
        )
        .await
    }

    async fn health_check(&self) -> Result<(), Error> {
        self.send(self.client.get(self.url("health"))).await
    }
}
