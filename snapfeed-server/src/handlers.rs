use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use snapfeed_api::{
    validate_string, Account, AuthToken, Collection, Comment, CommentLike, Credentials, Document,
    Error as ApiError, MediaPath, NewAccount, Post, PostId, PostLikeIncrement, Thread,
    ValidationError, MAX_COMMENT_CHARS,
};

use crate::{extractors::*, Error};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(serde::Deserialize)]
pub struct Limit {
    limit: Option<usize>,
}

impl Limit {
    fn get(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(data): Json<NewAccount>,
) -> Result<Json<AuthToken>, Error> {
    Ok(Json(state.store.lock().await.register(data)?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(data): Json<Credentials>,
) -> Result<Json<AuthToken>, Error> {
    Ok(Json(state.store.lock().await.login(data)?))
}

pub async fn logout(PreAuth(token): PreAuth, State(state): State<AppState>) -> Result<(), Error> {
    Ok(state.store.lock().await.logout(token)?)
}

pub async fn whoami(Auth(_, account): Auth) -> Json<Account> {
    Json(account)
}

pub async fn health(State(state): State<AppState>) -> Result<(), Error> {
    Ok(state.store.lock().await.health()?)
}

async fn list(state: &AppState, collection: Collection, limit: &Limit) -> Json<Vec<Document>> {
    Json(
        state
            .store
            .lock()
            .await
            .list_recent(&collection.path(), limit.get()),
    )
}

fn check_comment(id: i64, doc: &Document) -> Result<(), Error> {
    let c = Comment::from_document(doc, Utc::now()).ok_or_else(Error::missing_fields)?;
    if c.id.0 != id {
        return Err(Error::missing_fields());
    }
    validate_string(&c.author)?;
    validate_string(&c.text)?;
    if c.text.trim().is_empty() {
        return Err(ApiError::Validation(ValidationError::EmptyText).into());
    }
    let len = c.text.chars().count();
    if len > MAX_COMMENT_CHARS {
        return Err(ApiError::Validation(ValidationError::TextTooLong {
            len,
            max: MAX_COMMENT_CHARS,
        })
        .into());
    }
    Ok(())
}

async fn put_comment(state: &AppState, thread: Thread, id: i64, doc: Document) -> Result<(), Error> {
    check_comment(id, &doc)?;
    tracing::debug!(?thread, id, "writing comment");
    state
        .store
        .lock()
        .await
        .set_document(&thread.collection().path(), id, doc);
    Ok(())
}

async fn like_comment(state: &AppState, thread: Thread, id: i64, like: CommentLike) {
    let fields = match serde_json::json!({ "liked": like.liked, "likes": like.likes }) {
        serde_json::Value::Object(f) => f,
        _ => unreachable!(),
    };
    state
        .store
        .lock()
        .await
        .merge_document(&thread.collection().path(), id, fields);
}

pub async fn list_comments(
    State(state): State<AppState>,
    Query(limit): Query<Limit>,
) -> Json<Vec<Document>> {
    list(&state, Collection::Comments(Thread::Global), &limit).await
}

pub async fn write_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(doc): Json<Document>,
) -> Result<(), Error> {
    put_comment(&state, Thread::Global, id, doc).await
}

pub async fn write_comment_like(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(like): Json<CommentLike>,
) {
    like_comment(&state, Thread::Global, id, like).await
}

pub async fn list_post_comments(
    State(state): State<AppState>,
    Path(post): Path<i64>,
    Query(limit): Query<Limit>,
) -> Json<Vec<Document>> {
    list(&state, Collection::Comments(Thread::Post(PostId(post))), &limit).await
}

pub async fn write_post_comment(
    State(state): State<AppState>,
    Path((post, id)): Path<(i64, i64)>,
    Json(doc): Json<Document>,
) -> Result<(), Error> {
    put_comment(&state, Thread::Post(PostId(post)), id, doc).await
}

pub async fn write_post_comment_like(
    State(state): State<AppState>,
    Path((post, id)): Path<(i64, i64)>,
    Json(like): Json<CommentLike>,
) {
    like_comment(&state, Thread::Post(PostId(post)), id, like).await
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(limit): Query<Limit>,
) -> Json<Vec<Document>> {
    list(&state, Collection::Posts, &limit).await
}

pub async fn write_post(
    Auth(_, account): Auth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(doc): Json<Document>,
) -> Result<(), Error> {
    let post = Post::from_document(&doc, Utc::now()).ok_or_else(Error::missing_fields)?;
    if post.id.0 != id {
        return Err(Error::missing_fields());
    }
    if post.owner_id != account.id {
        return Err(Error::not_authenticated());
    }
    validate_string(&post.caption)?;
    tracing::debug!(post_id = id, owner = %account.id, "writing post");
    state
        .store
        .lock()
        .await
        .set_document(&Collection::Posts.path(), id, doc);
    Ok(())
}

pub async fn like_post(
    Auth(..): Auth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(inc): Json<PostLikeIncrement>,
) -> Result<(), Error> {
    let likes = state.store.lock().await.increment(
        &Collection::Posts.path(),
        id,
        "likes",
        i64::from(inc.delta),
    )?;
    tracing::debug!(post_id = id, likes, "post like counter moved");
    Ok(())
}

pub async fn put_media(
    Auth(token, _): Auth,
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(), Error> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    Ok(state.store.lock().await.put_media(
        token,
        MediaPath(path),
        content_type,
        body.to_vec(),
    )?)
}

pub async fn get_media(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let path = MediaPath(path);
    let store = state.store.lock().await;
    let (content_type, bytes) = store
        .get_media(&path)
        .ok_or_else(|| Error::not_found(format!("media {path}")))?;
    Ok((
        [(header::CONTENT_TYPE, String::from(content_type))],
        bytes.to_vec(),
    ))
}

pub async fn media_url(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<String>, Error> {
    Ok(Json(state.store.lock().await.media_url(&MediaPath(path))?))
}
