use std::{sync::Arc, time::Duration};

use serde_json::json;
use snapfeed_client::{
    api::{
        time_from_millis, Comment, CommentId, Credentials, Document, Error, LikeDelta, MediaKind,
        NewAccount, PostId, Thread, Time, ValidationError,
    },
    ClientConfig, Completion, Connectivity, Freshness, Gateway, Interactions, ManualClock,
    MemoryCache, WriteOp, PLACEHOLDER_MEDIA,
};
use snapfeed_mock_server::{MockGateway, MockServer};
use tokio::sync::mpsc;

const START_MS: i64 = 1_700_000_000_000;

type Store = Arc<tokio::sync::Mutex<MockServer>>;

struct Harness {
    server: Store,
    gateway: Arc<MockGateway>,
    clock: Arc<ManualClock>,
    app: Interactions,
    completions: mpsc::UnboundedReceiver<Completion>,
}

fn store() -> Store {
    Arc::new(tokio::sync::Mutex::new(MockServer::new()))
}

fn harness_with(server: Store, config: ClientConfig) -> Harness {
    let gateway = Arc::new(MockGateway::new(server.clone()));
    let clock = Arc::new(ManualClock::new(time_from_millis(START_MS).unwrap()));
    let (app, completions) = Interactions::new(
        gateway.clone(),
        clock.clone(),
        Arc::new(MemoryCache::new()),
        config,
    );
    Harness {
        server,
        gateway,
        clock,
        app,
        completions,
    }
}

fn harness(server: Store) -> Harness {
    harness_with(server, ClientConfig::default())
}

impl Harness {
    async fn register(&self, email: &str, username: &str) {
        self.gateway
            .register(NewAccount::new(email, String::from("secret"), username))
            .await
            .unwrap();
    }

    async fn completion(&mut self) -> Completion {
        self.completions.recv().await.unwrap()
    }
}

fn doc(v: serde_json::Value) -> Document {
    v.as_object().unwrap().clone()
}

fn at(ms: i64) -> Time {
    time_from_millis(ms).unwrap()
}

async fn seed_post(server: &Store, id: i64) {
    server.lock().await.set_document(
        "posts",
        id,
        doc(json!({
            "id": id,
            "uid": "ffffffff-ffff-ffff-ffff-ffffffffffff",
            "kind": "image",
            "uri": format!("https://img.example/{id}.jpg"),
            "time": id,
            "likes": 0,
        })),
    );
}

#[tokio::test]
async fn submitted_comments_reach_the_store_with_the_session_name() {
    let mut h = harness(store());
    h.register("ann@example.com", "ann").await;
    h.app.open(Thread::Global);
    let c = h.app.submit_comment(Thread::Global, "  Great work!  ").unwrap();
    assert_eq!(c.author, "ann");
    assert_eq!(c.text, "Great work!");
    assert_eq!(h.app.comments(Thread::Global)[0], c);

    let done = h.completion().await;
    assert_eq!(
        done,
        Completion {
            op: WriteOp::Comment {
                thread: Thread::Global,
                id: c.id
            },
            result: Ok(())
        }
    );
    let server = h.server.lock().await;
    let stored = Comment::from_document(server.document("comments", c.id.0).unwrap(), at(0));
    assert_eq!(stored, Some(c));
}

#[tokio::test]
async fn anonymous_comments_use_the_configured_author() {
    let mut h = harness(store());
    let c = h.app.submit_comment(Thread::Global, "hi").unwrap();
    assert_eq!(c.author, "you");
    assert_eq!(h.completion().await.result, Ok(()));
}

#[tokio::test]
async fn blank_comments_are_rejected_without_dispatch() {
    let mut h = harness(store());
    for text in ["", " "] {
        assert_eq!(
            h.app.submit_comment(Thread::Global, text),
            Err(Error::Validation(ValidationError::EmptyText))
        );
    }
    assert!(h.app.comments(Thread::Global).is_empty());
    assert!(h.completions.try_recv().is_err());
}

#[tokio::test]
async fn sixth_comment_within_a_minute_is_rate_limited() {
    let mut h = harness(store());
    let thread = Thread::Post(PostId(9));
    for i in 0..5 {
        h.app
            .submit_comment(thread, &format!("comment {i}"))
            .unwrap();
        h.clock.advance(Duration::from_secs(1));
    }
    assert_eq!(
        h.app.submit_comment(thread, "one too many"),
        Err(Error::RateLimited {
            retry_after: Duration::from_secs(55)
        })
    );
    assert_eq!(h.app.comments(thread).len(), 5);

    // the first submission is now exactly one window old
    h.clock.advance(Duration::from_secs(55));
    h.app.submit_comment(thread, "one too many").unwrap();
    assert_eq!(h.app.comments(thread).len(), 6);

    for _ in 0..6 {
        assert_eq!(h.completion().await.result, Ok(()));
    }
    assert_eq!(
        h.server.lock().await.list_recent("posts/9/comments", 50).len(),
        6
    );
}

#[tokio::test]
async fn comment_likes_are_mirrored_remotely() {
    let mut h = harness(store());
    h.server.lock().await.set_document(
        "comments",
        10,
        doc(json!({"id": 10, "user": "bob", "time": 10, "text": "hey", "likes": 2})),
    );
    assert_eq!(h.app.refresh_comments(Thread::Global).await, Freshness::Live);

    assert_eq!(
        h.app.toggle_comment_like(Thread::Global, CommentId(10)),
        Some((true, 3))
    );
    assert_eq!(h.completion().await.result, Ok(()));
    let server = h.server.lock().await;
    let stored = server.document("comments", 10).unwrap();
    assert_eq!(stored["liked"], json!(true));
    assert_eq!(stored["likes"], json!(3));
    assert_eq!(stored["text"], json!("hey"));
    drop(server);

    assert_eq!(
        h.app.toggle_comment_like(Thread::Global, CommentId(99)),
        None
    );
}

#[tokio::test]
async fn failed_writes_keep_the_optimistic_state() {
    let mut h = harness(store());
    h.server.lock().await.set_document(
        "comments",
        10,
        doc(json!({"id": 10, "user": "bob", "time": 10, "text": "hey"})),
    );
    h.app.refresh_comments(Thread::Global).await;
    h.gateway.set_offline(true);

    assert_eq!(
        h.app.toggle_comment_like(Thread::Global, CommentId(10)),
        Some((true, 1))
    );
    assert!(matches!(
        h.completion().await.result,
        Err(Error::RemoteUnavailable(_))
    ));
    let c = &h.app.comments(Thread::Global)[0];
    assert!(c.liked_by_me);
    assert_eq!(c.like_count, 1);
}

#[tokio::test]
async fn incomplete_documents_are_dropped_at_the_read_boundary() {
    let mut h = harness(store());
    {
        let mut server = h.server.lock().await;
        server.set_document(
            "comments",
            1,
            doc(json!({"id": 1, "user": "ann", "time": 1, "text": "ok", "likes": -3})),
        );
        server.set_document("comments", 2, doc(json!({"id": 2, "time": 2, "text": "anonymous"})));
        server.set_document("comments", 3, doc(json!({"user": "bob", "time": 3, "text": "no id"})));
    }
    assert_eq!(h.app.refresh_comments(Thread::Global).await, Freshness::Live);
    let comments = h.app.comments(Thread::Global);
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].like_count, 0);

    seed_post(&h.server, 5).await;
    h.server.lock().await.set_document(
        "posts",
        6,
        doc(json!({"id": 6, "uid": "ffffffff-ffff-ffff-ffff-ffffffffffff", "kind": "image", "uri": " ", "time": 6})),
    );
    h.app.refresh_posts().await;
    let ids: Vec<_> = h.app.feed().posts().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![PostId(5)]);
}

#[tokio::test]
async fn offline_comments_fall_back_to_cache_then_seed() {
    let server = store();
    let mut h = harness(server.clone());
    h.gateway.set_offline(true);

    // nothing cached yet: seed comments
    let res = h.app.refresh_comments(Thread::Global).await;
    assert!(matches!(res, Freshness::Fallback(Error::RemoteUnavailable(_))));
    let authors: Vec<_> = h
        .app
        .comments(Thread::Global)
        .iter()
        .map(|c| c.author.as_str())
        .collect();
    assert_eq!(authors, vec!["chloesim___", "alexmkeith", "grassrootssp"]);

    // a live snapshot gets cached
    h.gateway.set_offline(false);
    server.lock().await.set_document(
        "comments",
        7,
        doc(json!({"id": 7, "user": "dan", "time": 7, "text": "live | one"})),
    );
    assert_eq!(h.app.refresh_comments(Thread::Global).await, Freshness::Live);

    h.gateway.set_offline(true);
    h.app.refresh_comments(Thread::Global).await;
    let comments = h.app.comments(Thread::Global);
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "live | one");
}

#[tokio::test]
async fn offline_feed_shows_previous_snapshot_or_placeholder() {
    let mut h = harness(store());
    h.gateway.set_offline(true);
    assert!(matches!(
        h.app.refresh_posts().await,
        Freshness::Fallback(_)
    ));
    assert_eq!(h.app.feed().posts().len(), 1);
    assert_eq!(h.app.feed().posts()[0].media_ref, PLACEHOLDER_MEDIA);

    h.gateway.set_offline(false);
    seed_post(&h.server, 5).await;
    seed_post(&h.server, 8).await;
    assert_eq!(h.app.refresh_posts().await, Freshness::Live);

    h.gateway.set_offline(true);
    h.app.refresh_posts().await;
    let ids: Vec<_> = h.app.feed().posts().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![PostId(8), PostId(5)]);
}

#[tokio::test]
async fn seed_entities_never_leave_the_device() {
    let mut h = harness(store());
    h.gateway.set_offline(true);
    h.app.refresh_posts().await;
    h.app.refresh_comments(Thread::Global).await;
    let placeholder = h.app.feed().posts()[0].id;
    let seed_comment = h.app.comments(Thread::Global)[0].id;
    assert!(h.app.feed().is_placeholder(placeholder));

    h.gateway.set_offline(false);
    assert_eq!(h.app.toggle_post_like(placeholder), Some((true, 1)));
    assert_eq!(
        h.app.toggle_comment_like(Thread::Global, seed_comment),
        Some((true, 1))
    );
    assert_eq!(h.app.dispatched(), 0);
    assert!(h.completions.try_recv().is_err());
    {
        let server = h.server.lock().await;
        assert!(server.document("posts", placeholder.0).is_none());
        assert!(server.list_recent("comments", 50).is_empty());
    }

    // a real comment next to the seeds is written and cached alone
    let mine = h.app.submit_comment(Thread::Global, "for real").unwrap();
    assert_eq!(h.app.dispatched(), 1);
    assert_eq!(h.completion().await.result, Ok(()));

    h.gateway.set_offline(true);
    h.app.refresh_comments(Thread::Global).await;
    assert_eq!(h.app.comments(Thread::Global), &[mine]);
    h.app.refresh_posts().await;
    let posts = h.app.feed().posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].media_ref, PLACEHOLDER_MEDIA);
    assert_eq!(posts[0].like_count, 0);
}

#[tokio::test]
async fn post_with_missing_media_is_not_created() {
    let mut h = harness(store());
    h.register("ann@example.com", "ann").await;
    h.gateway
        .set_probe_status("https://img.example/gone.jpg", 404);

    let res = h
        .app
        .create_post("https://img.example/gone.jpg", "sunset")
        .await;
    assert_eq!(
        res,
        Err(Error::NotFound(String::from(
            "media URL not found (HTTP 404)"
        )))
    );
    assert!(h.app.feed().posts().is_empty());
    assert!(h.server.lock().await.list_recent("posts", 10).is_empty());
}

#[tokio::test]
async fn post_creation_validates_and_needs_a_session() {
    let mut h = harness(store());
    assert_eq!(
        h.app.create_post("https://img.example/a.jpg", "").await,
        Err(Error::NotAuthenticated)
    );
    h.register("ann@example.com", "ann").await;
    assert_eq!(
        h.app.create_post("ftp://img.example/a.jpg", "").await,
        Err(Error::Validation(ValidationError::UnsupportedScheme {
            media_ref: String::from("ftp://img.example/a.jpg")
        }))
    );
    assert_eq!(
        h.app.create_post("   ", "").await,
        Err(Error::Validation(ValidationError::BlankMediaRef))
    );

    let post = h
        .app
        .create_post("https://img.example/clip.mp4", " waves ")
        .await
        .unwrap();
    assert_eq!(post.kind, MediaKind::Video);
    assert_eq!(post.caption, "waves");
    assert_eq!(post.like_count, 0);
    assert_eq!(h.app.feed().posts(), &[post.clone()]);
    assert!(h.server.lock().await.document("posts", post.id.0).is_some());
}

#[tokio::test]
async fn concurrent_post_likes_from_two_viewers_add_up() {
    let server = store();
    seed_post(&server, 5).await;
    let mut ann = harness(server.clone());
    let mut bob = harness(server.clone());
    ann.register("ann@example.com", "ann").await;
    bob.register("bob@example.com", "bob").await;
    ann.app.refresh_posts().await;
    bob.app.refresh_posts().await;

    assert_eq!(ann.app.toggle_post_like(PostId(5)), Some((true, 1)));
    assert_eq!(bob.app.toggle_post_like(PostId(5)), Some((true, 1)));
    let (a, b) = futures::join!(ann.completion(), bob.completion());
    assert_eq!(a.result, Ok(()));
    assert_eq!(b.result, Ok(()));
    assert_eq!(
        server.lock().await.document("posts", 5).unwrap()["likes"],
        json!(2)
    );

    ann.app.refresh_posts().await;
    assert_eq!(ann.app.feed().posts()[0].like_count, 2);
}

#[tokio::test]
async fn post_likes_without_session_stay_local() {
    let mut h = harness(store());
    seed_post(&h.server, 5).await;
    h.app.refresh_posts().await;

    assert_eq!(h.app.toggle_post_like(PostId(5)), Some((true, 1)));
    assert_eq!(
        h.completion().await,
        Completion {
            op: WriteOp::PostLike {
                post: PostId(5),
                delta: LikeDelta::Up
            },
            result: Err(Error::NotAuthenticated)
        }
    );
    assert!(h.app.feed().is_liked(PostId(5)));
    assert_eq!(h.app.feed().posts()[0].like_count, 1);
    assert_eq!(
        h.server.lock().await.document("posts", 5).unwrap()["likes"],
        json!(0)
    );
}

#[tokio::test]
async fn uploads_wait_for_their_url_to_propagate() {
    let mut h = harness(store());
    h.register("ann@example.com", "ann").await;
    h.server.lock().await.set_url_propagation_misses(3);

    let post = h
        .app
        .publish_upload(MediaKind::Image, vec![0xff, 0xd8], "sunset")
        .await
        .unwrap();
    assert_eq!(
        h.clock.sleeps(),
        vec![
            Duration::from_millis(300),
            Duration::from_millis(600),
            Duration::from_millis(1200),
        ]
    );
    let owner = h.gateway.session().unwrap().id;
    let path = format!("posts/{owner}/{}.jpg", post.id);
    assert_eq!(post.media_ref, format!("http://localhost/api/media/{path}"));
    assert_eq!(post.storage_path.as_ref().map(|p| p.0.as_str()), Some(path.as_str()));
    assert_eq!(h.app.feed().posts(), &[post.clone()]);

    let server = h.server.lock().await;
    assert_eq!(server.document("posts", post.id.0).unwrap()["path"], json!(path));
}

#[tokio::test]
async fn uploads_give_up_after_four_attempts() {
    let mut h = harness(store());
    h.register("ann@example.com", "ann").await;
    h.server.lock().await.set_url_propagation_misses(10);

    let res = h
        .app
        .publish_upload(MediaKind::Video, vec![0, 0, 0, 0x18], "")
        .await;
    assert!(matches!(res, Err(Error::RemoteUnavailable(_))), "got {res:?}");
    assert_eq!(h.clock.sleeps().len(), 3);
    assert!(h.app.feed().posts().is_empty());
    assert!(h.server.lock().await.list_recent("posts", 10).is_empty());
}

#[tokio::test]
async fn uploads_need_a_session() {
    let mut h = harness(store());
    assert_eq!(
        h.app.publish_upload(MediaKind::Image, vec![1], "").await,
        Err(Error::NotAuthenticated)
    );
}

#[tokio::test]
async fn connectivity_follows_health_checks() {
    let config = ClientConfig {
        health_timeout: Duration::from_millis(50),
        ..ClientConfig::default()
    };
    let mut h = harness_with(store(), config);
    assert_eq!(h.app.connectivity(), &Connectivity::Checking);
    assert_eq!(h.app.check_connectivity().await, Connectivity::Connected);

    h.gateway.set_offline(true);
    assert!(matches!(
        h.app.check_connectivity().await,
        Connectivity::Disconnected(_)
    ));

    h.gateway.set_offline(false);
    h.gateway.stall_health_checks(true);
    assert_eq!(
        h.app.check_connectivity().await,
        Connectivity::Disconnected(String::from("health check timed out after 50ms"))
    );
}

#[tokio::test]
async fn logging_in_again_restores_the_session() {
    let h = harness(store());
    h.register("ann@example.com", "ann").await;
    h.gateway.logout().await.unwrap();
    assert_eq!(h.gateway.session(), None);
    assert_eq!(
        h.gateway
            .login(Credentials::new("ann@example.com", String::from("nope!!")))
            .await,
        Err(Error::InvalidCredentials)
    );
    let account = h
        .gateway
        .login(Credentials::new("ann@example.com", String::from("secret")))
        .await
        .unwrap();
    assert_eq!(account.username, "ann");
}
