use std::sync::Arc;

use anyhow::Context;
use rand::{seq::SliceRandom, Rng};
use snapfeed_client::{
    api::{MediaKind, NewAccount, PostId, Thread},
    ClientConfig, Gateway, HttpGateway, Interactions, MemoryCache, SystemClock,
};
use tracing_subscriber::EnvFilter;

const NUM_USERS: usize = 3;
const POSTS_PER_USER: usize = 4;
const GLOBAL_COMMENTS_PER_USER: usize = 3;
const COMMENTS_PER_POST: usize = 2;
const CAPTION_WORDS: usize = 6;
const COMMENT_WORDS: usize = 15;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Server to populate, usually a freshly started snapfeed-server
    #[structopt(short, long, env = "SNAPFEED_HOST")]
    host: String,
}

fn gen_text(max_words: usize) -> String {
    let n = rand::thread_rng().gen_range(1..=max_words);
    lipsum::lipsum_words(n)
}

fn gen_media() -> (MediaKind, Vec<u8>) {
    let mut rng = rand::thread_rng();
    let kind = *[MediaKind::Image, MediaKind::Video]
        .choose(&mut rng)
        .unwrap_or(&MediaKind::Image);
    let len = rng.gen_range(16..256);
    (kind, (0..len).map(|_| rng.gen()).collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let opt = <Opt as structopt::StructOpt>::from_args();
    let suffix: u32 = rand::thread_rng().gen();

    let mut users = Vec::new();
    for i in 0..NUM_USERS {
        let gateway = Arc::new(HttpGateway::new(&opt.host));
        let name = format!("user{i}_{suffix}");
        gateway
            .register(NewAccount::new(
                &format!("{name}@example.com"),
                String::from("password"),
                &name,
            ))
            .await
            .with_context(|| format!("registering {name}"))?;
        let (app, completions) = Interactions::new(
            gateway,
            Arc::new(SystemClock),
            Arc::new(MemoryCache::new()),
            ClientConfig::default(),
        );
        users.push((app, completions, 0usize));
    }

    // Posts
    let mut posts: Vec<PostId> = Vec::new();
    for (app, _, _) in users.iter_mut() {
        // picks up the ids of the posts other users just published
        app.refresh_posts().await;
        for _ in 0..POSTS_PER_USER {
            let (kind, bytes) = gen_media();
            let post = app
                .publish_upload(kind, bytes, &gen_text(CAPTION_WORDS))
                .await
                .context("publishing generated post")?;
            posts.push(post.id);
        }
    }
    tracing::info!(count = posts.len(), "posts published");

    // Comments, then random likes on everything. Users take turns and reload
    // each thread first, so their comment ids stay above the stored ones.
    let mut failures = 0;
    let threads: Vec<(Thread, usize)> = std::iter::once((Thread::Global, GLOBAL_COMMENTS_PER_USER))
        .chain(posts.iter().map(|p| (Thread::Post(*p), COMMENTS_PER_POST)))
        .collect();
    for (app, completions, awaited) in users.iter_mut() {
        for (thread, count) in &threads {
            app.refresh_comments(*thread).await;
            for _ in 0..*count {
                app.submit_comment(*thread, &gen_text(COMMENT_WORDS))?;
            }
        }
        app.refresh_posts().await;
        for post in &posts {
            if rand::thread_rng().gen_bool(0.5) {
                app.toggle_post_like(*post);
            }
        }
        while *awaited < app.dispatched() {
            match completions.recv().await {
                Some(c) => {
                    *awaited += 1;
                    if let Err(err) = c.result {
                        tracing::warn!(op = ?c.op, %err, "generated write failed");
                        failures += 1;
                    }
                }
                None => break,
            }
        }
    }
    anyhow::ensure!(failures == 0, "{failures} generated writes failed");

    let (checker, _, _) = &users[0];
    for (thread, count) in &threads {
        let stored = checker
            .gateway()
            .fetch_recent(thread.collection(), 500)
            .await
            .with_context(|| format!("reading back comments of {thread:?}"))?
            .iter()
            .filter(|d| {
                d.get("user")
                    .and_then(|u| u.as_str())
                    .map_or(false, |u| u.ends_with(&format!("_{suffix}")))
            })
            .count();
        anyhow::ensure!(
            stored == count * NUM_USERS,
            "{thread:?} holds {stored} generated comments, expected {}",
            count * NUM_USERS
        );
    }
    tracing::info!("test data generated");
    Ok(())
}
