use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use snapfeed_client::{
    api::{
        validate_otp, AuthToken, CommentId, Credentials, MediaKind, NewAccount, PostId, Thread,
        Uuid,
    },
    ClientConfig, FileCache, Gateway, HttpGateway, Interactions, SystemClock,
};
use tracing_subscriber::EnvFilter;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, env = "SNAPFEED_HOST")]
    host: String,

    /// Directory holding the local comment and post cache
    #[structopt(long, env = "SNAPFEED_CACHE", default_value = ".snapfeed-cache")]
    cache: PathBuf,

    /// JSON client configuration, defaults apply when absent
    #[structopt(long, env = "SNAPFEED_CONFIG")]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Create an account and print its session token
    Register {
        email: String,
        username: String,
    },

    /// Log in and print the session token
    Login { email: String },

    /// Check the one-time code sent after registration
    VerifyOtp { code: String },

    /// Check that the server answers
    Health,

    /// List the most recent posts
    Posts,

    /// List the comments of a thread
    Comments {
        /// Post whose comments to list, the global thread otherwise
        #[structopt(long)]
        post: Option<i64>,
    },

    /// Write a comment
    Comment {
        #[structopt(long)]
        post: Option<i64>,

        text: String,
    },

    /// Toggle the like of a comment
    LikeComment {
        #[structopt(long)]
        post: Option<i64>,

        id: i64,
    },

    /// Toggle the like of a post
    LikePost { id: i64 },

    /// Publish a post pointing to already-hosted media
    Post {
        url: String,

        #[structopt(default_value = "")]
        caption: String,
    },

    /// Upload a JPEG or MP4 file and publish it
    Upload {
        file: PathBuf,

        #[structopt(default_value = "")]
        caption: String,
    },
}

fn password() -> anyhow::Result<String> {
    std::env::var("SNAPFEED_PASSWORD").context("retrieving SNAPFEED_PASSWORD environment variable")
}

fn session_token() -> anyhow::Result<Option<AuthToken>> {
    match std::env::var("SNAPFEED_TOKEN") {
        Err(_) => Ok(None),
        Ok(tok) => Ok(Some(AuthToken(
            Uuid::try_parse(&tok).context("parsing SNAPFEED_TOKEN as an auth token")?,
        ))),
    }
}

fn verify_otp(code: &str) -> anyhow::Result<()> {
    validate_otp(code.trim()).context("one-time codes are exactly 4 digits")
}

fn thread(post: Option<i64>) -> Thread {
    match post {
        Some(p) => Thread::Post(PostId(p)),
        None => Thread::Global,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let config = match &opt.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };

    let gateway = Arc::new(HttpGateway::new(&opt.host).with_probe_timeout(config.probe_timeout));
    if let Some(token) = session_token()? {
        gateway
            .resume(token)
            .await
            .context("resuming session from SNAPFEED_TOKEN")?;
    }
    let cache = Arc::new(FileCache::new(&opt.cache)?);
    let (mut app, mut completions) =
        Interactions::new(gateway.clone(), Arc::new(SystemClock), cache, config);

    match opt.cmd {
        Command::Register { email, username } => {
            gateway
                .register(NewAccount::new(&email, password()?, &username))
                .await?;
            if let Some(t) = gateway.token() {
                println!("{}", t.0);
            }
        }
        Command::Login { email } => {
            gateway
                .login(Credentials::new(&email, password()?))
                .await?;
            if let Some(t) = gateway.token() {
                println!("{}", t.0);
            }
        }
        Command::VerifyOtp { code } => {
            verify_otp(&code)?;
            println!("code accepted");
        }
        Command::Health => match app.check_connectivity().await {
            snapfeed_client::Connectivity::Connected => println!("connected"),
            other => anyhow::bail!("server is not reachable: {other:?}"),
        },
        Command::Posts => {
            let freshness = app.refresh_posts().await;
            tracing::info!(?freshness, "posts loaded");
            for p in app.feed().posts() {
                let liked = if app.feed().is_liked(p.id) { " (liked)" } else { "" };
                println!(
                    "{}\t{}\t{} likes{liked}\t{}\t{}",
                    p.id, p.created_at, p.like_count, p.media_ref, p.caption
                );
            }
        }
        Command::Comments { post } => {
            let thread = thread(post);
            let freshness = app.refresh_comments(thread).await;
            tracing::info!(?freshness, "comments loaded");
            for c in app.comments(thread) {
                println!(
                    "{}\t{}\t{}\t{} likes\t{}",
                    c.id.0, c.created_at, c.author, c.like_count, c.text
                );
            }
        }
        Command::Comment { post, text } => {
            let thread = thread(post);
            app.open(thread);
            let c = app.submit_comment(thread, &text)?;
            println!("{}", c.id.0);
        }
        Command::LikeComment { post, id } => {
            let thread = thread(post);
            app.refresh_comments(thread).await;
            let (liked, likes) = app
                .toggle_comment_like(thread, CommentId(id))
                .with_context(|| format!("no comment {id} in {thread:?}"))?;
            println!("liked: {liked}, {likes} likes");
        }
        Command::LikePost { id } => {
            app.refresh_posts().await;
            let (liked, likes) = app
                .toggle_post_like(PostId(id))
                .with_context(|| format!("no post {id} in the feed"))?;
            println!("liked: {liked}, {likes} likes");
        }
        Command::Post { url, caption } => {
            let post = app.create_post(&url, &caption).await?;
            println!("{}", post.id);
        }
        Command::Upload { file, caption } => {
            let kind = MediaKind::from_url(&file.to_string_lossy());
            let bytes =
                std::fs::read(&file).with_context(|| format!("reading media file {file:?}"))?;
            let post = app.publish_upload(kind, bytes, &caption).await?;
            println!("{}\t{}", post.id, post.media_ref);
        }
    }

    // background writes must land before the process exits
    for _ in 0..app.dispatched() {
        match completions.recv().await {
            Some(c) => {
                if let Err(e) = c.result {
                    eprintln!("remote write {:?} failed: {e}", c.op);
                }
            }
            None => break,
        }
    }

    Ok(())
}
