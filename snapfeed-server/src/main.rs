use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use snapfeed_mock_server::MockServer;
use tracing_subscriber::EnvFilter;

mod error;
mod extractors;
mod handlers;

use error::Error;
use extractors::AppState;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Address to listen on
    #[structopt(long, env = "SNAPFEED_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Base URL clients reach this server at, used for media download URLs
    #[structopt(long, env = "SNAPFEED_PUBLIC_URL")]
    public_url: Option<String>,

    /// Number of times a media URL lookup fails before the media becomes visible
    #[structopt(long, env = "SNAPFEED_URL_PROPAGATION_MISSES", default_value = "0")]
    url_propagation_misses: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let public_url = opt
        .public_url
        .unwrap_or_else(|| format!("http://{}", opt.listen));
    let mut store = MockServer::with_base_url(public_url);
    store.set_url_propagation_misses(opt.url_propagation_misses);

    tracing::info!(addr = %opt.listen, "listening");
    axum::Server::bind(&opt.listen)
        .serve(app(AppState::new(store)).into_make_service())
        .await
        .context("serving axum webserver")
}

fn app(state: AppState) -> Router {
    use handlers::*;
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/whoami", get(whoami))
        .route("/api/health", get(health))
        .route("/api/comments", get(list_comments))
        .route("/api/comments/:id", put(write_comment))
        .route("/api/comments/:id/like", patch(write_comment_like))
        .route("/api/posts", get(list_posts))
        .route("/api/posts/:id", put(write_post))
        .route("/api/posts/:id/like", post(like_post))
        .route("/api/posts/:id/comments", get(list_post_comments))
        .route("/api/posts/:id/comments/:comment", put(write_post_comment))
        .route(
            "/api/posts/:id/comments/:comment/like",
            patch(write_post_comment_like),
        )
        .route("/api/media/*path", put(put_media).get(get_media))
        .route("/api/media-url/*path", get(media_url))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
