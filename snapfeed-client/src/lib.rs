mod cache;
pub use cache::{decode_comments, encode_comments, Cache, FileCache, MemoryCache};

mod clock;
pub use clock::{Clock, IdGenerator, ManualClock, SystemClock};

mod comment;
pub use comment::{seed_comments, CommentList, MAX_SUBMISSIONS_PER_WINDOW, SUBMISSION_WINDOW};

mod config;
pub use config::ClientConfig;

mod dispatch;
pub use dispatch::{Completion, Dispatcher, WriteOp};

mod feed;
pub use feed::{seed_posts, PostFeed, PLACEHOLDER_MEDIA};

mod gateway;
pub use gateway::Gateway;

mod http;
pub use http::{probe_reachable, HttpGateway};

mod interactions;
pub use interactions::{Connectivity, Freshness, Interactions};

mod limiter;
pub use limiter::SubmissionLimiter;

mod retry;
pub use retry::{resolve_with_retry, Resolution, RetryPolicy};

pub mod api {
    pub use snapfeed_api::*;
}
