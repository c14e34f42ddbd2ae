use std::future::Future;

use tokio::sync::mpsc;

use crate::api::{CommentId, Error, LikeDelta, PostId, Thread};

/// Remote write issued after an optimistic local change
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WriteOp {
    Comment { thread: Thread, id: CommentId },
    CommentLike { thread: Thread, id: CommentId, liked: bool },
    PostLike { post: PostId, delta: LikeDelta },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Completion {
    pub op: WriteOp,
    pub result: Result<(), Error>,
}

/// Runs remote writes in the background and reports how they went
///
/// Completions are informational: nothing in the local state is rolled back
/// when a write fails. Once the receiver is dropped, completions are discarded.
#[derive(Clone)]
pub struct Dispatcher {
    completions: mpsc::UnboundedSender<Completion>,
}

impl Dispatcher {
    pub fn new() -> (Dispatcher, mpsc::UnboundedReceiver<Completion>) {
        let (completions, receiver) = mpsc::unbounded_channel();
        (Dispatcher { completions }, receiver)
    }

    /// Must be called from within a tokio runtime
    pub fn dispatch<F>(&self, op: WriteOp, write: F)
    where
        F: 'static + Send + Future<Output = Result<(), Error>>,
    {
        tracing::debug!(?op, "dispatching remote write");
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = write.await;
            match &result {
                Ok(()) => tracing::debug!(?op, "remote write completed"),
                Err(err) => tracing::warn!(?op, %err, "remote write failed, keeping local state"),
            }
            // the view may be gone already
            let _ = completions.send(Completion { op, result });
        });
    }
}
