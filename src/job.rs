//! Jobs and their single-use reply channels.

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::BalanceError;

/// A unit of work: an opaque payload, the computation to apply to it, and a
/// private channel on which exactly one result is delivered.
///
/// The scheduler never interprets the payload or the result; it only moves
/// the job to a worker and accounts for its completion.
pub struct Job<Req, Res> {
    id: Uuid,
    payload: Req,
    task: Box<dyn FnOnce(Req) -> Res + Send + 'static>,
    reply: oneshot::Sender<Res>,
}

/// Receiving half of a job's reply channel, kept by the submitter.
pub struct Reply<Res> {
    rx: oneshot::Receiver<Res>,
}

impl<Req, Res> Job<Req, Res> {
    /// Creates a job and the reply handle its submitter keeps.
    pub fn new<F>(f: F, payload: Req) -> (Self, Reply<Res>)
    where
        F: FnOnce(Req) -> Res + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        (
            Job {
                id: Uuid::new_v4(),
                payload,
                task: Box::new(f),
                reply: tx,
            },
            Reply { rx },
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs the computation and delivers the result.
    ///
    /// Delivery never blocks: a submitter that dropped its [`Reply`] no
    /// longer wants the result, and an unread reply cannot wedge a worker.
    pub fn execute(self) {
        let result = (self.task)(self.payload);
        let _ = self.reply.send(result);
    }
}

impl<Res> Reply<Res> {
    /// Waits for the job's result.
    ///
    /// Resolves to [`BalanceError::ReplyDropped`] when the job was discarded
    /// before a result could be produced, e.g. a rejected submission or a
    /// computation that panicked.
    pub async fn recv(self) -> Result<Res, BalanceError> {
        self.rx.await.map_err(|_| BalanceError::ReplyDropped)
    }
}
