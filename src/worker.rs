//! Workers: the dispatcher-side bookkeeping handle and the task loop that
//! services a private inbound queue.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::job::Job;

/// Identifies a worker within its pool. Assigned densely from zero.
pub type WorkerId = usize;

/// Dispatcher-owned view of one worker: its inbox sender plus the load and
/// position bookkeeping the pool maintains.
///
/// The worker task never touches `pending` or `pos`; it only moves jobs out
/// of its inbox and reports completions. Invariant: `pending` equals the
/// number of jobs queued in the inbox plus one while a job is executing.
pub struct WorkerHandle<Req, Res> {
    id: WorkerId,
    inbox: mpsc::Sender<Job<Req, Res>>,
    pending: usize,
    pos: usize,
}

impl<Req, Res> WorkerHandle<Req, Res> {
    /// Creates the handle and the receiving end of its bounded inbox.
    pub fn new(id: WorkerId, inbox_capacity: usize) -> (Self, mpsc::Receiver<Job<Req, Res>>) {
        let (tx, rx) = mpsc::channel(inbox_capacity);
        (
            Self {
                id,
                inbox: tx,
                pending: 0,
                pos: 0,
            },
            rx,
        )
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Jobs assigned to this worker and not yet completed (queued plus
    /// in-flight).
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn inc_pending(&mut self) {
        self.pending += 1;
    }

    /// Panics on underflow: more completions than dispatches means the
    /// accounting is corrupt and must not be served through.
    pub fn dec_pending(&mut self) {
        self.pending = self
            .pending
            .checked_sub(1)
            .expect("pending count underflow");
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Queues a job on this worker's inbox, suspending while it is full.
    pub async fn send(
        &self,
        job: Job<Req, Res>,
    ) -> Result<(), mpsc::error::SendError<Job<Req, Res>>> {
        self.inbox.send(job).await
    }
}

/// Spawns the worker task loop.
///
/// The loop receives jobs from `inbox`, executes each computation on the
/// blocking thread pool, and reports its own id on `done` after every job,
/// success or not. It exits once the inbox sender side is gone.
pub fn spawn<Req, Res>(
    id: WorkerId,
    mut inbox: mpsc::Receiver<Job<Req, Res>>,
    done: mpsc::Sender<WorkerId>,
) -> JoinHandle<()>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    tokio::spawn(async move {
        while let Some(job) = inbox.recv().await {
            let job_id = job.id();
            let started = Instant::now();

            // A panicking computation surfaces as a join error here, and the
            // job's reply sender is dropped with it, which the submitter
            // observes as a failed reply. The completion notification below
            // still goes out so the pending accounting is never starved.
            match tokio::task::spawn_blocking(move || job.execute()).await {
                Ok(()) => {
                    tracing::debug!(
                        worker_id = id,
                        job_id = %job_id,
                        elapsed = ?started.elapsed(),
                        "job finished"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        worker_id = id,
                        job_id = %job_id,
                        error = %err,
                        "job computation panicked"
                    );
                }
            }

            if done.send(id).await.is_err() {
                // Balancer gone; nobody is accounting for this worker.
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;

    use super::{spawn, WorkerHandle};
    use crate::job::Job;

    #[tokio::test]
    async fn worker_executes_jobs_and_reports_done() {
        let (handle, inbox_rx) = WorkerHandle::<u8, u8>::new(3, 4);
        let (done_tx, mut done_rx) = mpsc::channel(4);
        spawn(3, inbox_rx, done_tx);

        let (job, reply) = Job::new(|x: u8| x + 1, 41);
        handle.send(job).await.unwrap();

        assert_eq!(reply.recv().await, Ok(42));
        assert_eq!(done_rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn worker_runs_jobs_in_submission_order() {
        let (handle, inbox_rx) = WorkerHandle::<u32, ()>::new(0, 8);
        let (done_tx, mut done_rx) = mpsc::channel(8);
        spawn(0, inbox_rx, done_tx);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut replies = Vec::new();
        for i in 0..4u32 {
            let seen = seen.clone();
            let (job, reply) = Job::new(move |i: u32| seen.lock().unwrap().push(i), i);
            handle.send(job).await.unwrap();
            replies.push(reply);
        }

        for reply in replies {
            reply.recv().await.unwrap();
        }
        for _ in 0..4 {
            done_rx.recv().await.unwrap();
        }

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn worker_still_reports_done_when_job_panics() {
        let (handle, inbox_rx) = WorkerHandle::<(), ()>::new(7, 4);
        let (done_tx, mut done_rx) = mpsc::channel(4);
        spawn(7, inbox_rx, done_tx);

        let (bad, bad_reply) = Job::new(|()| panic!("boom"), ());
        handle.send(bad).await.unwrap();

        // The reply is dropped, the completion still arrives, and the worker
        // keeps servicing its inbox.
        assert!(bad_reply.recv().await.is_err());
        assert_eq!(done_rx.recv().await, Some(7));

        let (ok, ok_reply) = Job::new(|()| (), ());
        handle.send(ok).await.unwrap();
        assert_eq!(ok_reply.recv().await, Ok(()));
        assert_eq!(done_rx.recv().await, Some(7));
    }
}
