//! The dispatcher: a single serialized loop reconciling new job arrivals
//! and worker completions against the load-ordered pool.
//!
//! All pool and pending-count mutations happen on this loop's task, so the
//! pool needs no lock: concurrent producers and completing workers only
//! ever touch the two channels feeding it.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::BalancerConfig;
use crate::error::{BalanceError, Result};
use crate::job::Job;
use crate::pool::WorkerPool;
use crate::worker::{self, WorkerHandle, WorkerId};

/// Clonable submission handle feeding the balancer's intake queue.
pub struct Submitter<Req, Res> {
    tx: mpsc::Sender<Job<Req, Res>>,
}

impl<Req, Res> Clone for Submitter<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<Req, Res> Submitter<Req, Res> {
    /// Enqueues a job, suspending while the intake queue is full.
    pub async fn submit(&self, job: Job<Req, Res>) -> Result<()> {
        self.tx.send(job).await.map_err(|_| BalanceError::Closed)
    }

    /// Non-blocking submission.
    ///
    /// A rejected job is dropped and its reply resolves to
    /// [`BalanceError::ReplyDropped`]; a producer that still wants the work
    /// done rebuilds the job and resubmits.
    pub fn try_submit(&self, job: Job<Req, Res>) -> Result<()> {
        use mpsc::error::TrySendError;

        self.tx.try_send(job).map_err(|err| match err {
            TrySendError::Full(_) => BalanceError::IntakeFull,
            TrySendError::Closed(_) => BalanceError::Closed,
        })
    }
}

pub struct Balancer<Req, Res> {
    pool: WorkerPool<Req, Res>,
    intake: mpsc::Receiver<Job<Req, Res>>,
    done_rx: mpsc::Receiver<WorkerId>,
    intake_open: bool,
    dispatched: u64,
    completed: u64,
}

impl<Req, Res> Balancer<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Builds the pool, spawns one worker task per configured worker, and
    /// returns the balancer together with a submission handle for its
    /// intake queue.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: BalancerConfig) -> Result<(Self, Submitter<Req, Res>)> {
        config.validate()?;

        let (intake_tx, intake_rx) = mpsc::channel(config.intake_capacity);

        // Sized so a worker can never block reporting a completion: each
        // worker holds at most inbox_capacity + 1 jobs, and therefore at
        // most that many unreported completions.
        let done_capacity = config.workers * (config.inbox_capacity + 1);
        let (done_tx, done_rx) = mpsc::channel(done_capacity);

        let mut pool = WorkerPool::with_capacity(config.workers);
        for id in 0..config.workers {
            let (handle, inbox_rx) = WorkerHandle::new(id, config.inbox_capacity);
            worker::spawn(id, inbox_rx, done_tx.clone());
            pool.insert(handle);
        }
        drop(done_tx);

        tracing::info!(
            workers = config.workers,
            inbox_capacity = config.inbox_capacity,
            intake_capacity = config.intake_capacity,
            "balancer ready"
        );

        Ok((
            Self {
                pool,
                intake: intake_rx,
                done_rx,
                intake_open: true,
                dispatched: 0,
                completed: 0,
            },
            Submitter { tx: intake_tx },
        ))
    }

    /// Pending load per worker, sorted by worker id.
    pub fn loads(&self) -> Vec<(WorkerId, usize)> {
        let mut loads: Vec<_> = self
            .pool
            .iter()
            .map(|w| (w.id(), w.pending()))
            .collect();
        loads.sort_unstable_by_key(|&(id, _)| id);
        loads
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Jobs dispatched but not yet completed.
    pub fn outstanding(&self) -> u64 {
        self.dispatched - self.completed
    }

    /// Assigns a job to the least-loaded worker.
    ///
    /// Suspends while the chosen worker's inbox is full. That is the
    /// per-worker backpressure which, through this serialized loop, also
    /// throttles every producer: no worker can have unbounded work piled
    /// onto it.
    pub async fn dispatch(&mut self, job: Job<Req, Res>) {
        let mut worker = self.pool.extract_min().expect("worker pool is empty");
        worker.inc_pending();
        tracing::trace!(
            job_id = %job.id(),
            worker_id = worker.id(),
            pending = worker.pending(),
            "dispatching job"
        );
        if worker.send(job).await.is_err() {
            // The worker task only exits once its inbox sender is gone, so a
            // closed inbox here means it died; the pool is no longer sound.
            panic!("worker {} inbox closed while dispatching", worker.id());
        }
        self.dispatched += 1;
        self.pool.insert(worker);
    }

    /// Records one completed job for `id` and re-ranks the worker.
    pub fn complete(&mut self, id: WorkerId) {
        let mut worker = self
            .pool
            .remove(id)
            .unwrap_or_else(|| panic!("completed worker {id} is not pooled"));
        worker.dec_pending();
        tracing::trace!(
            worker_id = id,
            pending = worker.pending(),
            "completion recorded"
        );
        self.completed += 1;
        self.pool.insert(worker);
    }

    /// Waits for the next completion notification and applies it. Returns
    /// the reporting worker's id, or `None` once every worker task is gone.
    pub async fn next_completion(&mut self) -> Option<WorkerId> {
        let id = self.done_rx.recv().await?;
        self.complete(id);
        Some(id)
    }

    /// The serving loop: reacts to whichever of the intake and completion
    /// channels is ready, one event per step, so every pool mutation is
    /// serialized through this task.
    ///
    /// Exits when `shutdown` fires, or after the intake closes and every
    /// accepted job has completed, so a closed intake drains without losing
    /// any accepted job's result.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested, stopping balancer");
                    break;
                }
                job = self.intake.recv(), if self.intake_open => {
                    match job {
                        Some(job) => self.dispatch(job).await,
                        None => {
                            self.intake_open = false;
                            if self.outstanding() == 0 {
                                break;
                            }
                        }
                    }
                }
                id = self.done_rx.recv() => {
                    match id {
                        Some(id) => {
                            self.complete(id);
                            if !self.intake_open && self.outstanding() == 0 {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        tracing::info!(
            dispatched = self.dispatched,
            completed = self.completed,
            "balancer stopped"
        );
    }
}
