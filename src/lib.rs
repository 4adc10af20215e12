//! A least-loaded work dispatcher built on a load-ordered worker pool.

pub mod balancer;
pub mod config;
pub mod error;
pub mod job;
pub mod pool;
pub mod probe;
pub mod shutdown;
pub mod worker;

pub use balancer::{Balancer, Submitter};
pub use config::BalancerConfig;
pub use error::BalanceError;
pub use job::{Job, Reply};
pub use pool::WorkerPool;
pub use worker::{WorkerHandle, WorkerId};
