use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BalanceError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("intake queue is full")]
    IntakeFull,

    #[error("balancer has shut down")]
    Closed,

    #[error("job was dropped before a result was delivered")]
    ReplyDropped,
}

pub type Result<T> = std::result::Result<T, BalanceError>;
