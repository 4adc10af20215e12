//! Demo collaborators: an HTTP reachability probe and the periodic
//! requester that feeds it through a balancer.
//!
//! The balancer core treats these as opaque; they exist so the binary has
//! real, variable-latency work to schedule.

use std::fmt;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::balancer::Submitter;
use crate::job::Job;

/// Outcome of probing one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// HTTP status code, or `None` when the request never completed.
    pub status: Option<u16>,
    /// Wall-clock time the probe took, including failures.
    pub latency: Duration,
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "status: {}, latency: {:?}", code, self.latency),
            None => write!(f, "status: unreachable, latency: {:?}", self.latency),
        }
    }
}

/// Issues a HEAD request and classifies the outcome.
///
/// Blocking: probes run on the worker pool's blocking threads, never on
/// the async runtime.
pub fn probe(url: &str) -> ProbeOutcome {
    let started = Instant::now();

    let client = match reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(url, error = %err, "failed to build probe client");
            return ProbeOutcome {
                status: None,
                latency: started.elapsed(),
            };
        }
    };

    let status = match client.head(url).send() {
        Ok(response) => Some(response.status().as_u16()),
        Err(err) => {
            tracing::warn!(url, error = %err, "probe request failed");
            None
        }
    };

    ProbeOutcome {
        status,
        latency: started.elapsed(),
    }
}

/// Submits one probe of `url` per interval and logs each outcome, until the
/// shutdown token fires or the balancer goes away.
pub async fn run_requester(
    submitter: Submitter<String, ProbeOutcome>,
    url: String,
    interval: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let (job, reply) = Job::new(|target: String| probe(&target), url.clone());

        if submitter.submit(job).await.is_err() {
            tracing::warn!(url = %url, "balancer gone, requester stopping");
            break;
        }

        match reply.recv().await {
            Ok(outcome) => tracing::info!(url = %url, %outcome, "probe finished"),
            Err(_) => tracing::warn!(url = %url, "probe was dropped"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
