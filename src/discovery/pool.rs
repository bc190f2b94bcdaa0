use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::DiscoveryError;
use super::extract::FeedResultSet;

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;
pub const DEFAULT_POOL_TIMEOUT: Duration = Duration::from_secs(10);

type Outcome = Result<FeedResultSet, DiscoveryError>;

/// Bounded-concurrency runner for discovery jobs.
///
/// One producer streams links into a queue of `queue_capacity` slots, a fixed
/// set of `workers` tasks drains it, and the calling task merges what they
/// report. All jobs of one [`WorkerPool::run`] share a single cancellation
/// token that fires once `timeout` has elapsed since the run started.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
    timeout: Duration,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_QUEUE_CAPACITY, DEFAULT_POOL_TIMEOUT)
    }
}

impl WorkerPool {
    /// Zero worker or queue counts are raised to one.
    pub fn new(workers: usize, queue_capacity: usize, timeout: Duration) -> Self {
        Self {
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
            timeout,
        }
    }

    /// Runs `job` once per link and merges the results.
    ///
    /// Returns the merged set whenever it is non-empty, even if some jobs
    /// failed. An empty set comes back with the most recently reported error,
    /// or with no error if every job came back empty.
    ///
    /// Links are pulled from `links` only once a queue slot is free, so at
    /// most `queue_capacity + workers` links are taken ahead of completion.
    pub async fn run<I, J, Fut>(&self, links: I, job: J) -> Outcome
    where
        I: IntoIterator<Item = Url>,
        I::IntoIter: Send + 'static,
        J: Fn(CancellationToken, Url) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let mut links = links.into_iter().peekable();
        if links.peek().is_none() {
            return Ok(FeedResultSet::new());
        }

        let token = CancellationToken::new();
        let _cancel_on_exit = token.clone().drop_guard();
        let deadline = {
            let token = token.clone();
            let timeout = self.timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Discovery deadline reached"
                );
                token.cancel();
            })
        };

        let (link_tx, link_rx) = mpsc::channel::<Url>(self.queue_capacity);
        let (out_tx, mut out_rx) = mpsc::channel::<Outcome>(self.workers);

        let producer = tokio::spawn(async move {
            while let Ok(permit) = link_tx.reserve().await {
                let Some(link) = links.next() else {
                    break;
                };
                permit.send(link);
            }
        });

        let link_rx = Arc::new(Mutex::new(link_rx));
        let job = Arc::new(job);
        let mut workers = JoinSet::new();
        for _ in 0..self.workers {
            let link_rx = Arc::clone(&link_rx);
            let out_tx = out_tx.clone();
            let job = Arc::clone(&job);
            let token = token.clone();

            workers.spawn(async move {
                loop {
                    let next = link_rx.lock().await.recv().await;
                    let Some(link) = next else {
                        break;
                    };
                    let outcome = job(token.clone(), link).await;
                    if out_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }
        // Workers own the only receiver handles from here on
        drop(link_rx);

        // Join barrier: the results channel closes once every worker is done
        let barrier = tokio::spawn(async move {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "Discovery worker failed");
                }
            }
            drop(out_tx);
        });

        let mut merged = FeedResultSet::new();
        let mut last_error = None;
        while let Some(outcome) = out_rx.recv().await {
            match outcome {
                Ok(found) => merged.extend(found),
                Err(e) => {
                    tracing::debug!(error = %e, "Candidate failed");
                    last_error = Some(e);
                }
            }
        }

        deadline.abort();
        if let Err(e) = producer.await {
            tracing::warn!(error = %e, "Link producer failed");
        }
        if let Err(e) = barrier.await {
            tracing::warn!(error = %e, "Worker barrier failed");
        }

        match last_error {
            Some(e) if merged.is_empty() => Err(e),
            Some(e) => {
                tracing::debug!(
                    feeds = merged.len(),
                    error = %e,
                    "Partial success, dropping candidate error"
                );
                Ok(merged)
            }
            None => Ok(merged),
        }
    }
}
