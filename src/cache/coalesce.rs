//! Request coalescing for upstream fetches
//!
//! When several requests miss the cache for the same [`FetchKey`] at once,
//! only the first one fetches from upstream; the others subscribe to its
//! outcome. The fetch runs on its own task, so a caller that goes away does
//! not cancel a fetch (or the write-back that follows it) other callers are
//! waiting on.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use super::keys::FetchKey;
use crate::entity::Entity;
use crate::types::{GatewayError, Result};

/// Result of one upstream fetch and its write-back
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub entities: Vec<Entity>,
    /// Set when the write-back to the entity store failed
    pub write_back_error: Option<GatewayError>,
}

/// Outcome handed to a caller of [`SingleFlight::run`]
#[derive(Debug)]
pub struct Flight {
    pub result: Result<Fetched>,
    /// True when the caller joined a fetch started by someone else
    pub coalesced: bool,
}

/// Internal state for an in-flight fetch
struct InFlight {
    /// Broadcast channel to notify waiters
    sender: broadcast::Sender<Result<Fetched>>,
    /// When the fetch started
    started_at: Instant,
}

pub struct SingleFlight {
    in_flight: Mutex<HashMap<FetchKey, InFlight>>,
    /// How long a caller waits for a fetch to finish
    wait_timeout: Duration,
}

impl SingleFlight {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            wait_timeout,
        }
    }

    /// Run `work` for `key`, or join the fetch already running for it.
    ///
    /// `work` is only called by the caller that starts the fetch.
    pub async fn run<F, Fut>(self: &Arc<Self>, key: FetchKey, work: F) -> Flight
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Fetched>> + Send + 'static,
    {
        let (mut receiver, leader) = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(existing) => (existing.sender.subscribe(), false),
                None => {
                    let (sender, receiver) = broadcast::channel(1);
                    in_flight.insert(
                        key.clone(),
                        InFlight {
                            sender,
                            started_at: Instant::now(),
                        },
                    );
                    (receiver, true)
                }
            }
        };

        if leader {
            let fetch = work();
            let this = Arc::clone(self);
            let key = key.clone();
            tokio::spawn(async move {
                // Inner task so a panicking fetch still completes the flight
                let result = match tokio::spawn(fetch).await {
                    Ok(result) => result,
                    Err(e) => Err(GatewayError::Internal(format!("fetch task failed: {}", e))),
                };
                this.complete(&key, result).await;
            });
        } else {
            debug!(key = %key, "Joining in-flight fetch");
        }

        let result = match tokio::time::timeout(self.wait_timeout, receiver.recv()).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::UpstreamUnavailable(format!(
                "in-flight fetch for {} ended without a result",
                key
            ))),
            Err(elapsed) => Err(elapsed.into()),
        };

        Flight {
            result,
            coalesced: !leader,
        }
    }

    /// Remove the flight and broadcast its result to every waiter.
    async fn complete(&self, key: &FetchKey, result: Result<Fetched>) {
        let mut in_flight = self.in_flight.lock().await;
        if let Some(flight) = in_flight.remove(key) {
            debug!(
                key = %key,
                waiting = flight.sender.receiver_count(),
                duration_ms = flight.started_at.elapsed().as_millis() as u64,
                success = result.is_ok(),
                "Completing fetch"
            );
            // Receivers may have timed out and dropped
            let _ = flight.sender.send(result);
        }
    }

    /// Number of fetches currently running
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}
