//! Single-flight session refresh.
//!
//! The first request that hits a 401 becomes the leader and performs the
//! refresh. Requests that hit a 401 while the leader is in flight park on a
//! oneshot channel and receive the leader's outcome. Requests that were sent
//! before a refresh settled, but whose 401 arrives after it, reuse that
//! settled outcome instead of starting another refresh.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::ClientError;

type Outcome = Result<(), ClientError>;

#[derive(Default)]
struct GateState {
    /// `Some` while a refresh is in flight; holds the parked callers
    waiters: Option<Vec<oneshot::Sender<Outcome>>>,
    /// Bumped every time a refresh settles
    epoch: u64,
    last_outcome: Option<Outcome>,
}

enum Ticket {
    Leader,
    Wait(oneshot::Receiver<Outcome>),
    Settled(Outcome),
}

#[derive(Default)]
pub struct RefreshGate {
    state: Mutex<GateState>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current refresh epoch. Capture before sending a request and pass it to
    /// [`RefreshGate::run`] if that request comes back 401.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().waiters.is_some()
    }

    /// Run `refresh` unless one is already in flight or has settled since
    /// `seen_epoch`; in those cases share its outcome.
    pub async fn run<F, Fut>(&self, seen_epoch: u64, refresh: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let ticket = {
            let mut state = self.lock();
            if let Some(waiters) = state.waiters.as_mut() {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Ticket::Wait(rx)
            } else if state.epoch != seen_epoch {
                Ticket::Settled(state.last_outcome.clone().unwrap_or(Ok(())))
            } else {
                state.waiters = Some(Vec::new());
                Ticket::Leader
            }
        };

        match ticket {
            Ticket::Settled(outcome) => outcome,
            Ticket::Wait(rx) => rx.await.unwrap_or_else(|_| {
                Err(ClientError::RefreshFailed {
                    status: None,
                    message: "refresh was abandoned".into(),
                })
            }),
            Ticket::Leader => {
                let mut lead = Leadership {
                    gate: self,
                    settled: false,
                };
                let outcome = refresh().await;
                lead.settle(&outcome);
                outcome
            }
        }
    }
}

/// Releases the waiters even if the leader's future is dropped mid-refresh.
struct Leadership<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

impl Leadership<'_> {
    fn settle(&mut self, outcome: &Outcome) {
        let waiters = {
            let mut state = self.gate.lock();
            state.epoch += 1;
            state.last_outcome = Some(outcome.clone());
            state.waiters.take().unwrap_or_default()
        };
        self.settled = true;

        match outcome {
            Ok(()) => tracing::debug!(waiters = waiters.len(), "Session refreshed"),
            Err(e) => tracing::warn!(waiters = waiters.len(), error = %e, "Session refresh failed"),
        }

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for Leadership<'_> {
    fn drop(&mut self) {
        if !self.settled {
            // Dropping the senders wakes every waiter with a receive error.
            self.gate.lock().waiters.take();
        }
    }
}
