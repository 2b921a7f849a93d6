use crate::response::ApiError;
use crate::session::MatrixSession;
use crate::types::SyncResponse;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const BACKOFF_STEP: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Receives each batch of new events from the sync loop.
///
/// Delivery is at-least-once: the loop advances its cursor only after
/// `on_batch` returns, so a batch interrupted mid-delivery may be fetched
/// again from the previous cursor. Batches are safe to reapply.
#[async_trait]
pub trait SyncConsumer: Send {
    async fn on_batch(&mut self, batch: SyncResponse);
}

/// Batches can be consumed through a channel directly.
#[async_trait]
impl SyncConsumer for mpsc::Sender<SyncResponse> {
    async fn on_batch(&mut self, batch: SyncResponse) {
        let _ = self.send(batch).await;
    }
}

/// Why the sync loop reached its terminal state.
#[derive(Debug)]
pub enum SyncTermination {
    /// The owner cancelled the loop (or dropped its handle).
    Cancelled,
    /// The server rejected the client's authentication. Not retried; the
    /// owning application should prompt for a fresh login.
    AuthRevoked(ApiError),
}

/// Owner-side handle to a running sync loop.
#[derive(Debug)]
pub struct SyncHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<SyncTermination>,
}

impl SyncHandle {
    pub(crate) fn spawn<C>(session: MatrixSession, consumer: C) -> Self
    where
        C: SyncConsumer + 'static,
    {
        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(run(session, consumer, cancelled));

        Self { cancel, task }
    }

    /// Signals cancellation.
    ///
    /// Checked before each new poll; an in-flight poll is abandoned and its
    /// eventual response discarded.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Waits for the loop to reach its terminal state.
    pub async fn join(self) -> SyncTermination {
        self.task.await.unwrap_or(SyncTermination::Cancelled)
    }
}

enum State {
    Polling,
    Delivering(SyncResponse),
    Stopped(SyncTermination),
}

async fn run<C>(
    session: MatrixSession,
    mut consumer: C,
    mut cancelled: watch::Receiver<bool>,
) -> SyncTermination
where
    C: SyncConsumer,
{
    let mut cursor: Option<String> = None;
    let mut failures = 0u32;
    let mut state = State::Polling;

    log::info!("sync loop started");

    loop {
        state = match state {
            State::Polling => {
                if *cancelled.borrow() {
                    State::Stopped(SyncTermination::Cancelled)
                } else {
                    poll(&session, cursor.as_deref(), &mut failures, &mut cancelled).await
                }
            },
            State::Delivering(batch) => {
                let next = batch.next_batch.clone();

                consumer.on_batch(batch).await;
                // the cursor advances only once the consumer accepted the batch
                cursor = Some(next);

                State::Polling
            },
            State::Stopped(termination) => {
                log::info!("sync loop stopped");

                return termination;
            },
        };
    }
}

async fn poll(
    session: &MatrixSession,
    cursor: Option<&str>,
    failures: &mut u32,
    cancelled: &mut watch::Receiver<bool>,
) -> State {
    let outcome = tokio::select! {
        // dropping the in-flight call discards any late response
        _ = cancelled.changed() => return State::Stopped(SyncTermination::Cancelled),
        outcome = session.sync_once(cursor) => outcome,
    };

    match outcome {
        Ok(batch) => {
            *failures = 0;

            State::Delivering(batch)
        },
        Err(error) if error.is_auth_revoked() => {
            log::error!("sync authentication revoked: {error}");

            State::Stopped(SyncTermination::AuthRevoked(error))
        },
        Err(error) => {
            // a long poll timing out with no news lands here too, so
            // failures back off but never stop the loop
            *failures += 1;

            let backoff = (BACKOFF_STEP * *failures).min(MAX_BACKOFF);

            log::warn!("sync poll failed ({error}), retrying in {backoff:?}");

            tokio::select! {
                _ = cancelled.changed() => State::Stopped(SyncTermination::Cancelled),
                _ = tokio::time::sleep(backoff) => State::Polling,
            }
        },
    }
}
