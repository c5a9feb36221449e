//! Study-time tracking: what is being timed right now, and what has been timed but not reported.
//!
//! [Tracker] is the handle pages talk to. It wraps a [TrackingStore] behind a lock, keeps a
//! periodic updater armed while a session is open, and flushes closed sessions through a
//! [FlushClient]. Every operation is best effort: failures are logged, never returned.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::instrument;

use crate::model::{Activity, SessionId, TrackingSession, WireRecord};
use crate::service::backend::FlushClient;
use crate::service::storage::QueueStorage;
use crate::time::Clock;

pub use lifecycle::PageSession;
pub use store::{Accrual, Started, TrackingStore};

mod lifecycle;
mod store;
mod updater;

#[cfg(test)]
mod testing;

use updater::Updater;

/// What a flush attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The queue was empty, nothing was sent.
    Empty,
    /// This many sessions were delivered and removed from the queue.
    Sent(usize),
    /// Delivery failed, the queue is untouched.
    Failed,
}

pub struct Tracker<C, S, F> {
    shared: Arc<Shared<C, S, F>>,
}

struct Shared<C, S, F> {
    store: Mutex<TrackingStore<C, S>>,
    // lock order: store, then updater
    updater: Mutex<Option<Updater>>,
    client: F,
}

impl<C, S, F> Clone for Tracker<C, S, F> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C, S, F> Tracker<C, S, F>
where
    C: Clock,
    S: QueueStorage,
    F: FlushClient,
{
    pub fn new(store: TrackingStore<C, S>, client: F) -> Self {
        let shared = Shared {
            store: Mutex::new(store),
            updater: Mutex::new(None),
            client,
        };

        Self {
            shared: Arc::new(shared),
        }
    }

    /// Retry whatever a previous run left queued.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> FlushOutcome {
        self.flush().await
    }

    /// Begin timing `activity`. A session still open is closed and flushed.
    #[instrument(skip(self))]
    pub async fn start(&self, activity: Activity) -> SessionId {
        let started = {
            let mut store = self.shared.store.lock().await;
            let started = store.start(activity);
            self.arm(store.settings().accrual_interval).await;
            started
        };

        if started.closed.is_some() {
            self.flush().await;
        }

        started.session
    }

    /// Fold elapsed time into the open session, flushing the queue when the session crosses
    /// the auto-flush threshold.
    pub async fn accrue(&self) -> Accrual {
        let accrual = self.shared.store.lock().await.accrue();

        if let Accrual::Accrued {
            flush_due: true, ..
        } = accrual
        {
            tracing::info!("open session crossed the auto-flush threshold");
            self.flush().await;
        }

        accrual
    }

    /// Close the open session, if any, and flush.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Option<SessionId> {
        self.close(None).await
    }

    /// Close the open session only if it is still `session`.
    #[instrument(skip(self))]
    pub async fn stop_session(&self, session: SessionId) -> bool {
        self.close(Some(session)).await.is_some()
    }

    /// Send the queued sessions in one batch.
    ///
    /// The batch holds the queued sessions no other flush is carrying. Only that batch is removed
    /// on success, so sessions closed while the request is in flight stay queued.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> FlushOutcome {
        let batch = self.shared.store.lock().await.checkout();
        if batch.is_empty() {
            tracing::debug!("nothing to flush");
            return FlushOutcome::Empty;
        }

        let sent: Vec<SessionId> = batch.iter().map(|session| session.id).collect();
        let records: Vec<WireRecord> = batch.iter().map(WireRecord::from).collect();

        match self.shared.client.send(records).await {
            Ok(()) => {
                let removed = self.shared.store.lock().await.acknowledge(&sent);
                tracing::info!(count = sent.len(), removed, "flushed tracking sessions");
                FlushOutcome::Sent(sent.len())
            }
            Err(error) => {
                self.shared.store.lock().await.release(&sent);
                tracing::warn!(%error, count = sent.len(), "could not flush tracking sessions, keeping them queued");
                FlushOutcome::Failed
            }
        }
    }

    pub async fn current(&self) -> Option<TrackingSession> {
        self.shared.store.lock().await.current().cloned()
    }

    pub async fn pending(&self) -> Vec<TrackingSession> {
        self.shared.store.lock().await.pending()
    }

    async fn close(&self, only: Option<SessionId>) -> Option<SessionId> {
        let closed = {
            let mut store = self.shared.store.lock().await;

            if let Some(expected) = only {
                let current = store.current().map(|session| session.id);
                if current != Some(expected) {
                    tracing::debug!(session = %expected, "session is no longer open, leaving the tracker alone");
                    return None;
                }
            }

            let closed = store.stop();
            self.disarm().await;
            closed
        };

        if closed.is_some() {
            self.flush().await;
        }

        closed
    }

    async fn arm(&self, period: Duration) {
        let shared = Arc::downgrade(&self.shared);

        let updater = Updater::spawn(period, move || {
            let shared = shared.clone();

            async move {
                let Some(shared) = shared.upgrade() else {
                    return ControlFlow::Break(());
                };

                Tracker { shared }.accrue().await;
                ControlFlow::Continue(())
            }
        });

        if let Some(previous) = self.shared.updater.lock().await.replace(updater) {
            previous.stop();
        }
    }

    async fn disarm(&self) {
        if let Some(updater) = self.shared.updater.lock().await.take() {
            updater.stop();
        }
    }
}
