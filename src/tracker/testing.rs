use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Notify;

use super::*;
use crate::config::TrackingSettings;
use crate::model::ActivityKind;
use crate::service::backend::{self, BackendError};
use crate::service::storage::MemoryStorage;
use crate::time::{ManualClock, Timestamp};

#[derive(Debug, Clone)]
pub enum Reply {
    Accept,
    Reject,
    /// Accept once the gate is notified.
    Hold(Arc<Notify>),
}

/// Flush client answering from a script, then accepting everything.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    script: Arc<Mutex<VecDeque<Reply>>>,
    batches: Arc<Mutex<Vec<Vec<WireRecord>>>>,
}

impl FakeBackend {
    pub fn scripted(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into_iter().collect())),
            batches: Arc::default(),
        }
    }

    pub fn batches(&self) -> Vec<Vec<WireRecord>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl FlushClient for FakeBackend {
    async fn send(&self, batch: Vec<WireRecord>) -> backend::Result<()> {
        let reply = self.script.lock().unwrap().pop_front();
        self.batches.lock().unwrap().push(batch);

        match reply.unwrap_or(Reply::Accept) {
            Reply::Accept => Ok(()),
            Reply::Reject => Err(BackendError::Rejected {
                endpoint: "http://backend.test/tracking".parse().unwrap(),
                status: StatusCode::SERVICE_UNAVAILABLE,
            }),
            Reply::Hold(gate) => {
                gate.notified().await;
                Ok(())
            }
        }
    }
}

pub type TestTracker<C> = Tracker<C, MemoryStorage, FakeBackend>;

pub fn tracker_on<C: Clock>(
    clock: C,
    storage: MemoryStorage,
    backend: FakeBackend,
) -> TestTracker<C> {
    Tracker::new(
        TrackingStore::load(clock, storage, TrackingSettings::default()),
        backend,
    )
}

pub fn tracker_with<C: Clock>(
    clock: C,
    settings: TrackingSettings,
    backend: FakeBackend,
) -> TestTracker<C> {
    Tracker::new(
        TrackingStore::load(clock, MemoryStorage::default(), settings),
        backend,
    )
}

pub fn manual_tracker(backend: FakeBackend) -> (TestTracker<ManualClock>, ManualClock, FakeBackend) {
    let clock = ManualClock::starting_at(Timestamp::from_millis(1_700_000_000_000));
    let tracker = tracker_on(clock.clone(), MemoryStorage::default(), backend.clone());
    (tracker, clock, backend)
}

pub fn quiz(resource_id: i64, chapter_id: i64) -> Activity {
    Activity::new(ActivityKind::Quiz, resource_id, chapter_id)
}

/// Run `count` short quiz sessions through the tracker, resource ids `0..count`.
pub async fn queue_sessions<C: Clock>(
    tracker: &Tracker<C, MemoryStorage, FakeBackend>,
    clock: &ManualClock,
    count: i64,
) {
    for resource_id in 0..count {
        tracker.start(quiz(resource_id, 1)).await;
        clock.advance(Duration::from_secs(5));
        tracker.stop().await;
    }
}
