use std::collections::HashSet;

use crate::config::TrackingSettings;
use crate::model::{Activity, SessionId, TrackingSession};
use crate::service::storage::QueueStorage;
use crate::time::Clock;

/// Result of [TrackingStore::start].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Started {
    pub session: SessionId,
    /// The session that was still open and got closed to make room.
    pub closed: Option<SessionId>,
}

/// Result of [TrackingStore::accrue].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accrual {
    /// Nothing is being timed.
    Idle,
    Accrued {
        seconds: u64,
        /// The open session just passed another multiple of the auto-flush threshold.
        flush_due: bool,
    },
}

/// Owns the open session and the queue of closed-but-unsent sessions.
///
/// Every change to the queue is written through to the storage slot. The open session is never
/// persisted, so its time is lost if the process dies before [TrackingStore::stop].
#[derive(Debug)]
pub struct TrackingStore<C, S> {
    clock: C,
    storage: S,
    settings: TrackingSettings,
    current: Option<TrackingSession>,
    queue: Vec<TrackingSession>,
    // handed to a flush, not yet acknowledged or released
    in_flight: HashSet<SessionId>,
}

impl<C: Clock, S: QueueStorage> TrackingStore<C, S> {
    /// Create a store around the queue persisted in `storage`.
    ///
    /// An unreadable slot is treated as empty.
    pub fn load(clock: C, storage: S, settings: TrackingSettings) -> Self {
        let queue = match storage.load() {
            Ok(queue) => queue,
            Err(error) => {
                tracing::warn!(%error, "discarding unreadable tracking queue");
                Vec::new()
            }
        };

        if !queue.is_empty() {
            tracing::info!(count = queue.len(), "restored unsent tracking sessions");
        }

        Self {
            clock,
            storage,
            settings,
            current: None,
            queue,
            in_flight: HashSet::new(),
        }
    }

    pub fn settings(&self) -> &TrackingSettings {
        &self.settings
    }

    pub fn current(&self) -> Option<&TrackingSession> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &[TrackingSession] {
        &self.queue
    }

    /// Open a new session, closing the one still open first.
    pub fn start(&mut self, activity: Activity) -> Started {
        let closed = self.stop();

        let session = TrackingSession::open(activity, self.clock.now());
        let id = session.id;
        tracing::info!(
            session = %id,
            kind = %session.activity_kind,
            resource_id = session.resource_id,
            chapter_id = session.chapter_id,
            "started tracking session"
        );
        self.current = Some(session);

        Started {
            session: id,
            closed,
        }
    }

    /// Fold the time elapsed since the last accrual into the open session.
    pub fn accrue(&mut self) -> Accrual {
        let Some(session) = self.current.as_mut() else {
            return Accrual::Idle;
        };

        let now = self.clock.now();
        let before = session.elapsed_millis(session.last_accrual_at);
        let seconds = session.accrue(now);
        let after = session.elapsed_millis(now);

        let flush_due = threshold_crossed(&self.settings, before, after);
        tracing::debug!(session = %session.id, seconds, total = session.accumulated_seconds, flush_due, "accrued");

        Accrual::Accrued { seconds, flush_due }
    }

    /// Close the open session and queue it, returning its id.
    pub fn stop(&mut self) -> Option<SessionId> {
        let Some(mut session) = self.current.take() else {
            tracing::debug!("no open tracking session to stop");
            return None;
        };

        session.close(self.clock.now());
        let id = session.id;
        tracing::info!(session = %id, seconds = session.accumulated_seconds, "closed tracking session");

        self.queue.push(session);
        self.persist();

        Some(id)
    }

    /// Snapshot of the queue, in the order sessions were closed.
    pub fn pending(&self) -> Vec<TrackingSession> {
        self.queue.clone()
    }

    /// Hand the queued sessions no other flush is carrying to a new batch.
    ///
    /// They stay in the queue, and out of later batches, until [TrackingStore::acknowledge] or
    /// [TrackingStore::release].
    pub fn checkout(&mut self) -> Vec<TrackingSession> {
        let batch: Vec<TrackingSession> = self
            .queue
            .iter()
            .filter(|session| !self.in_flight.contains(&session.id))
            .cloned()
            .collect();

        self.in_flight.extend(batch.iter().map(|session| session.id));
        batch
    }

    /// Return a failed batch to the queue so the next flush carries it again.
    pub fn release(&mut self, batch: &[SessionId]) {
        for id in batch {
            self.in_flight.remove(id);
        }
    }

    /// Drop the sessions a successful flush delivered. Sessions queued after the snapshot stay.
    pub fn acknowledge(&mut self, sent: &[SessionId]) -> usize {
        self.release(sent);

        let sent: HashSet<&SessionId> = sent.iter().collect();
        let before = self.queue.len();

        self.queue.retain(|session| !sent.contains(&session.id));

        let removed = before - self.queue.len();
        if removed > 0 {
            self.persist();
        }

        removed
    }

    fn persist(&self) {
        if let Err(error) = self.storage.save(&self.queue) {
            tracing::warn!(%error, count = self.queue.len(), "could not persist the tracking queue");
        }
    }
}

fn threshold_crossed(settings: &TrackingSettings, before: i64, after: i64) -> bool {
    let threshold = i64::try_from(settings.auto_flush_threshold.as_millis()).unwrap_or(i64::MAX);
    if threshold <= 0 || after <= before {
        return false;
    }

    after.div_euclid(threshold) > before.div_euclid(threshold)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::ActivityKind;
    use crate::service::storage::MemoryStorage;
    use crate::time::{ManualClock, Timestamp};

    fn store() -> (
        TrackingStore<ManualClock, MemoryStorage>,
        ManualClock,
        MemoryStorage,
    ) {
        let clock = ManualClock::starting_at(Timestamp::from_millis(1_700_000_000_000));
        let storage = MemoryStorage::default();
        let store = TrackingStore::load(clock.clone(), storage.clone(), TrackingSettings::default());
        (store, clock, storage)
    }

    fn quiz(resource_id: i64, chapter_id: i64) -> Activity {
        Activity::new(ActivityKind::Quiz, resource_id, chapter_id)
    }

    #[test]
    fn quiz_session_is_queued_with_its_duration() {
        let (mut store, clock, _) = store();

        store.start(quiz(42, 7));
        clock.advance(Duration::from_secs(12));
        store.stop();

        let queue = store.queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].resource_id, 42);
        assert_eq!(queue[0].chapter_id, 7);
        assert_eq!(queue[0].accumulated_seconds, 12);
        assert_eq!(queue[0].ended_at, Some(clock.now()));
        assert!(store.current().is_none());
    }

    #[test]
    fn starting_again_closes_the_previous_session_first() {
        let (mut store, clock, _) = store();

        let first = store.start(quiz(1, 1));
        clock.advance(Duration::from_secs(4));
        let second = store.start(Activity::new(ActivityKind::Revision, 2, 1));

        assert_eq!(second.closed, Some(first.session));
        assert_eq!(store.queue().len(), 1);
        assert_eq!(store.queue()[0].id, first.session);
        assert_eq!(store.queue()[0].accumulated_seconds, 4);
        assert!(store.queue()[0].ended_at.is_some());
        assert_eq!(store.current().map(|s| s.id), Some(second.session));
        assert_eq!(store.current().map(|s| s.accumulated_seconds), Some(0));
    }

    #[test]
    fn accrual_adds_whole_seconds_since_last_accrual() {
        let (mut store, clock, _) = store();
        store.start(quiz(1, 1));

        clock.advance(Duration::from_millis(10_700));
        assert_eq!(
            store.accrue(),
            Accrual::Accrued {
                seconds: 10,
                flush_due: false
            }
        );

        assert_eq!(
            store.accrue(),
            Accrual::Accrued {
                seconds: 0,
                flush_due: false
            },
            "accruing twice at the same instant adds nothing"
        );

        clock.advance(Duration::from_secs(5));
        store.accrue();
        assert_eq!(store.current().unwrap().accumulated_seconds, 15);
    }

    #[test]
    fn invalid_sequences_are_no_ops() {
        let (mut store, _, storage) = store();

        assert_eq!(store.accrue(), Accrual::Idle);
        assert_eq!(store.stop(), None);
        assert_eq!(store.stop(), None);
        assert!(store.queue().is_empty());
        assert_eq!(storage.contents(), None, "nothing was written");
    }

    #[test]
    fn auto_flush_is_due_each_time_a_threshold_multiple_is_crossed() {
        let (mut store, clock, _) = store();
        store.start(quiz(1, 1));

        let mut due = Vec::new();
        for _ in 0..61 {
            clock.advance(Duration::from_secs(10));
            if let Accrual::Accrued {
                flush_due: true, ..
            } = store.accrue()
            {
                due.push(store.current().unwrap().accumulated_seconds);
            }
        }

        assert_eq!(due, vec![300, 600]);
        assert!(store.current().is_some(), "auto flush does not close the session");
    }

    #[test]
    fn zero_threshold_disables_auto_flush() {
        let settings = TrackingSettings {
            auto_flush_threshold: Duration::ZERO,
            ..TrackingSettings::default()
        };
        let clock = ManualClock::default();
        let mut store = TrackingStore::load(clock.clone(), MemoryStorage::default(), settings);
        store.start(quiz(1, 1));

        clock.advance(Duration::from_secs(3_600));

        assert_eq!(
            store.accrue(),
            Accrual::Accrued {
                seconds: 3_600,
                flush_due: false
            }
        );
    }

    #[test]
    fn queue_is_persisted_but_open_session_is_not() {
        let (mut store, clock, storage) = store();

        store.start(quiz(42, 7));
        clock.advance(Duration::from_secs(3));
        store.stop();
        store.start(quiz(43, 7));
        clock.advance(Duration::from_secs(3));
        store.accrue();

        let reloaded = TrackingStore::load(clock, storage, TrackingSettings::default());

        assert_eq!(reloaded.queue(), store.queue());
        assert_eq!(reloaded.queue().len(), 1);
        assert!(reloaded.current().is_none());
    }

    #[test]
    fn corrupt_slot_loads_as_empty_queue() {
        let storage = MemoryStorage::with_contents("{not json");

        let store = TrackingStore::load(
            ManualClock::default(),
            storage,
            TrackingSettings::default(),
        );

        assert!(store.queue().is_empty());
    }

    #[test]
    fn acknowledge_keeps_sessions_queued_after_the_snapshot() {
        let (mut store, clock, storage) = store();
        store.start(quiz(1, 1));
        clock.advance(Duration::from_secs(1));
        store.stop();

        let snapshot: Vec<SessionId> = store.pending().iter().map(|s| s.id).collect();

        store.start(quiz(2, 1));
        clock.advance(Duration::from_secs(1));
        let late = store.stop().unwrap();

        assert_eq!(store.acknowledge(&snapshot), 1);
        assert_eq!(store.queue().len(), 1);
        assert_eq!(store.queue()[0].id, late);
        assert_eq!(
            TrackingStore::load(clock, storage, TrackingSettings::default()).queue(),
            store.queue()
        );

        assert_eq!(store.acknowledge(&snapshot), 0, "acknowledging twice is harmless");
    }

    #[test]
    fn checked_out_sessions_are_not_handed_out_twice() {
        let (mut store, clock, _) = store();
        store.start(quiz(1, 1));
        clock.advance(Duration::from_secs(1));
        let first = store.stop().unwrap();

        let batch: Vec<SessionId> = store.checkout().iter().map(|s| s.id).collect();
        assert_eq!(batch, vec![first]);

        store.start(quiz(2, 1));
        clock.advance(Duration::from_secs(1));
        let second = store.stop().unwrap();

        let overlapping: Vec<SessionId> = store.checkout().iter().map(|s| s.id).collect();
        assert_eq!(overlapping, vec![second]);
        assert_eq!(store.pending().len(), 2, "checked out sessions stay queued");

        store.release(&batch);
        let retry: Vec<SessionId> = store.checkout().iter().map(|s| s.id).collect();
        assert_eq!(retry, vec![first]);

        assert_eq!(store.acknowledge(&retry), 1);
        assert_eq!(store.acknowledge(&overlapping), 1);
        assert!(store.checkout().is_empty());
    }

    #[test]
    fn huge_threshold_never_fires() {
        let settings = TrackingSettings {
            auto_flush_threshold: Duration::MAX,
            ..TrackingSettings::default()
        };
        let clock = ManualClock::default();
        let mut store = TrackingStore::load(clock.clone(), MemoryStorage::default(), settings);
        store.start(quiz(1, 1));

        clock.advance(Duration::from_secs(86_400));

        assert_eq!(
            store.accrue(),
            Accrual::Accrued {
                seconds: 86_400,
                flush_due: false
            }
        );
    }
}
