use std::fmt;

use uuid::Uuid;

use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Time-ordered id; it only keys client-local records.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One contiguous span of time spent on a single resource.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSession {
    pub id: SessionId,
    pub activity_kind: ActivityKind,
    pub resource_id: i64,
    pub chapter_id: i64,
    pub started_at: Timestamp,
    #[serde(default)]
    pub ended_at: Option<Timestamp>,
    pub accumulated_seconds: u64,
    pub last_accrual_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<SessionExtra>,
}

impl TrackingSession {
    pub fn open(activity: Activity, now: Timestamp) -> Self {
        let Activity {
            kind,
            resource_id,
            chapter_id,
            extra,
        } = activity;

        Self {
            id: SessionId::generate(),
            activity_kind: kind,
            resource_id,
            chapter_id,
            started_at: now,
            ended_at: None,
            accumulated_seconds: 0,
            last_accrual_at: now,
            extra,
        }
    }

    /// Fold the time elapsed since the last accrual into the total, returning the whole seconds added.
    ///
    /// A clock reading older than the last accrual adds nothing.
    pub fn accrue(&mut self, now: Timestamp) -> u64 {
        let delta = (now - self.last_accrual_at).num_seconds().max(0) as u64;

        self.accumulated_seconds = self.accumulated_seconds.saturating_add(delta);
        self.last_accrual_at = now;

        delta
    }

    pub fn close(&mut self, now: Timestamp) {
        self.accrue(now);
        self.ended_at = Some(now);
    }

    pub fn elapsed_millis(&self, now: Timestamp) -> i64 {
        (now - self.started_at).num_milliseconds()
    }
}
