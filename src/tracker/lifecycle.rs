use super::*;

/// A page that is being timed. Leaving the page, or dropping the guard, stops its session.
///
/// A page only ever stops the session it started: once another page took over the tracker,
/// leaving the older one is a no-op.
pub struct PageSession<C, S, F>
where
    C: Clock,
    S: QueueStorage,
    F: FlushClient,
{
    tracker: Tracker<C, S, F>,
    session: SessionId,
    left: bool,
}

impl<C, S, F> Tracker<C, S, F>
where
    C: Clock,
    S: QueueStorage,
    F: FlushClient,
{
    /// Start timing `activity` on behalf of a page, once its resource data is known.
    pub async fn enter(&self, activity: Activity) -> PageSession<C, S, F> {
        let session = self.start(activity).await;

        PageSession {
            tracker: self.clone(),
            session,
            left: false,
        }
    }
}

impl<C, S, F> PageSession<C, S, F>
where
    C: Clock,
    S: QueueStorage,
    F: FlushClient,
{
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Stop the page's session and wait for the resulting flush.
    pub async fn leave(mut self) -> bool {
        self.left = true;
        self.tracker.stop_session(self.session).await
    }
}

impl<C, S, F> Drop for PageSession<C, S, F>
where
    C: Clock,
    S: QueueStorage,
    F: FlushClient,
{
    fn drop(&mut self) {
        if self.left {
            return;
        }

        let tracker = self.tracker.clone();
        let session = self.session;

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tracker.stop_session(session).await;
                });
            }
            Err(_) => {
                tracing::warn!(%session, "page dropped outside of a runtime, its session stays open");
            }
        }
    }
}
