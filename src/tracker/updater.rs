use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::select;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A repeating timer task. The first tick happens one period after spawning.
#[derive(Debug)]
pub(super) struct Updater {
    stop: oneshot::Sender<()>,
    _handle: JoinHandle<()>,
}

impl Updater {
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let (stop, mut signal) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                select! {
                    _ = &mut signal => break,

                    _ = timer.tick() => {
                        if on_tick().await.is_break() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("updater stopped");
        });

        Self {
            stop,
            _handle: handle,
        }
    }

    pub fn stop(self) {
        let _ = self.stop.send(());
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self._handle.is_finished()
    }
}
