use itertools::Itertools;
use rustyline::{history::MemHistory, Editor};
use snafu::{ResultExt, Snafu};

use crate::{
    model::{Activity, TrackingSession},
    service::{backend::FlushClient, storage::QueueStorage},
    time::Clock,
    tracker::{FlushOutcome, PageSession, Tracker},
};

mod parse;

pub struct Repl {
    inner: Editor<(), MemHistory>,
    message: Option<String>,
}

impl Repl {
    pub fn new() -> Result<Self, ReplError> {
        let config = rustyline::Config::default();
        let inner =
            rustyline::Editor::with_history(config, MemHistory::new()).context(RustylineSnafu)?;

        let repl = Self {
            inner,
            message: None,
        };
        Ok(repl)
    }

    pub fn prompt(&mut self) -> Action {
        let message = self
            .message
            .take()
            .map(|msg| format!("  {}\n", msg.lines().join("\n  ")))
            .unwrap_or_default();
        let prompt = format!("{}aladin> ", message);

        // readline blocks, keep the updater's worker free
        let input = tokio::task::block_in_place(|| self.inner.readline(&prompt));
        let Ok(input) = input else {
            return Action::Exit;
        };

        self.inner.add_history_entry(input.clone()).ok();

        if input.trim().is_empty() {
            return Action::None;
        }

        match parse::parse(&input) {
            Ok(action) => action,
            Err(err) => {
                self.reply(err.to_string());
                Action::None
            }
        }
    }

    pub fn reply(&mut self, message: String) {
        if let Some(msg) = self.message.as_mut() {
            msg.push('\n');
            msg.push_str(&message);
        } else {
            self.message = Some(message);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Action {
    Start { activity: Activity },
    Stop,
    Flush,
    Status,
    Exit,
    None,
}

#[derive(Debug, Snafu)]
pub enum ReplError {
    #[snafu(display("failed to initialize REPL: {}", source))]
    Rustyline {
        source: rustyline::error::ReadlineError,
    },
}

/// Drive `tracker` from the prompt until the user exits, acting as a single page.
pub async fn start<C, S, F>(repl: &mut Repl, tracker: Tracker<C, S, F>) -> Result<(), ReplError>
where
    C: Clock,
    S: QueueStorage,
    F: FlushClient,
{
    tracing::info!("starting REPL");

    match tracker.resume().await {
        FlushOutcome::Sent(count) => repl.reply(format!("delivered {count} leftover session(s)")),
        FlushOutcome::Failed => repl.reply("leftover sessions are still queued".to_string()),
        FlushOutcome::Empty => {}
    }

    let mut page: Option<PageSession<C, S, F>> = None;

    loop {
        match repl.prompt() {
            Action::Exit => break,
            Action::Start { activity } => {
                let description = describe_activity(&activity);
                if let Some(previous) = page.take() {
                    previous.leave().await;
                }

                let entered = tracker.enter(activity).await;
                repl.reply(format!("timing {description} as `{}`", entered.session()));
                page = Some(entered);
            }
            Action::Stop => match page.take() {
                Some(previous) => {
                    let session = previous.session();
                    if previous.leave().await {
                        repl.reply(format!("stopped `{session}`"));
                    } else {
                        repl.reply(format!("`{session}` was already closed"));
                    }
                }
                None => repl.reply("nothing is being timed".to_string()),
            },
            Action::Flush => {
                let message = match tracker.flush().await {
                    FlushOutcome::Empty => "queue is empty".to_string(),
                    FlushOutcome::Sent(count) => format!("delivered {count} session(s)"),
                    FlushOutcome::Failed => "delivery failed, sessions stay queued".to_string(),
                };
                repl.reply(message);
            }
            Action::Status => {
                let current = tracker.current().await;
                let pending = tracker.pending().await;
                repl.reply(status(current.as_ref(), &pending));
            }
            _ => continue,
        }
    }

    if let Some(previous) = page.take() {
        previous.leave().await;
    }

    tracing::info!("REPL closed");
    Ok(())
}

fn describe_activity(activity: &Activity) -> String {
    format!(
        "{} {} (chapter {})",
        activity.kind, activity.resource_id, activity.chapter_id
    )
}

fn status(current: Option<&TrackingSession>, pending: &[TrackingSession]) -> String {
    let current = match current {
        Some(session) => format!(
            "open: {} {} (chapter {}), {}s since {}",
            session.activity_kind,
            session.resource_id,
            session.chapter_id,
            session.accumulated_seconds,
            session.started_at
        ),
        None => "open: none".to_string(),
    };

    let queued = pending
        .iter()
        .map(|session| {
            format!(
                "    {} {} {}s",
                session.activity_kind, session.resource_id, session.accumulated_seconds
            )
        })
        .join("\n");

    if queued.is_empty() {
        format!("{current}\nqueued: 0")
    } else {
        format!("{current}\nqueued: {}\n{queued}", pending.len())
    }
}
