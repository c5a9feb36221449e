use dotenvy::dotenv;
use snafu::ResultExt;

use aladin_tracker::config::Config;
use aladin_tracker::error::{
    ApplicationError, ConfigLoadSnafu, ConnectBackendSnafu, ShellSnafu,
};
use aladin_tracker::logger;
use aladin_tracker::repl::{self, Repl};
use aladin_tracker::time::MonotonicClock;
use aladin_tracker::tracker::{Tracker, TrackingStore};

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env().context(ConfigLoadSnafu)?;

    let _guard = logger::init(&config)?;

    let backend = config.backend().context(ConnectBackendSnafu)?;
    tracing::info!(endpoint = %backend.endpoint(), "tracking endpoint configured");

    let store = TrackingStore::load(
        MonotonicClock::anchored_now(),
        config.storage(),
        config.tracking,
    );
    let tracker = Tracker::new(store, backend);

    let mut repl = Repl::new().context(ShellSnafu)?;
    repl::start(&mut repl, tracker).await.context(ShellSnafu)
}
