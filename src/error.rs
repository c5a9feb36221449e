use snafu::{Location, Snafu};

use crate::config::ConfigError;
use crate::repl::ReplError;
use crate::service::backend::BackendError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApplicationError {
    /// could not read the configuration
    ConfigLoad {
        source: ConfigError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not initialize the logger
    InitializeLogger {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not set up the client for the tracking endpoint
    ConnectBackend {
        source: BackendError,
        #[snafu(implicit)]
        location: Location,
    },

    /// The interactive shell failed
    Shell {
        source: ReplError,
        #[snafu(implicit)]
        location: Location,
    },
}
