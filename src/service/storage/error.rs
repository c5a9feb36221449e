use std::path::PathBuf;

use snafu::Snafu;

pub type Result<T, E = StorageError> = ::std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum StorageError {
    #[snafu(display("could not read the tracking queue from `{}`: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("could not write the tracking queue to `{}`: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("persisted tracking queue is malformed: {source}"))]
    Decode { source: serde_json::Error },

    #[snafu(display("could not encode the tracking queue: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("in-memory slot is poisoned"))]
    Poisoned,
}
