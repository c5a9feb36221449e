use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use snafu::ResultExt;
use tracing::instrument;

use crate::model::TrackingSession;

pub use error::*;

mod error;

/// Durable home of the closed-but-unsent session queue.
///
/// The whole queue lives in a single slot: `load` reads it, `save` overwrites it.
pub trait QueueStorage: Send + 'static {
    fn load(&self) -> Result<Vec<TrackingSession>>;

    fn save(&self, queue: &[TrackingSession]) -> Result<()>;
}

/// A slot stored as a JSON file, `<dir>/<slot>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>, slot: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{slot}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueueStorage for FileStorage {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Vec<TrackingSession>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no persisted tracking queue yet");
                return Ok(Vec::new());
            }
            Err(error) => {
                return Err(error).context(ReadSnafu {
                    path: self.path.clone(),
                })
            }
        };

        serde_json::from_str(&content).context(DecodeSnafu)
    }

    fn save(&self, queue: &[TrackingSession]) -> Result<()> {
        let content = serde_json::to_vec(queue).context(EncodeSnafu)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context(WriteSnafu {
                path: parent.to_path_buf(),
            })?;
        }

        // staged write, then rename over the slot
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, content).context(WriteSnafu {
            path: staging.clone(),
        })?;
        std::fs::rename(&staging, &self.path).context(WriteSnafu {
            path: self.path.clone(),
        })
    }
}

/// A slot kept in memory as serialized JSON, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(contents.into()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl QueueStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<TrackingSession>> {
        let slot = self.slot.lock().map_err(|_| StorageError::Poisoned)?;

        match slot.as_deref() {
            Some(content) => serde_json::from_str(content).context(DecodeSnafu),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, queue: &[TrackingSession]) -> Result<()> {
        let content = serde_json::to_string(queue).context(EncodeSnafu)?;
        let mut slot = self.slot.lock().map_err(|_| StorageError::Poisoned)?;
        *slot = Some(content);

        Ok(())
    }
}
