use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

pub use activity::*;
pub use session::*;
pub use wire::*;

mod activity;
mod session;
mod wire;
