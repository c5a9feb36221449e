use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use snafu::Snafu;

use super::*;

/// Which kind of learning resource is being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Revision,
    Quiz,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Revision => "revision",
            ActivityKind::Quiz => "quiz",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Snafu, PartialEq)]
#[snafu(display("unknown activity kind `{text}`, expected `quiz` or `revision`"))]
pub struct ParseActivityKindError {
    text: String,
}

impl FromStr for ActivityKind {
    type Err = ParseActivityKindError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "revision" => Ok(ActivityKind::Revision),
            "quiz" => Ok(ActivityKind::Quiz),
            _ => ParseActivityKindSnafu { text }.fail(),
        }
    }
}

/// Free-form metadata attached to a session.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SessionExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SessionExtra {
    pub fn difficulty(difficulty: impl Into<String>) -> Self {
        Self {
            difficulty: Some(difficulty.into()),
            fields: Map::new(),
        }
    }
}

/// What a page asks the tracker to time.
#[derive(Debug, Clone, PartialEq, new)]
pub struct Activity {
    pub kind: ActivityKind,
    pub resource_id: i64,
    pub chapter_id: i64,
    #[new(default)]
    pub extra: Option<SessionExtra>,
}

impl Activity {
    pub fn with_extra(self, extra: SessionExtra) -> Self {
        Self {
            extra: Some(extra),
            ..self
        }
    }
}
