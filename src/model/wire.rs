use serde_json::{Map, Value};

use super::*;

/// One entry of the batch sent to the backend tracking endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireRecord {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub resource_id: i64,
    #[serde(rename = "chapitre_id")]
    pub chapter_id: i64,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WireMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMetadata {
    #[serde(rename = "difficulte", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl From<&TrackingSession> for WireRecord {
    fn from(session: &TrackingSession) -> Self {
        let metadata = session.extra.clone().map(|extra| WireMetadata {
            difficulty: extra.difficulty,
            fields: extra.fields,
        });

        Self {
            kind: session.activity_kind,
            resource_id: session.resource_id,
            chapter_id: session.chapter_id,
            duration_seconds: session.accumulated_seconds,
            metadata,
        }
    }
}
