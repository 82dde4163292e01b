//! Data carried through and persisted by the pipeline.
//!
//! [`ProcessingRecord`] is the unit written to the record store: one per
//! file that got as far as stage 4. Its JSON shape is flat and camelCase,
//!
//! ```json
//! {
//!   "id": "6f1c…",
//!   "originalPath": "/data/files/6f1c…-cv.pdf",
//!   "artifactPath": "/data/files/91aa…-cv.png",
//!   "companyName": "Acme",
//!   "jobTitle": "Backend Engineer",
//!   "jobDescription": "…",
//!   "feedback": ""
//! }
//! ```
//!
//! with `feedback` holding `""` until scoring succeeds and the parsed JSON
//! object afterwards.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Prefix of every record key in the store.
pub const RECORD_KEY_PREFIX: &str = "resume:";

/// Store key for a record id: `"resume:" + id`.
pub fn record_key(id: &RecordId) -> String {
    format!("{RECORD_KEY_PREFIX}{id}")
}

/// Unique identifier of a [`ProcessingRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable reference to an uploaded blob, as returned by a storage adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job context supplied once per batch and copied into every record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobContext {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
}

impl JobContext {
    pub fn new(
        company_name: impl Into<String>,
        job_title: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            job_title: job_title.into(),
            job_description: job_description.into(),
        }
    }
}

/// The persisted outcome for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRecord {
    pub id: RecordId,
    #[serde(alias = "resumePath")]
    pub original_path: Reference,
    #[serde(alias = "imagePath")]
    pub artifact_path: Reference,
    #[serde(flatten)]
    pub context: JobContext,
    /// `None` until scoring succeeds; stored as `""` while empty.
    #[serde(
        default,
        serialize_with = "serialize_feedback",
        deserialize_with = "deserialize_feedback"
    )]
    pub feedback: Option<Value>,
}

impl ProcessingRecord {
    /// A record as written at stage 4: paths and context known, no feedback.
    pub fn partial(
        id: RecordId,
        original_path: Reference,
        artifact_path: Reference,
        context: JobContext,
    ) -> Self {
        Self {
            id,
            original_path,
            artifact_path,
            context,
            feedback: None,
        }
    }

    pub fn key(&self) -> String {
        record_key(&self.id)
    }

    pub fn has_feedback(&self) -> bool {
        self.feedback.is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

fn serialize_feedback<S: Serializer>(value: &Option<Value>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => v.serialize(s),
        None => s.serialize_str(""),
    }
}

fn deserialize_feedback<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Null => None,
        Value::String(ref s) if s.is_empty() => None,
        other => Some(other),
    })
}
