// Session-scoped artifact bundle and its on-disk JSON form

use crate::error::Result;
use crate::model::RequestRecord;
use crate::trace::Trace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::info;
use url::Url;
use uuid::Uuid;

/// Result accumulated by one collector during a gather session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorArtifact {
    pub collector: String,
    pub value: Value,
}

/// Everything captured for one page-load session. Chains and metrics are
/// always computed from a single bundle, never across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub session_id: Uuid,
    pub url: Url,
    pub captured_at: DateTime<Utc>,
    pub network_records: Vec<RequestRecord>,
    pub trace: Trace,
    #[serde(default)]
    pub artifacts: Vec<CollectorArtifact>,
}

/// Bundle as stored on disk; records may still use transport field names.
#[derive(Deserialize)]
struct StoredBundle {
    session_id: Uuid,
    url: Url,
    captured_at: DateTime<Utc>,
    #[serde(default)]
    network_records: Vec<Value>,
    #[serde(default)]
    trace: Trace,
    #[serde(default)]
    artifacts: Vec<CollectorArtifact>,
}

impl ArtifactBundle {
    pub fn new(url: Url, network_records: Vec<RequestRecord>, trace: Trace) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            url,
            captured_at: Utc::now(),
            network_records,
            trace,
            artifacts: Vec::new(),
        }
    }

    pub fn artifact(&self, collector: &str) -> Option<&Value> {
        self.artifacts
            .iter()
            .find(|a| a.collector == collector)
            .map(|a| &a.value)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let stored: StoredBundle = serde_json::from_str(json)?;
        Ok(Self {
            session_id: stored.session_id,
            url: stored.url,
            captured_at: stored.captured_at,
            network_records: RequestRecord::from_raw_records(&stored.network_records)?,
            trace: stored.trace,
            artifacts: stored.artifacts,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the bundle as JSON, records in canonical field names.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(self.to_json()?.as_bytes())?;
        info!(
            "Saved session {} ({} requests, {} trace events) to {}",
            self.session_id,
            self.network_records.len(),
            self.trace.events.len(),
            path.display()
        );
        Ok(())
    }
}
