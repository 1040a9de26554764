//! Metadata records and their collection status.
//!
//! A record's status-dependent fields live inside [`RecordState`], so a completed
//! record always carries headers, cookies and body, a failed one always carries an
//! error message, and a pending one carries neither.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::FetchOutcome;

/// Header or cookie map, ordered for stable JSON output.
pub type StringMap = BTreeMap<String, String>;

/// Current time at the precision the store persists (microseconds).
pub fn now_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Collection status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataStatus {
    Pending,
    Completed,
    Failed,
}

impl MetadataStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataStatus::Pending => "pending",
            MetadataStatus::Completed => "completed",
            MetadataStatus::Failed => "failed",
        }
    }

    /// Whether a fetch attempt has finished for this record.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MetadataStatus::Pending)
    }
}

impl fmt::Display for MetadataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MetadataStatus::Pending),
            "completed" => Ok(MetadataStatus::Completed),
            "failed" => Ok(MetadataStatus::Failed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Status together with the fields that are only valid in that status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    Completed { headers: StringMap, cookies: StringMap, body: String },
    Failed { error_message: String },
}

impl RecordState {
    pub fn status(&self) -> MetadataStatus {
        match self {
            RecordState::Pending => MetadataStatus::Pending,
            RecordState::Completed { .. } => MetadataStatus::Completed,
            RecordState::Failed { .. } => MetadataStatus::Failed,
        }
    }
}

impl From<FetchOutcome> for RecordState {
    fn from(outcome: FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::Success(page) => {
                RecordState::Completed { headers: page.headers, cookies: page.cookies, body: page.body }
            }
            FetchOutcome::Failure(failure) => RecordState::Failed { error_message: failure.to_string() },
        }
    }
}

/// The persisted description of one URL's latest collection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub url: String,
    pub state: RecordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MetadataRecord {
    /// A fresh record stamped with the current time.
    pub fn new(url: impl Into<String>, state: RecordState) -> Self {
        let now = now_timestamp();
        Self { url: url.into(), state, created_at: now, updated_at: now }
    }

    /// Placeholder written before a deferred collection.
    pub fn pending(url: impl Into<String>) -> Self {
        Self::new(url, RecordState::Pending)
    }

    /// Terminal record built from the result of one fetch attempt.
    pub fn from_outcome(url: impl Into<String>, outcome: FetchOutcome) -> Self {
        Self::new(url, outcome.into())
    }

    pub fn status(&self) -> MetadataStatus {
        self.state.status()
    }

    pub fn headers(&self) -> Option<&StringMap> {
        match &self.state {
            RecordState::Completed { headers, .. } => Some(headers),
            _ => None,
        }
    }

    pub fn cookies(&self) -> Option<&StringMap> {
        match &self.state {
            RecordState::Completed { cookies, .. } => Some(cookies),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match &self.state {
            RecordState::Completed { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            RecordState::Failed { error_message } => Some(error_message),
            _ => None,
        }
    }
}
