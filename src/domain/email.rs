use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::range::DateRange;

pub type EmailId = u32;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Real,
    Demo,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Real => f.write_str("real"),
            Source::Demo => f.write_str("demo"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Server UID for real messages, delivery sequence for demo ones.
    pub id: EmailId,
    /// Sender address, or the decoded `From` header when no address parses.
    pub sender: String,
    /// Display name of the sender; the address when there is none.
    pub sender_name: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub body_preview: String,
    pub has_attachment: bool,
    pub source: Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    Network,
}

/// How a fetch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success,
    /// Some messages could not be normalized and were skipped.
    Partial { errors: usize },
    /// The fetch was aborted before a session could be built.
    Failure { kind: FailureKind, reason: String },
}

impl FetchOutcome {
    pub fn from_error_count(errors: usize) -> Self {
        if errors == 0 {
            FetchOutcome::Success
        } else {
            FetchOutcome::Partial { errors }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FetchOutcome::Failure { .. })
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success => f.write_str("SUCCESS"),
            FetchOutcome::Partial { errors } => write!(f, "PARTIAL({errors})"),
            FetchOutcome::Failure { reason, .. } => write!(f, "FAILURE({reason})"),
        }
    }
}

/// The result of one fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSession {
    /// Delivery order, not necessarily chronological.
    pub records: Vec<EmailRecord>,
    pub outcome: FetchOutcome,
    pub range: DateRange,
    pub provider: String,
}

impl FetchSession {
    pub fn new(range: DateRange, provider: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            outcome: FetchOutcome::Success,
            range,
            provider: provider.into(),
        }
    }

    pub fn failed(
        range: DateRange,
        provider: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            records: Vec::new(),
            outcome: FetchOutcome::Failure {
                kind,
                reason: reason.into(),
            },
            range,
            provider: provider.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
