use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a review job, allocated by the queue that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where archived images for a job end up.
///
/// Either a numeric storage slot or an upload link, passed to the archive
/// unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnerRef {
    Slot(u64),
    Link(String),
}

impl OwnerRef {
    /// Interpret scanned QR content: all-digit content is a slot id.
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(slot) = trimmed.parse() {
                return OwnerRef::Slot(slot);
            }
        }
        OwnerRef::Link(trimmed.to_string())
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerRef::Slot(slot) => write!(f, "{slot}"),
            OwnerRef::Link(link) => f.write_str(link),
        }
    }
}

/// Display and classification data attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub first_name: String,
    pub last_name: String,
    pub animal_name: String,
    pub animal_type: String,
    pub broken_bone: bool,
}

/// A submission that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub original_image: Bytes,
    pub owner_ref: OwnerRef,
    pub metadata: JobMetadata,
}

/// One submitted photo awaiting worker results and a review decision.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub original_image: Bytes,
    pub owner_ref: OwnerRef,
    pub metadata: JobMetadata,
    /// Dispatches left before the job stops being handed to workers.
    pub remaining_dispatches: u32,
    pub created_at: DateTime<Utc>,
}

/// Reviewer decision for a job awaiting approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConfirmAction {
    Confirm,
    Retry,
    Cancel,
}

/// Selects the original photo or one candidate result of a pending job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOption {
    Original,
    Choice(usize),
}

impl FromStr for ResultOption {
    type Err = InvalidOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "original" {
            return Ok(ResultOption::Original);
        }
        s.parse()
            .map(ResultOption::Choice)
            .map_err(|_| InvalidOption(s.to_string()))
    }
}

/// Side of a carousel entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CarouselSide {
    Xray,
    Original,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid result option: {0}")]
pub struct InvalidOption(pub String);

/// Listing view of a job awaiting approval.
#[derive(Debug, Clone, Serialize)]
pub struct PendingSummary {
    pub job_id: JobId,
    pub metadata: JobMetadata,
    pub result_count: usize,
    pub remaining_dispatches: u32,
    pub created_at: DateTime<Utc>,
}
