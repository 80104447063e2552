//! History record model and query types.

use crate::identity::Role;
use crate::verdict::Label;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Approved,
    Rejected,
    Pending,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Rejected => "Rejected",
            ApprovalStatus::Pending => "Pending",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown approval status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for ApprovalStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Approved" => Ok(ApprovalStatus::Approved),
            "Rejected" => Ok(ApprovalStatus::Rejected),
            "Pending" => Ok(ApprovalStatus::Pending),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One persisted classification plus its review state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub submitter_id: String,
    pub submitter_role: Role,
    pub original_url: String,
    pub detection: bool,
    pub classifier: Label,
    pub need_review: bool,
    pub approved: Option<ApprovalStatus>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record filter; unset fields match everything. Date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub submitter_id: Option<String>,
    pub classifier: Option<Label>,
    pub approved: Option<ApprovalStatus>,
    pub need_review: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    CreatedAsc,
    ApprovedAtDesc,
}

/// 1-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// `None` unless both page and size are at least 1.
    pub fn new(page: u32, size: u32) -> Option<Self> {
        (page >= 1 && size >= 1).then_some(Self { page, size })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub filter: HistoryFilter,
    pub sort: SortOrder,
    pub page: PageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

/// Current time at the store's millisecond resolution.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
