//! Comments and the spam bookkeeping the moderation tools rely on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Moderation state of a comment, stored as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpamStatus {
    Unknown,
    Flagged,
    Spam,
    Ham,
}

impl SpamStatus {
    pub fn code(self) -> i16 {
        match self {
            Self::Unknown => 0,
            Self::Flagged => 1,
            Self::Spam => 2,
            Self::Ham => 4,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Flagged),
            2 => Some(Self::Spam),
            4 => Some(Self::Ham),
            _ => None,
        }
    }
}

/// A single user's report against a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentReport {
    pub category: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    #[serde(default)]
    pub retracted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    /// `None` when the comment predates spam tracking.
    pub spam_status: Option<SpamStatus>,
    /// Reports keyed by reporting user id.
    pub reports: BTreeMap<String, CommentReport>,
    pub latest_report: Option<OffsetDateTime>,
}

impl Comment {
    /// Status a comment without one should receive: reported comments are flagged.
    pub fn inferred_status(&self) -> SpamStatus {
        if self.reports.is_empty() {
            SpamStatus::Unknown
        } else {
            SpamStatus::Flagged
        }
    }

    pub fn newest_report_date(&self) -> Option<OffsetDateTime> {
        self.reports.values().map(|report| report.date).max()
    }

    pub fn needs_status(&self) -> bool {
        self.spam_status.is_none()
    }

    pub fn needs_latest_report(&self) -> bool {
        self.latest_report.is_none()
            && matches!(
                self.spam_status,
                Some(SpamStatus::Flagged) | Some(SpamStatus::Spam)
            )
    }
}
