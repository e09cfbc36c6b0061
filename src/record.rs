//! Flattening of raw pull request objects into analysis-ready rows.

use crate::github::RawPullRequest;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static WORKITEM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Ab#(\d{7})").expect("valid work item pattern"));

const UNKNOWN_AUTHOR: &str = "Unknown";
const UNTITLED: &str = "No Title";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrStatus {
    Open,
    Merged,
    Closed,
}

impl PrStatus {
    pub const ALL: [PrStatus; 3] = [PrStatus::Open, PrStatus::Merged, PrStatus::Closed];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Open => "Open",
            PrStatus::Merged => "Merged",
            PrStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(PrStatus::Open),
            "merged" => Ok(PrStatus::Merged),
            "closed" => Ok(PrStatus::Closed),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// A derived row, built once per fetch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestRecord {
    pub number: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub status: PrStatus,
    pub url: String,
    /// Whole days from creation to the earlier resolution timestamp; absent while open.
    pub duration_days: Option<i64>,
    pub author: String,
    pub labels: BTreeSet<String>,
    pub assignees: BTreeSet<String>,
    pub comment_count: u64,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub changed_files: Option<u64>,
    /// Work item reference (`Ab#` and seven digits) found in the description.
    pub workitem: Option<String>,
}

impl PullRequestRecord {
    /// Total changed lines, when the source carried both counts.
    pub fn total_changes(&self) -> Option<u64> {
        Some(self.additions? + self.deletions?)
    }
}

impl From<RawPullRequest> for PullRequestRecord {
    fn from(raw: RawPullRequest) -> Self {
        let status = derive_status(raw.merged_at, raw.closed_at);
        let duration_days = duration_days(raw.created_at, raw.merged_at, raw.closed_at);

        let author = raw
            .user
            .and_then(|user| user.login)
            .filter(|login| !login.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        let labels = raw
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| label.name)
            .filter(|name| !name.is_empty())
            .collect();

        let assignees = raw
            .assignees
            .unwrap_or_default()
            .into_iter()
            .filter_map(|user| user.login)
            .filter(|login| !login.is_empty())
            .collect();

        let workitem = raw.body.as_deref().and_then(extract_workitem);

        PullRequestRecord {
            number: raw.number,
            title: raw.title.unwrap_or_else(|| UNTITLED.to_string()),
            created_at: raw.created_at,
            merged_at: raw.merged_at,
            closed_at: raw.closed_at,
            status,
            url: raw.html_url.unwrap_or_default(),
            duration_days,
            author,
            labels,
            assignees,
            comment_count: raw.comments.unwrap_or(0),
            additions: raw.additions,
            deletions: raw.deletions,
            changed_files: raw.changed_files,
            workitem,
        }
    }
}

/// Maps a fetched page into the session table, preserving the API's ordering.
pub fn transform(raw: Vec<RawPullRequest>) -> Vec<PullRequestRecord> {
    raw.into_iter().map(PullRequestRecord::from).collect()
}

pub fn derive_status(
    merged_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
) -> PrStatus {
    if merged_at.is_some() {
        PrStatus::Merged
    } else if closed_at.is_some() {
        PrStatus::Closed
    } else {
        PrStatus::Open
    }
}

/// Floors to whole days and never goes below zero.
pub fn duration_days(
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
) -> Option<i64> {
    let resolved_at = match (merged_at, closed_at) {
        (Some(merged), Some(closed)) => merged.min(closed),
        (Some(at), None) | (None, Some(at)) => at,
        (None, None) => return None,
    };

    let seconds = (resolved_at - created_at).num_seconds();
    Some(seconds.div_euclid(86_400).max(0))
}

fn extract_workitem(body: &str) -> Option<String> {
    WORKITEM_PATTERN
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|id| format!("Ab#{}", id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{RawLabel, RawUser};
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn raw(number: u64) -> RawPullRequest {
        RawPullRequest {
            number,
            created_at: at(1, 12),
            ..Default::default()
        }
    }

    #[test]
    fn test_merged_when_merge_timestamp_present() {
        let record = PullRequestRecord::from(RawPullRequest {
            merged_at: Some(at(3, 12)),
            closed_at: Some(at(3, 12)),
            ..raw(1)
        });
        assert_eq!(record.status, PrStatus::Merged);
        assert_eq!(record.duration_days, Some(2));
    }

    #[test]
    fn test_closed_without_merge() {
        let record = PullRequestRecord::from(RawPullRequest {
            closed_at: Some(at(5, 11)),
            ..raw(2)
        });
        assert_eq!(record.status, PrStatus::Closed);
        // 3 days and 23 hours
        assert_eq!(record.duration_days, Some(3));
    }

    #[test]
    fn test_open_has_no_duration() {
        let record = PullRequestRecord::from(raw(3));
        assert_eq!(record.status, PrStatus::Open);
        assert_eq!(record.duration_days, None);
    }

    #[test]
    fn test_duration_uses_earlier_resolution() {
        assert_eq!(
            duration_days(at(1, 0), Some(at(9, 0)), Some(at(4, 0))),
            Some(3)
        );
    }

    #[test]
    fn test_duration_never_negative() {
        assert_eq!(duration_days(at(5, 0), None, Some(at(4, 0))), Some(0));
    }

    #[test]
    fn test_missing_fields_default() {
        let record = PullRequestRecord::from(raw(4));

        assert_eq!(record.title, "No Title");
        assert_eq!(record.author, "Unknown");
        assert_eq!(record.url, "");
        assert_eq!(record.comment_count, 0);
        assert!(record.labels.is_empty());
        assert!(record.assignees.is_empty());
        assert_eq!(record.additions, None);
        assert_eq!(record.total_changes(), None);
        assert_eq!(record.workitem, None);
    }

    #[test]
    fn test_people_and_labels_are_flattened() {
        let record = PullRequestRecord::from(RawPullRequest {
            user: Some(RawUser {
                login: Some("octocat".to_string()),
            }),
            labels: Some(vec![
                RawLabel {
                    name: Some("bug".to_string()),
                },
                RawLabel { name: None },
                RawLabel {
                    name: Some("bug".to_string()),
                },
            ]),
            assignees: Some(vec![
                RawUser {
                    login: Some("hubot".to_string()),
                },
                RawUser { login: None },
            ]),
            comments: Some(4),
            additions: Some(10),
            deletions: Some(5),
            changed_files: Some(2),
            ..raw(5)
        });

        assert_eq!(record.author, "octocat");
        assert_eq!(record.labels.len(), 1);
        assert!(record.labels.contains("bug"));
        assert_eq!(
            record.assignees.iter().collect::<Vec<_>>(),
            vec!["hubot"]
        );
        assert_eq!(record.comment_count, 4);
        assert_eq!(record.total_changes(), Some(15));
    }

    #[test]
    fn test_workitem_extraction() {
        assert_eq!(
            extract_workitem("Fixes Ab#1234567 and Ab#7654321"),
            Some("Ab#1234567".to_string())
        );
        assert_eq!(extract_workitem("Ab#123 is too short"), None);
        assert_eq!(extract_workitem("no reference"), None);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("merged".parse::<PrStatus>(), Ok(PrStatus::Merged));
        assert_eq!("Open".parse::<PrStatus>(), Ok(PrStatus::Open));
        assert!("draft".parse::<PrStatus>().is_err());
    }
}
