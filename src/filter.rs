//! Filter views over a session table.
//!
//! Filtering never alters the underlying rows; it only selects a subset.

use crate::error::DashboardError;
use crate::record::{PrStatus, PullRequestRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    #[serde(alias = "All")]
    All,
    #[serde(alias = "Open")]
    Open,
    #[serde(alias = "Merged")]
    Merged,
    #[serde(alias = "Closed")]
    Closed,
}

impl StatusFilter {
    pub fn matches(&self, status: PrStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Open => status == PrStatus::Open,
            StatusFilter::Merged => status == PrStatus::Merged,
            StatusFilter::Closed => status == PrStatus::Closed,
        }
    }
}

/// Dashboard filter settings, usually taken from the query string.
///
/// An empty author set means every author. Date bounds are inclusive and apply
/// to the (UTC) creation date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default, deserialize_with = "deserialize_authors")]
    pub authors: BTreeSet<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), DashboardError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(DashboardError::InvalidFilter(format!(
                    "start date {from} is after end date {to}"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, record: &PullRequestRecord) -> bool {
        let created = record.created_at.date_naive();

        self.status.matches(record.status)
            && (self.authors.is_empty() || self.authors.contains(&record.author))
            && self.from.map_or(true, |from| created >= from)
            && self.to.map_or(true, |to| created <= to)
    }

    /// Selects the matching rows, in table order.
    pub fn apply<'a>(&self, records: &'a [PullRequestRecord]) -> Vec<&'a PullRequestRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Authors arrive as one comma-separated value, e.g. `authors=octocat,hubot`.
fn deserialize_authors<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(s.as_deref().map(parse_authors).unwrap_or_default())
}

fn parse_authors(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(str::trim)
        .filter(|author| !author.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sorted distinct authors of a table, offered as filter options.
pub fn author_options(records: &[PullRequestRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.author.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
