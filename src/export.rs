//! CSV export of pull request rows, and the matching reader.

use crate::config::RepoId;
use crate::record::{PrStatus, PullRequestRecord};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{Read, Write};

const LIST_SEPARATOR: &str = ", ";

const HEADERS: [&str; 16] = [
    "number",
    "title",
    "created_at",
    "merged_at",
    "closed_at",
    "status",
    "url",
    "duration_days",
    "author",
    "labels",
    "assignees",
    "comment_count",
    "additions",
    "deletions",
    "changed_files",
    "workitem",
];

/// The file name offered for a repository's export.
pub fn export_filename(repo_id: &RepoId) -> String {
    format!("{}_{}_pr_data.csv", repo_id.owner, repo_id.repo)
}

/// One CSV line; field order matches [`HEADERS`].
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    number: u64,
    title: String,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    status: String,
    url: String,
    duration_days: Option<i64>,
    author: String,
    labels: String,
    assignees: String,
    comment_count: u64,
    additions: Option<u64>,
    deletions: Option<u64>,
    changed_files: Option<u64>,
    workitem: Option<String>,
}

impl From<&PullRequestRecord> for CsvRow {
    fn from(record: &PullRequestRecord) -> Self {
        Self {
            number: record.number,
            title: record.title.clone(),
            created_at: record.created_at,
            merged_at: record.merged_at,
            closed_at: record.closed_at,
            status: record.status.to_string(),
            url: record.url.clone(),
            duration_days: record.duration_days,
            author: record.author.clone(),
            labels: join(&record.labels),
            assignees: join(&record.assignees),
            comment_count: record.comment_count,
            additions: record.additions,
            deletions: record.deletions,
            changed_files: record.changed_files,
            workitem: record.workitem.clone(),
        }
    }
}

impl TryFrom<CsvRow> for PullRequestRecord {
    type Error = anyhow::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let status: PrStatus = row
            .status
            .parse()
            .map_err(|e| anyhow!("row #{}: {}", row.number, e))?;

        Ok(PullRequestRecord {
            number: row.number,
            title: row.title,
            created_at: row.created_at,
            merged_at: row.merged_at,
            closed_at: row.closed_at,
            status,
            url: row.url,
            duration_days: row.duration_days,
            author: row.author,
            labels: split(&row.labels),
            assignees: split(&row.assignees),
            comment_count: row.comment_count,
            additions: row.additions,
            deletions: row.deletions,
            changed_files: row.changed_files,
            workitem: row.workitem,
        })
    }
}

/// Joins with `, `; an item holding a comma or quote is wrapped in double quotes,
/// inner quotes doubled.
fn join(values: &BTreeSet<String>) -> String {
    values
        .iter()
        .map(|value| {
            if value.contains([',', '"']) {
                format!("\"{}\"", value.replace('"', "\"\""))
            } else {
                value.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn split(value: &str) -> BTreeSet<String> {
    let mut items = BTreeSet::new();
    let mut rest = value;

    while !rest.is_empty() {
        let item = if let Some(quoted) = rest.strip_prefix('"') {
            let mut item = String::new();
            let mut chars = quoted.char_indices().peekable();
            let mut end = quoted.len();
            while let Some((i, c)) = chars.next() {
                if c == '"' {
                    if matches!(chars.peek(), Some((_, '"'))) {
                        chars.next();
                        item.push('"');
                    } else {
                        end = i + 1;
                        break;
                    }
                } else {
                    item.push(c);
                }
            }
            rest = &quoted[end..];
            item
        } else {
            let end = rest.find(LIST_SEPARATOR).unwrap_or(rest.len());
            let item = rest[..end].to_string();
            rest = &rest[end..];
            item
        };

        rest = rest.strip_prefix(LIST_SEPARATOR).unwrap_or(rest);
        if !item.is_empty() {
            items.insert(item);
        }
    }

    items
}

/// Writes a header line followed by one line per record.
///
/// The header is written even when there are no records.
pub fn write_csv<'a, W, I>(writer: W, records: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a PullRequestRecord>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    writer.write_record(HEADERS)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_bytes<'a, I>(records: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a PullRequestRecord>,
{
    let mut buffer = Vec::new();
    write_csv(&mut buffer, records)?;
    Ok(buffer)
}

/// Parses a file produced by [`write_csv`] back into records.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<PullRequestRecord>> {
    let mut reader = csv::ReaderBuilder::new().from_reader(reader);

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(i, row)| {
            let row = row.with_context(|| format!("invalid CSV line {}", i + 2))?;
            PullRequestRecord::try_from(row)
        })
        .collect()
}
