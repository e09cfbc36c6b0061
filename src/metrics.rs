use crate::record::{PrStatus, PullRequestRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Upper bound on the number of buckets in the duration histogram.
const HISTOGRAM_MAX_BUCKETS: i64 = 20;

/// Headline numbers for the filtered rows.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SummaryMetrics {
    pub total: usize,
    pub open: usize,
    pub merged: usize,
    pub closed: usize,
    /// Percentage of rows that were merged, rounded to the nearest integer.
    pub merge_rate: u32,
    /// Mean time to merge/close in days; absent when nothing has been resolved.
    pub avg_duration_days: Option<f64>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StatusCount {
    pub status: PrStatus,
    pub count: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AuthorStats {
    pub author: String,
    pub pr_count: usize,
    pub avg_duration_days: Option<f64>,
}

/// One bar of the time-to-merge/close histogram, covering `start_day..end_day`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DurationBucket {
    pub start_day: i64,
    pub end_day: i64,
    pub merged: usize,
    pub closed: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct MonthlyCount {
    /// Creation month as `YYYY-MM`.
    pub month: String,
    pub open: usize,
    pub merged: usize,
    pub closed: usize,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SizeCategory {
    #[serde(rename = "XS (0-10)")]
    ExtraSmall,
    #[serde(rename = "S (11-50)")]
    Small,
    #[serde(rename = "M (51-200)")]
    Medium,
    #[serde(rename = "L (201-1000)")]
    Large,
    #[serde(rename = "XL (1000+)")]
    ExtraLarge,
}

impl SizeCategory {
    pub const ALL: [SizeCategory; 5] = [
        SizeCategory::ExtraSmall,
        SizeCategory::Small,
        SizeCategory::Medium,
        SizeCategory::Large,
        SizeCategory::ExtraLarge,
    ];

    pub fn for_changes(total_changes: u64) -> Self {
        match total_changes {
            0..=10 => SizeCategory::ExtraSmall,
            11..=50 => SizeCategory::Small,
            51..=200 => SizeCategory::Medium,
            201..=1000 => SizeCategory::Large,
            _ => SizeCategory::ExtraLarge,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SizeBucket {
    pub category: SizeCategory,
    pub pr_count: usize,
    pub avg_duration_days: Option<f64>,
}

/// Every aggregate the dashboard shows, recomputed from a filtered subset.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DashboardMetrics {
    pub summary: SummaryMetrics,
    pub status_counts: Vec<StatusCount>,
    pub author_stats: Vec<AuthorStats>,
    pub duration_histogram: Vec<DurationBucket>,
    pub timeline: Vec<MonthlyCount>,
    /// Absent when no row carries both addition and deletion counts.
    pub size_breakdown: Option<Vec<SizeBucket>>,
}

pub fn calculate_metrics(records: &[&PullRequestRecord]) -> DashboardMetrics {
    DashboardMetrics {
        summary: summarize(records),
        status_counts: status_counts(records),
        author_stats: author_stats(records),
        duration_histogram: duration_histogram(records),
        timeline: monthly_timeline(records),
        size_breakdown: size_breakdown(records),
    }
}

fn count_status(records: &[&PullRequestRecord], status: PrStatus) -> usize {
    records.iter().filter(|r| r.status == status).count()
}

fn mean_duration<'a, I>(records: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a PullRequestRecord>,
{
    let (sum, count) = records
        .into_iter()
        .filter_map(|r| r.duration_days)
        .fold((0i64, 0usize), |(sum, count), days| (sum + days, count + 1));

    (count > 0).then(|| sum as f64 / count as f64)
}

pub fn summarize(records: &[&PullRequestRecord]) -> SummaryMetrics {
    let total = records.len();
    let merged = count_status(records, PrStatus::Merged);

    let merge_rate = if total > 0 {
        ((merged as f64 / total as f64) * 100.0).round() as u32
    } else {
        0
    };

    SummaryMetrics {
        total,
        open: count_status(records, PrStatus::Open),
        merged,
        closed: count_status(records, PrStatus::Closed),
        merge_rate,
        avg_duration_days: mean_duration(records.iter().copied()),
    }
}

pub fn status_counts(records: &[&PullRequestRecord]) -> Vec<StatusCount> {
    PrStatus::ALL
        .iter()
        .map(|&status| StatusCount {
            status,
            count: count_status(records, status),
        })
        .collect()
}

/// Per-author totals, busiest authors first.
pub fn author_stats(records: &[&PullRequestRecord]) -> Vec<AuthorStats> {
    let mut by_author: HashMap<&str, Vec<&PullRequestRecord>> = HashMap::new();
    for &record in records {
        by_author.entry(record.author.as_str()).or_default().push(record);
    }

    let mut stats: Vec<AuthorStats> = by_author
        .into_iter()
        .map(|(author, rows)| AuthorStats {
            author: author.to_string(),
            pr_count: rows.len(),
            avg_duration_days: mean_duration(rows.iter().copied()),
        })
        .collect();

    stats.sort_by(|a, b| b.pr_count.cmp(&a.pr_count).then_with(|| a.author.cmp(&b.author)));
    stats
}

/// Equal-width whole-day buckets spanning `0..=max`, at most [`HISTOGRAM_MAX_BUCKETS`].
pub fn duration_histogram(records: &[&PullRequestRecord]) -> Vec<DurationBucket> {
    let Some(max) = records.iter().filter_map(|r| r.duration_days).max() else {
        return Vec::new();
    };

    let span = max + 1;
    let width = ((span + HISTOGRAM_MAX_BUCKETS - 1) / HISTOGRAM_MAX_BUCKETS).max(1);
    let bucket_count = (span + width - 1) / width;

    let mut buckets: Vec<DurationBucket> = (0..bucket_count)
        .map(|i| DurationBucket {
            start_day: i * width,
            end_day: (i + 1) * width,
            merged: 0,
            closed: 0,
        })
        .collect();

    for record in records {
        let Some(days) = record.duration_days else {
            continue;
        };
        let bucket = &mut buckets[(days / width) as usize];
        match record.status {
            PrStatus::Merged => bucket.merged += 1,
            PrStatus::Closed => bucket.closed += 1,
            PrStatus::Open => {}
        }
    }

    buckets
}

/// Pull requests per creation month, oldest month first.
pub fn monthly_timeline(records: &[&PullRequestRecord]) -> Vec<MonthlyCount> {
    let mut months: BTreeMap<String, MonthlyCount> = BTreeMap::new();

    for record in records {
        let month = record.created_at.format("%Y-%m").to_string();
        let entry = months.entry(month.clone()).or_insert_with(|| MonthlyCount {
            month,
            ..Default::default()
        });
        match record.status {
            PrStatus::Open => entry.open += 1,
            PrStatus::Merged => entry.merged += 1,
            PrStatus::Closed => entry.closed += 1,
        }
    }

    months.into_values().collect()
}

pub fn size_breakdown(records: &[&PullRequestRecord]) -> Option<Vec<SizeBucket>> {
    let sized: Vec<(SizeCategory, &PullRequestRecord)> = records
        .iter()
        .filter_map(|&r| {
            r.total_changes()
                .map(|total| (SizeCategory::for_changes(total), r))
        })
        .collect();

    if sized.is_empty() {
        return None;
    }

    let buckets = SizeCategory::ALL
        .iter()
        .map(|&category| {
            let rows: Vec<&PullRequestRecord> = sized
                .iter()
                .filter(|(c, _)| *c == category)
                .map(|&(_, r)| r)
                .collect();
            SizeBucket {
                category,
                pr_count: rows.len(),
                avg_duration_days: mean_duration(rows.iter().copied()),
            }
        })
        .collect();

    Some(buckets)
}
