use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::TimeRange;

/// Longest span, in days, that gets one bucket per calendar day. Wider
/// windows only carry the days that have deployments.
pub const MAX_FILLED_DAYS: i64 = 3_660;

#[derive(Debug, Clone, Default, PartialEq)]
struct Bucket {
    count: u64,
    stacks: BTreeMap<String, u64>,
}

/// Per-day deployment counts, optionally split by a stack value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayCounts {
    days: BTreeMap<NaiveDate, Bucket>,
}

impl DayCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, at: DateTime<Utc>, stack: Option<String>) {
        let bucket = self.days.entry(at.date_naive()).or_default();
        bucket.count += 1;
        if let Some(value) = stack {
            *bucket.stacks.entry(value).or_insert(0) += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.days.values().map(|b| b.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// Epoch seconds of the bucket start (UTC).
    pub key: i64,
    /// `d-m-yyyy` of the bucket start.
    pub additional_key: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stacks: BTreeMap<String, u64>,
}

/// Day, ISO-week and calendar-month views of the same counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub day: Vec<SeriesPoint>,
    pub week: Vec<SeriesPoint>,
    pub month: Vec<SeriesPoint>,
}

impl TimeSeries {
    /// Fill empty days across `range` (and any observed day outside it),
    /// then roll up into weeks and months. Spans over [`MAX_FILLED_DAYS`]
    /// are not filled.
    pub fn build(counts: &DayCounts, range: Option<&TimeRange>) -> Self {
        let first_seen = counts.days.keys().next().copied();
        let last_seen = counts.days.keys().next_back().copied();

        let start = earliest(range.and_then(|r| r.from).map(|t| t.date_naive()), first_seen);
        let end = latest(range.and_then(|r| r.to).map(end_day), last_seen);

        let (start, end) = match (start, end) {
            (Some(s), Some(e)) if s <= e => (s, e),
            _ => return Self::default(),
        };

        let span = (end - start).num_days() + 1;
        let filled = if span > MAX_FILLED_DAYS {
            tracing::debug!(span, max = MAX_FILLED_DAYS, "window too wide to fill, keeping observed days");
            counts.days.clone()
        } else {
            let mut filled: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
            let mut day = start;
            while day <= end {
                let bucket = counts.days.get(&day).cloned().unwrap_or_default();
                filled.insert(day, bucket);
                day += Duration::days(1);
            }
            filled
        };

        Self {
            day: points(&filled),
            week: points(&roll_up(&filled, week_start)),
            month: points(&roll_up(&filled, month_start)),
        }
    }

    pub fn total(&self) -> u64 {
        self.day.iter().map(|p| p.count).sum()
    }
}

fn earliest(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

fn latest(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}

/// The upper bound is exclusive, so a bound at midnight closes the previous day.
fn end_day(to: DateTime<Utc>) -> NaiveDate {
    (to - Duration::seconds(1)).date_naive()
}

fn week_start(d: NaiveDate) -> NaiveDate {
    d - Duration::days(i64::from(d.weekday().num_days_from_monday()))
}

fn month_start(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn roll_up(days: &BTreeMap<NaiveDate, Bucket>, key: fn(NaiveDate) -> NaiveDate) -> BTreeMap<NaiveDate, Bucket> {
    let mut out: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
    for (day, bucket) in days {
        let target = out.entry(key(*day)).or_default();
        target.count += bucket.count;
        for (stack, n) in &bucket.stacks {
            *target.stacks.entry(stack.clone()).or_insert(0) += n;
        }
    }
    out
}

fn points(buckets: &BTreeMap<NaiveDate, Bucket>) -> Vec<SeriesPoint> {
    buckets
        .iter()
        .map(|(day, bucket)| SeriesPoint {
            key: day.and_time(NaiveTime::MIN).and_utc().timestamp(),
            additional_key: format!("{}-{}-{}", day.day(), day.month(), day.year()),
            count: bucket.count,
            stacks: bucket.stacks.clone(),
        })
        .collect()
}
