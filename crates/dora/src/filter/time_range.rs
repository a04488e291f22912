use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cadence_common::error::{CadenceError, CadenceResult};

use crate::kind::DataSourceKind;

const SECONDS_PER_DAY: i64 = 86_400;

/// Half-open time window. Either bound may be absent.
///
/// On the wire a range is `{"$gt": <epoch secs>, "$lt": <epoch secs>}`, with
/// the bounds given as numbers or numeric strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn is_closed(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }

    /// Whole days covered by a closed range, rounded up and never below one.
    /// `None` when a bound is missing.
    pub fn total_days(&self) -> Option<f64> {
        let (from, to) = (self.from?, self.to?);
        let secs = (to - from).num_seconds().max(0);
        let days = (secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
        Some(days.max(1) as f64)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawRange {
    #[serde(rename = "$gt", default, skip_serializing_if = "Option::is_none")]
    gt: Option<Value>,
    #[serde(rename = "$lt", default, skip_serializing_if = "Option::is_none")]
    lt: Option<Value>,
}

impl TryFrom<RawRange> for TimeRange {
    type Error = CadenceError;

    fn try_from(raw: RawRange) -> CadenceResult<Self> {
        Ok(Self {
            from: parse_bound(raw.gt.as_ref())?,
            to: parse_bound(raw.lt.as_ref())?,
        })
    }
}

impl From<TimeRange> for RawRange {
    fn from(range: TimeRange) -> Self {
        Self {
            gt: range.from.map(|t| Value::from(t.timestamp())),
            lt: range.to.map(|t| Value::from(t.timestamp())),
        }
    }
}

fn parse_bound(value: Option<&Value>) -> CadenceResult<Option<DateTime<Utc>>> {
    let secs = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| CadenceError::InvalidRequest(format!("invalid time bound: {n}")))?,
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| CadenceError::InvalidRequest(format!("invalid time bound: {s:?}")))?,
        Some(other) => {
            return Err(CadenceError::InvalidRequest(format!(
                "invalid time bound: {other}"
            )))
        }
    };
    DateTime::from_timestamp(secs, 0)
        .map(Some)
        .ok_or_else(|| CadenceError::InvalidRequest(format!("time bound out of range: {secs}")))
}

/// Timestamp column that anchors a deployment definition's time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationField {
    PrMergedAt,
    PrClosedAt,
    CommittedAt,
    CommitPushedAt,
    StartTime,
    EndTime,
    IssueResolvedAt,
    IssueUpdatedAt,
    ReleasedIn,
    WorkitemResolvedAt,
    WorkitemUpdatedAt,
}

impl CalculationField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrMergedAt => "pr_merged_at",
            Self::PrClosedAt => "pr_closed_at",
            Self::CommittedAt => "committed_at",
            Self::CommitPushedAt => "commit_pushed_at",
            Self::StartTime => "start_time",
            Self::EndTime => "end_time",
            Self::IssueResolvedAt => "issue_resolved_at",
            Self::IssueUpdatedAt => "issue_updated_at",
            Self::ReleasedIn => "released_in",
            Self::WorkitemResolvedAt => "workitem_resolved_at",
            Self::WorkitemUpdatedAt => "workitem_updated_at",
        }
    }

    pub fn source_kind(&self) -> DataSourceKind {
        match self {
            Self::PrMergedAt | Self::PrClosedAt | Self::CommittedAt | Self::CommitPushedAt => {
                DataSourceKind::Scm
            }
            Self::StartTime | Self::EndTime => DataSourceKind::CiCd,
            Self::IssueResolvedAt | Self::IssueUpdatedAt | Self::ReleasedIn => DataSourceKind::JiraIm,
            Self::WorkitemResolvedAt | Self::WorkitemUpdatedAt => DataSourceKind::AdoIm,
        }
    }

    /// All range keys a filter of `kind` knows about.
    pub fn range_keys(kind: DataSourceKind) -> &'static [CalculationField] {
        match kind {
            DataSourceKind::Scm => &[
                Self::PrMergedAt,
                Self::PrClosedAt,
                Self::CommittedAt,
                Self::CommitPushedAt,
            ],
            DataSourceKind::CiCd => &[Self::StartTime, Self::EndTime],
            DataSourceKind::JiraIm => &[Self::IssueResolvedAt, Self::IssueUpdatedAt, Self::ReleasedIn],
            DataSourceKind::AdoIm => &[Self::WorkitemResolvedAt, Self::WorkitemUpdatedAt],
        }
    }
}

impl fmt::Display for CalculationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculationField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pr_merged_at" => Ok(Self::PrMergedAt),
            "pr_closed_at" => Ok(Self::PrClosedAt),
            "committed_at" => Ok(Self::CommittedAt),
            "commit_pushed_at" => Ok(Self::CommitPushedAt),
            "start_time" => Ok(Self::StartTime),
            "end_time" => Ok(Self::EndTime),
            "issue_resolved_at" => Ok(Self::IssueResolvedAt),
            "issue_updated_at" => Ok(Self::IssueUpdatedAt),
            "released_in" => Ok(Self::ReleasedIn),
            "workitem_resolved_at" => Ok(Self::WorkitemResolvedAt),
            "workitem_updated_at" => Ok(Self::WorkitemUpdatedAt),
            other => Err(format!("unknown calculation field: {other}")),
        }
    }
}
