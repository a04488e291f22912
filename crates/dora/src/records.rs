//! Raw rows returned by the per-source query executors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::CalculationField;
use crate::kind::DataSourceKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmPullRequest {
    pub id: String,
    pub number: String,
    pub title: Option<String>,
    pub project: Option<String>,
    #[serde(default)]
    pub repo_ids: Vec<String>,
    pub creator: Option<String>,
    pub state: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub merge_sha: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub pr_created_at: Option<DateTime<Utc>>,
    pub pr_merged_at: Option<DateTime<Utc>>,
    pub pr_closed_at: Option<DateTime<Utc>>,
    pub integration_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmCommit {
    pub id: String,
    pub commit_sha: String,
    #[serde(default)]
    pub repo_ids: Vec<String>,
    pub project: Option<String>,
    pub author: Option<String>,
    pub committer: Option<String>,
    pub message: Option<String>,
    pub branch: Option<String>,
    pub committed_at: Option<DateTime<Utc>>,
    pub commit_pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub commit_url: Option<String>,
    pub integration_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiCdJobRun {
    pub id: String,
    pub cicd_job_id: String,
    pub job_run_number: Option<i64>,
    pub status: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: Option<i64>,
    pub cicd_user_id: Option<String>,
    pub job_name: Option<String>,
    pub job_normalized_full_name: Option<String>,
    pub project_name: Option<String>,
    pub integration_id: Option<String>,
    #[serde(default)]
    pub scm_commit_ids: Vec<String>,
    pub scm_url: Option<String>,
    pub log_gcspath: Option<String>,
    pub cicd_instance_name: Option<String>,
    pub cicd_instance_guid: Option<String>,
    pub cicd_build_url: Option<String>,
    pub url: Option<String>,
    pub logs: Option<bool>,
    pub cicd_branch: Option<String>,
    pub repo_url: Option<String>,
    pub rollback: Option<bool>,
    #[serde(default)]
    pub environment_ids: Vec<String>,
    #[serde(default)]
    pub infra_ids: Vec<String>,
    #[serde(default)]
    pub service_ids: Vec<String>,
    #[serde(default)]
    pub service_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraIssue {
    pub id: String,
    pub key: String,
    pub summary: Option<String>,
    pub project: Option<String>,
    pub status: Option<String>,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub fix_versions: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    pub story_points: Option<f64>,
    pub issue_created_at: Option<DateTime<Utc>>,
    pub issue_updated_at: Option<DateTime<Utc>>,
    pub issue_resolved_at: Option<DateTime<Utc>>,
    pub integration_id: String,
}

/// A fix version that shipped inside the window, with its issue count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraRelease {
    pub name: String,
    pub project: Option<String>,
    pub issue_count: u64,
    pub release_end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub workitem_id: String,
    pub summary: Option<String>,
    pub project: Option<String>,
    pub status: Option<String>,
    pub workitem_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub workitem_created_at: Option<DateTime<Utc>>,
    pub workitem_updated_at: Option<DateTime<Utc>>,
    pub workitem_resolved_at: Option<DateTime<Utc>>,
    pub integration_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub name: String,
    pub full_name: Option<String>,
    pub state: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Rows that can be placed on a calculation-field timeline.
pub trait Anchored {
    fn anchor(&self, field: CalculationField) -> Option<DateTime<Utc>>;
}

impl Anchored for ScmPullRequest {
    fn anchor(&self, field: CalculationField) -> Option<DateTime<Utc>> {
        match field {
            CalculationField::PrMergedAt => self.pr_merged_at,
            CalculationField::PrClosedAt => self.pr_closed_at,
            _ => None,
        }
    }
}

impl Anchored for ScmCommit {
    fn anchor(&self, field: CalculationField) -> Option<DateTime<Utc>> {
        match field {
            CalculationField::CommittedAt => self.committed_at,
            CalculationField::CommitPushedAt => self.commit_pushed_at.or(self.committed_at),
            _ => None,
        }
    }
}

impl Anchored for CiCdJobRun {
    fn anchor(&self, field: CalculationField) -> Option<DateTime<Utc>> {
        match field {
            CalculationField::StartTime => self.start_time,
            CalculationField::EndTime => self.end_time,
            _ => None,
        }
    }
}

impl Anchored for JiraIssue {
    fn anchor(&self, field: CalculationField) -> Option<DateTime<Utc>> {
        match field {
            CalculationField::IssueResolvedAt => self.issue_resolved_at,
            CalculationField::IssueUpdatedAt => self.issue_updated_at,
            _ => None,
        }
    }
}

impl Anchored for JiraRelease {
    fn anchor(&self, field: CalculationField) -> Option<DateTime<Utc>> {
        match field {
            CalculationField::ReleasedIn => self.release_end_time,
            _ => None,
        }
    }
}

impl Anchored for WorkItem {
    fn anchor(&self, field: CalculationField) -> Option<DateTime<Utc>> {
        match field {
            CalculationField::WorkitemResolvedAt => self.workitem_resolved_at,
            CalculationField::WorkitemUpdatedAt => self.workitem_updated_at,
            _ => None,
        }
    }
}

/// Any row a calculator can hand to the drill-down unifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRecord {
    PullRequest(ScmPullRequest),
    Commit(ScmCommit),
    JobRun(CiCdJobRun),
    Issue(JiraIssue),
    Release(JiraRelease),
    WorkItem {
        item: WorkItem,
        #[serde(default)]
        milestones: Vec<Milestone>,
    },
}

impl SourceRecord {
    pub fn source_kind(&self) -> DataSourceKind {
        match self {
            Self::PullRequest(_) | Self::Commit(_) => DataSourceKind::Scm,
            Self::JobRun(_) => DataSourceKind::CiCd,
            Self::Issue(_) | Self::Release(_) => DataSourceKind::JiraIm,
            Self::WorkItem { .. } => DataSourceKind::AdoIm,
        }
    }
}
