use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cadence_common::error::{CadenceError, CadenceResult};

use super::exclude::{Exclusion, PartialMatch};
use super::time_range::{CalculationField, TimeRange};
use super::{FilterMap, JobRunParameter, PARAMETERS_KEY};
use crate::kind::DataSourceKind;
use crate::profile::{DeploymentCriteria, DeploymentRoute};

/// Read-only typed access to a merged filter map.
pub(crate) struct FilterReader<'a>(pub(crate) &'a FilterMap);

impl FilterReader<'_> {
    /// Strings, numbers and booleans coerce to a one-element list; nulls vanish.
    pub(crate) fn list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(other).into_iter().collect(),
        }
    }

    pub(crate) fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub(crate) fn number(&self, key: &str) -> Option<u32> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub(crate) fn range(&self, field: CalculationField) -> CadenceResult<Option<TimeRange>> {
        match self.0.get(field.as_str()) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(|e| {
                CadenceError::InvalidRequest(format!("invalid range for {field}: {e}"))
            }),
        }
    }

    pub(crate) fn parameters(&self) -> CadenceResult<Vec<JobRunParameter>> {
        match self.0.get(PARAMETERS_KEY) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| CadenceError::InvalidRequest(format!("invalid job run parameters: {e}"))),
        }
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Range of `key` only if it is the active calculation field.
fn active_range(
    reader: &FilterReader<'_>,
    active: CalculationField,
    key: CalculationField,
) -> CadenceResult<Option<TimeRange>> {
    if active == key {
        reader.range(key)
    } else {
        Ok(None)
    }
}

/// Parts every typed filter carries besides its source-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCommon {
    pub calculation_field: CalculationField,
    pub integration_ids: Vec<String>,
    pub excludes: BTreeMap<String, Exclusion>,
    pub partial_match: BTreeMap<String, PartialMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScmFilter {
    pub common: FilterCommon,
    pub route: DeploymentRoute,
    pub criteria: Option<DeploymentCriteria>,
    pub ref_filters: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    pub repo_ids: Vec<String>,
    pub projects: Vec<String>,
    pub creators: Vec<String>,
    pub committers: Vec<String>,
    pub authors: Vec<String>,
    pub reviewers: Vec<String>,
    pub assignees: Vec<String>,
    pub states: Vec<String>,
    pub labels: Vec<String>,
    pub source_branches: Vec<String>,
    pub target_branches: Vec<String>,
    pub commit_branches: Vec<String>,
    pub pr_merged_at: Option<TimeRange>,
    pub pr_closed_at: Option<TimeRange>,
    pub committed_at: Option<TimeRange>,
    pub commit_pushed_at: Option<TimeRange>,
}

impl ScmFilter {
    pub(crate) fn build(
        map: &FilterMap,
        common: FilterCommon,
        route: DeploymentRoute,
        criteria: Option<DeploymentCriteria>,
        ref_filters: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    ) -> CadenceResult<Self> {
        let r = FilterReader(map);
        let active = common.calculation_field;
        Ok(Self {
            route,
            criteria,
            ref_filters,
            repo_ids: r.list("repo_ids"),
            projects: r.list("projects"),
            creators: r.list("creators"),
            committers: r.list("committers"),
            authors: r.list("authors"),
            reviewers: r.list("reviewers"),
            assignees: r.list("assignees"),
            states: r.list("states"),
            labels: r.list("labels"),
            source_branches: r.list("source_branches"),
            target_branches: r.list("target_branches"),
            commit_branches: r.list("commit_branches"),
            pr_merged_at: active_range(&r, active, CalculationField::PrMergedAt)?,
            pr_closed_at: active_range(&r, active, CalculationField::PrClosedAt)?,
            committed_at: active_range(&r, active, CalculationField::CommittedAt)?,
            commit_pushed_at: active_range(&r, active, CalculationField::CommitPushedAt)?,
            common,
        })
    }

    pub fn active_range(&self) -> Option<&TimeRange> {
        match self.common.calculation_field {
            CalculationField::PrMergedAt => self.pr_merged_at.as_ref(),
            CalculationField::PrClosedAt => self.pr_closed_at.as_ref(),
            CalculationField::CommittedAt => self.committed_at.as_ref(),
            CalculationField::CommitPushedAt => self.commit_pushed_at.as_ref(),
            _ => None,
        }
    }
}

/// Grouping dimension for a CI/CD time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiCdStack {
    JobName,
    ProjectName,
    JobStatus,
    InstanceName,
    CicdUserId,
}

impl CiCdStack {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobName => "job_name",
            Self::ProjectName => "project_name",
            Self::JobStatus => "job_status",
            Self::InstanceName => "instance_name",
            Self::CicdUserId => "cicd_user_id",
        }
    }
}

impl fmt::Display for CiCdStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CiCdStack {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pipelines" | "job_name" => Ok(Self::JobName),
            "project_name" => Ok(Self::ProjectName),
            "job_status" => Ok(Self::JobStatus),
            "instance_name" => Ok(Self::InstanceName),
            "cicd_user_id" => Ok(Self::CicdUserId),
            other => Err(format!("unsupported stack: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CiCdFilter {
    pub common: FilterCommon,
    pub stack: Option<CiCdStack>,
    pub cicd_job_ids: Vec<String>,
    pub job_names: Vec<String>,
    pub job_normalized_full_names: Vec<String>,
    pub qualified_job_names: Vec<String>,
    pub job_statuses: Vec<String>,
    pub instance_names: Vec<String>,
    pub projects: Vec<String>,
    pub cicd_user_ids: Vec<String>,
    pub repositories: Vec<String>,
    pub branches: Vec<String>,
    pub environments: Vec<String>,
    pub services: Vec<String>,
    pub infrastructures: Vec<String>,
    pub deployment_types: Vec<String>,
    pub tags: Vec<String>,
    pub types: Vec<String>,
    pub rollback: Option<bool>,
    pub is_ci_job: Option<bool>,
    pub is_cd_job: Option<bool>,
    pub parameters: Vec<JobRunParameter>,
    pub start_time: Option<TimeRange>,
    pub end_time: Option<TimeRange>,
}

impl CiCdFilter {
    pub(crate) fn build(map: &FilterMap, common: FilterCommon, stack: Option<CiCdStack>) -> CadenceResult<Self> {
        let r = FilterReader(map);
        let active = common.calculation_field;
        Ok(Self {
            stack,
            cicd_job_ids: r.list("cicd_job_ids"),
            job_names: r.list("job_names"),
            job_normalized_full_names: r.list("job_normalized_full_names"),
            qualified_job_names: r.list("qualified_job_names"),
            job_statuses: r.list("job_statuses"),
            instance_names: r.list("instance_names"),
            projects: r.list("projects"),
            cicd_user_ids: r.list("cicd_user_ids"),
            repositories: r.list("repositories"),
            branches: r.list("branches"),
            environments: r.list("environments"),
            services: r.list("services"),
            infrastructures: r.list("infrastructures"),
            deployment_types: r.list("deployment_types"),
            tags: r.list("tags"),
            types: r.list("types"),
            rollback: r.flag("rollback"),
            is_ci_job: r.flag("is_ci_job"),
            is_cd_job: r.flag("is_cd_job"),
            parameters: r.parameters()?,
            start_time: active_range(&r, active, CalculationField::StartTime)?,
            end_time: active_range(&r, active, CalculationField::EndTime)?,
            common,
        })
    }

    pub fn active_range(&self) -> Option<&TimeRange> {
        match self.common.calculation_field {
            CalculationField::StartTime => self.start_time.as_ref(),
            CalculationField::EndTime => self.end_time.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JiraFilter {
    pub common: FilterCommon,
    pub keys: Vec<String>,
    pub projects: Vec<String>,
    pub statuses: Vec<String>,
    pub issue_types: Vec<String>,
    pub priorities: Vec<String>,
    pub assignees: Vec<String>,
    pub reporters: Vec<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub fix_versions: Vec<String>,
    pub epics: Vec<String>,
    pub sprint_names: Vec<String>,
    pub issue_resolved_at: Option<TimeRange>,
    pub issue_updated_at: Option<TimeRange>,
    pub released_in: Option<TimeRange>,
}

impl JiraFilter {
    pub(crate) fn build(map: &FilterMap, common: FilterCommon) -> CadenceResult<Self> {
        let r = FilterReader(map);
        let active = common.calculation_field;
        Ok(Self {
            keys: r.list("keys"),
            projects: r.list("projects"),
            statuses: r.list("statuses"),
            issue_types: r.list("issue_types"),
            priorities: r.list("priorities"),
            assignees: r.list("assignees"),
            reporters: r.list("reporters"),
            labels: r.list("labels"),
            components: r.list("components"),
            fix_versions: r.list("fix_versions"),
            epics: r.list("epics"),
            sprint_names: r.list("sprint_names"),
            issue_resolved_at: active_range(&r, active, CalculationField::IssueResolvedAt)?,
            issue_updated_at: active_range(&r, active, CalculationField::IssueUpdatedAt)?,
            released_in: active_range(&r, active, CalculationField::ReleasedIn)?,
            common,
        })
    }

    pub fn active_range(&self) -> Option<&TimeRange> {
        match self.common.calculation_field {
            CalculationField::IssueResolvedAt => self.issue_resolved_at.as_ref(),
            CalculationField::IssueUpdatedAt => self.issue_updated_at.as_ref(),
            CalculationField::ReleasedIn => self.released_in.as_ref(),
            _ => None,
        }
    }

    /// `released_in` aggregates by release instead of by issue.
    pub fn is_release_route(&self) -> bool {
        self.common.calculation_field == CalculationField::ReleasedIn
    }
}

/// Sprint constraints applied alongside a work-item filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MilestoneFilter {
    pub full_names: Vec<String>,
    pub states: Vec<String>,
    /// Only the most recent N sprints.
    pub count: Option<u32>,
}

impl MilestoneFilter {
    pub fn is_empty(&self) -> bool {
        self.full_names.is_empty() && self.states.is_empty() && self.count.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItemFilter {
    pub common: FilterCommon,
    pub milestone: MilestoneFilter,
    pub workitem_ids: Vec<String>,
    pub projects: Vec<String>,
    pub statuses: Vec<String>,
    pub workitem_types: Vec<String>,
    pub priorities: Vec<String>,
    pub assignees: Vec<String>,
    pub reporters: Vec<String>,
    pub labels: Vec<String>,
    pub epics: Vec<String>,
    pub workitem_resolved_at: Option<TimeRange>,
    pub workitem_updated_at: Option<TimeRange>,
}

impl WorkItemFilter {
    pub(crate) fn build(map: &FilterMap, common: FilterCommon) -> CadenceResult<Self> {
        let r = FilterReader(map);
        let active = common.calculation_field;
        Ok(Self {
            milestone: MilestoneFilter {
                full_names: r.list("workitem_sprint_full_names"),
                states: r.list("workitem_sprint_states"),
                count: r.number("workitem_sprint_count"),
            },
            workitem_ids: r.list("workitem_ids"),
            projects: r.list("workitem_projects"),
            statuses: r.list("workitem_statuses"),
            workitem_types: r.list("workitem_types"),
            priorities: r.list("workitem_priorities"),
            assignees: r.list("workitem_assignees"),
            reporters: r.list("workitem_reporters"),
            labels: r.list("workitem_labels"),
            epics: r.list("workitem_epics"),
            workitem_resolved_at: active_range(&r, active, CalculationField::WorkitemResolvedAt)?,
            workitem_updated_at: active_range(&r, active, CalculationField::WorkitemUpdatedAt)?,
            common,
        })
    }

    pub fn active_range(&self) -> Option<&TimeRange> {
        match self.common.calculation_field {
            CalculationField::WorkitemResolvedAt => self.workitem_resolved_at.as_ref(),
            CalculationField::WorkitemUpdatedAt => self.workitem_updated_at.as_ref(),
            _ => None,
        }
    }
}

/// Source-specific query filter, immutable once built by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedFilter {
    Scm(ScmFilter),
    CiCd(CiCdFilter),
    Jira(JiraFilter),
    WorkItem(WorkItemFilter),
}

impl NormalizedFilter {
    pub fn kind(&self) -> DataSourceKind {
        match self {
            Self::Scm(_) => DataSourceKind::Scm,
            Self::CiCd(_) => DataSourceKind::CiCd,
            Self::Jira(_) => DataSourceKind::JiraIm,
            Self::WorkItem(_) => DataSourceKind::AdoIm,
        }
    }

    pub fn common(&self) -> &FilterCommon {
        match self {
            Self::Scm(f) => &f.common,
            Self::CiCd(f) => &f.common,
            Self::Jira(f) => &f.common,
            Self::WorkItem(f) => &f.common,
        }
    }

    pub fn calculation_field(&self) -> CalculationField {
        self.common().calculation_field
    }

    pub fn integration_ids(&self) -> &[String] {
        &self.common().integration_ids
    }

    /// Range of the active calculation field; the only one that can be set.
    pub fn active_range(&self) -> Option<&TimeRange> {
        match self {
            Self::Scm(f) => f.active_range(),
            Self::CiCd(f) => f.active_range(),
            Self::Jira(f) => f.active_range(),
            Self::WorkItem(f) => f.active_range(),
        }
    }

    /// Number of range keys that hold a value. Never more than one.
    pub fn populated_range_count(&self) -> usize {
        let ranges: Vec<Option<&TimeRange>> = match self {
            Self::Scm(f) => vec![
                f.pr_merged_at.as_ref(),
                f.pr_closed_at.as_ref(),
                f.committed_at.as_ref(),
                f.commit_pushed_at.as_ref(),
            ],
            Self::CiCd(f) => vec![f.start_time.as_ref(), f.end_time.as_ref()],
            Self::Jira(f) => vec![
                f.issue_resolved_at.as_ref(),
                f.issue_updated_at.as_ref(),
                f.released_in.as_ref(),
            ],
            Self::WorkItem(f) => vec![f.workitem_resolved_at.as_ref(), f.workitem_updated_at.as_ref()],
        };
        ranges.into_iter().flatten().count()
    }
}
