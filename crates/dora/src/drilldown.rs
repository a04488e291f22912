//! Drill-down unifier: per-source rows -> one record shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cadence_common::error::{CadenceError, CadenceResult};

use crate::kind::DataSourceKind;
use crate::records::{CiCdJobRun, JiraIssue, JiraRelease, Milestone, ScmCommit, ScmPullRequest, SourceRecord, WorkItem};
use crate::source::RecordPage;

/// Union of every drill-down column. Only `id` is always set; a `None`
/// means the column does not apply to the record's source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrillDownRecord {
    pub id: String,

    // shared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    // scm pull request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_merged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_closed_at: Option<DateTime<Utc>>,

    // scm commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_pushed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_url: Option<String>,

    // ci/cd job run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicd_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_run_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicd_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_normalized_full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_commit_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_gcspath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicd_instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicd_instance_guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicd_build_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicd_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infra_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_types: Option<Vec<String>>,

    // issue / work item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_versions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestones: Option<Vec<String>>,

    // jira release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillDownPage {
    pub records: Vec<DrillDownRecord>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

fn some_list(v: &[String]) -> Option<Vec<String>> {
    Some(v.to_vec())
}

fn from_pull_request(pr: &ScmPullRequest) -> DrillDownRecord {
    DrillDownRecord {
        id: pr.id.clone(),
        integration_id: Some(pr.integration_id.clone()),
        project: pr.project.clone(),
        status: pr.state.clone(),
        labels: some_list(&pr.labels),
        repo_ids: some_list(&pr.repo_ids),
        pr_number: Some(pr.number.clone()),
        title: pr.title.clone(),
        creator: pr.creator.clone(),
        source_branch: pr.source_branch.clone(),
        target_branch: pr.target_branch.clone(),
        merge_sha: pr.merge_sha.clone(),
        pr_created_at: pr.pr_created_at,
        pr_merged_at: pr.pr_merged_at,
        pr_closed_at: pr.pr_closed_at,
        ..DrillDownRecord::default()
    }
}

fn from_commit(c: &ScmCommit) -> DrillDownRecord {
    DrillDownRecord {
        id: c.id.clone(),
        integration_id: Some(c.integration_id.clone()),
        project: c.project.clone(),
        repo_ids: some_list(&c.repo_ids),
        tags: some_list(&c.tags),
        commit_sha: Some(c.commit_sha.clone()),
        author: c.author.clone(),
        committer: c.committer.clone(),
        message: c.message.clone(),
        commit_branch: c.branch.clone(),
        committed_at: c.committed_at,
        commit_pushed_at: c.commit_pushed_at,
        commit_url: c.commit_url.clone(),
        ..DrillDownRecord::default()
    }
}

fn from_job_run(run: &CiCdJobRun) -> DrillDownRecord {
    DrillDownRecord {
        id: run.id.clone(),
        integration_id: run.integration_id.clone(),
        project: run.project_name.clone(),
        status: run.status.clone(),
        tags: some_list(&run.tags),
        cicd_job_id: Some(run.cicd_job_id.clone()),
        job_run_number: run.job_run_number,
        start_time: run.start_time,
        end_time: run.end_time,
        duration: run.duration,
        cicd_user_id: run.cicd_user_id.clone(),
        job_name: run.job_name.clone(),
        job_normalized_full_name: run.job_normalized_full_name.clone(),
        scm_commit_ids: some_list(&run.scm_commit_ids),
        scm_url: run.scm_url.clone(),
        log_gcspath: run.log_gcspath.clone(),
        cicd_instance_name: run.cicd_instance_name.clone(),
        cicd_instance_guid: run.cicd_instance_guid.clone(),
        cicd_build_url: run.cicd_build_url.clone(),
        url: run.url.clone(),
        logs: run.logs,
        cicd_branch: run.cicd_branch.clone(),
        repo_url: run.repo_url.clone(),
        rollback: run.rollback,
        environment_ids: some_list(&run.environment_ids),
        infra_ids: some_list(&run.infra_ids),
        service_ids: some_list(&run.service_ids),
        service_types: some_list(&run.service_types),
        ..DrillDownRecord::default()
    }
}

fn from_issue(issue: &JiraIssue) -> DrillDownRecord {
    DrillDownRecord {
        id: issue.id.clone(),
        integration_id: Some(issue.integration_id.clone()),
        project: issue.project.clone(),
        status: issue.status.clone(),
        labels: some_list(&issue.labels),
        key: Some(issue.key.clone()),
        summary: issue.summary.clone(),
        issue_type: issue.issue_type.clone(),
        priority: issue.priority.clone(),
        assignee: issue.assignee.clone(),
        reporter: issue.reporter.clone(),
        fix_versions: some_list(&issue.fix_versions),
        components: some_list(&issue.components),
        story_points: issue.story_points,
        created_at: issue.issue_created_at,
        updated_at: issue.issue_updated_at,
        resolved_at: issue.issue_resolved_at,
        ..DrillDownRecord::default()
    }
}

/// Releases have no id of their own; project plus name identifies them.
fn from_release(release: &JiraRelease) -> DrillDownRecord {
    let id = match &release.project {
        Some(project) => format!("{project}:{}", release.name),
        None => release.name.clone(),
    };
    DrillDownRecord {
        id,
        project: release.project.clone(),
        release_name: Some(release.name.clone()),
        release_end_time: release.release_end_time,
        issue_count: Some(release.issue_count),
        ..DrillDownRecord::default()
    }
}

fn from_work_item(item: &WorkItem, milestones: &[Milestone]) -> DrillDownRecord {
    DrillDownRecord {
        id: item.id.clone(),
        integration_id: Some(item.integration_id.clone()),
        project: item.project.clone(),
        status: item.status.clone(),
        labels: some_list(&item.labels),
        key: Some(item.workitem_id.clone()),
        summary: item.summary.clone(),
        issue_type: item.workitem_type.clone(),
        priority: item.priority.clone(),
        assignee: item.assignee.clone(),
        reporter: item.reporter.clone(),
        created_at: item.workitem_created_at,
        updated_at: item.workitem_updated_at,
        resolved_at: item.workitem_resolved_at,
        milestones: Some(
            milestones
                .iter()
                .map(|m| m.full_name.clone().unwrap_or_else(|| m.name.clone()))
                .collect(),
        ),
        ..DrillDownRecord::default()
    }
}

pub fn project(record: &SourceRecord) -> DrillDownRecord {
    match record {
        SourceRecord::PullRequest(pr) => from_pull_request(pr),
        SourceRecord::Commit(c) => from_commit(c),
        SourceRecord::JobRun(run) => from_job_run(run),
        SourceRecord::Issue(issue) => from_issue(issue),
        SourceRecord::Release(release) => from_release(release),
        SourceRecord::WorkItem { item, milestones } => from_work_item(item, milestones),
    }
}

/// Project a page of rows from `kind` into drill-down records.
///
/// Order and `total_count` are kept as given; the page may hold fewer rows
/// than the total.
pub fn unify(
    page: RecordPage<SourceRecord>,
    kind: DataSourceKind,
    page_number: u32,
    page_size: u32,
) -> CadenceResult<DrillDownPage> {
    if let Some(stray) = page.records.iter().find(|r| r.source_kind() != kind) {
        return Err(CadenceError::Internal(format!(
            "{} record in a {kind} drill-down",
            stray.source_kind()
        )));
    }
    Ok(DrillDownPage {
        records: page.records.iter().map(project).collect(),
        total_count: page.total_count,
        page: page_number,
        page_size,
    })
}
