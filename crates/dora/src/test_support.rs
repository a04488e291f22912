//! In-memory collaborators and record builders shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use cadence_common::error::{CadenceError, CadenceResult};

use crate::cache::CacheKey;
use crate::kind::{DataSourceKind, IntegrationType};
use crate::profile::{IntegrationBinding, WorkflowProfile};
use crate::records::{CiCdJobRun, JiraIssue, JiraRelease, Milestone, ScmCommit, ScmPullRequest, WorkItem};
use crate::request::MetricRequest;
use crate::source::{
    CacheLayer, ComputeFuture, Integration, IntegrationDirectory, JobParameterSource, MilestoneResolver,
    OrgScopeResolver, OrgScopeToken, QueryExecutor, RecordPage, WorkflowProfileStore,
};

pub fn binding(integration_type: IntegrationType, ids: &[&str]) -> IntegrationBinding {
    IntegrationBinding {
        integration_type,
        integration_ids: ids.iter().map(|s| s.to_string()).collect(),
    }
}

// ── integrations ──────────────────────────────────────────────────

pub struct StaticDirectory {
    integrations: HashMap<String, Integration>,
}

impl StaticDirectory {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            integrations: entries
                .iter()
                .map(|(id, app)| {
                    (
                        id.to_string(),
                        Integration {
                            id: id.to_string(),
                            application: app.to_string(),
                            name: None,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl IntegrationDirectory for StaticDirectory {
    async fn get_integration(&self, _tenant: &str, integration_id: &str) -> CadenceResult<Option<Integration>> {
        Ok(self.integrations.get(integration_id).cloned())
    }
}

// ── executors ─────────────────────────────────────────────────────

/// Serves `records` page by page and remembers the last filter it saw.
pub struct VecExecutor<F, R> {
    records: Vec<R>,
    delay: Option<Duration>,
    fail: bool,
    pub calls: Mutex<u32>,
    pub last_filter: Mutex<Option<F>>,
    pub last_scope: Mutex<Option<OrgScopeToken>>,
}

impl<F, R> VecExecutor<F, R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records,
            delay: None,
            fail: false,
            calls: Mutex::new(0),
            last_filter: Mutex::new(None),
            last_scope: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn slow(records: Vec<R>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(records)
        }
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl<F, R> QueryExecutor<F, R> for VecExecutor<F, R>
where
    F: Clone + Send + Sync,
    R: Clone + Send + Sync,
{
    async fn execute(
        &self,
        _tenant: &str,
        filter: &F,
        scope: Option<&OrgScopeToken>,
        page: u32,
        page_size: u32,
    ) -> CadenceResult<RecordPage<R>> {
        *self.calls.lock().unwrap() += 1;
        *self.last_filter.lock().unwrap() = Some(filter.clone());
        *self.last_scope.lock().unwrap() = scope.cloned();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(CadenceError::UpstreamUnavailable("storage offline".into()));
        }

        let start = (page as usize).saturating_mul(page_size as usize);
        let records = self
            .records
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(RecordPage {
            records,
            total_count: self.records.len() as u64,
        })
    }
}

// ── org scope ─────────────────────────────────────────────────────

pub struct StaticScope {
    token: Option<OrgScopeToken>,
    pub calls: Mutex<u32>,
}

impl StaticScope {
    pub fn scoped(ou_id: &str) -> Self {
        Self {
            token: Some(OrgScopeToken {
                ou_id: ou_id.to_owned(),
                ou_version: Some("1".into()),
                integration_ids: Vec::new(),
                filters: Default::default(),
            }),
            calls: Mutex::new(0),
        }
    }

    pub fn broken() -> Self {
        Self {
            token: None,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl OrgScopeResolver for StaticScope {
    async fn resolve(
        &self,
        _tenant: &str,
        _kinds: &[DataSourceKind],
        request: &MetricRequest,
    ) -> CadenceResult<(MetricRequest, OrgScopeToken)> {
        *self.calls.lock().unwrap() += 1;
        match &self.token {
            Some(token) => Ok((request.clone(), token.clone())),
            None => Err(CadenceError::UpstreamUnavailable("ou tables unavailable".into())),
        }
    }
}

// ── cache ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Value>>,
    pub computes: Mutex<u32>,
    pub keys: Mutex<Vec<String>>,
}

impl MemoryCache {
    pub fn compute_count(&self) -> u32 {
        *self.computes.lock().unwrap()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn cache_or_compute<'a>(
        &self,
        key: &CacheKey,
        _integration_ids: &[String],
        _ttl: Duration,
        compute: ComputeFuture<'a>,
    ) -> CadenceResult<Value> {
        self.keys.lock().unwrap().push(key.as_str().to_owned());
        let hit = self.entries.lock().unwrap().get(key.as_str()).cloned();
        if let Some(hit) = hit {
            return Ok(hit);
        }
        *self.computes.lock().unwrap() += 1;
        let value = compute.await?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.as_str().to_owned(), value.clone());
        Ok(value)
    }
}

// ── profiles, milestones, job params ──────────────────────────────

#[derive(Default)]
pub struct StaticProfiles {
    pub by_ou: HashMap<String, WorkflowProfile>,
}

#[async_trait]
impl WorkflowProfileStore for StaticProfiles {
    async fn profile_for_ou(&self, _tenant: &str, ou_id: &str) -> CadenceResult<Option<WorkflowProfile>> {
        Ok(self.by_ou.get(ou_id).cloned())
    }
}

#[derive(Default)]
pub struct StaticMilestones {
    pub by_item: HashMap<String, Vec<Milestone>>,
    pub calls: Mutex<u32>,
}

#[async_trait]
impl MilestoneResolver for StaticMilestones {
    async fn milestones_for(
        &self,
        _tenant: &str,
        _integration_ids: &[String],
        workitem_ids: &[String],
    ) -> CadenceResult<HashMap<String, Vec<Milestone>>> {
        *self.calls.lock().unwrap() += 1;
        Ok(workitem_ids
            .iter()
            .filter_map(|id| self.by_item.get(id).map(|m| (id.clone(), m.clone())))
            .collect())
    }
}

#[derive(Default)]
pub struct StaticJobParams {
    pub rows: Vec<(String, String)>,
}

#[async_trait]
impl JobParameterSource for StaticJobParams {
    async fn job_run_params(&self, _tenant: &str, _job_ids: &[String]) -> CadenceResult<Vec<(String, String)>> {
        Ok(self.rows.clone())
    }
}

// ── record builders ───────────────────────────────────────────────

pub fn pull_request(id: &str, merged_at: DateTime<Utc>) -> ScmPullRequest {
    ScmPullRequest {
        id: id.to_owned(),
        number: format!("#{id}"),
        title: Some(format!("change {id}")),
        project: Some("core".into()),
        repo_ids: vec!["repo-a".into()],
        creator: Some("dev".into()),
        state: Some("merged".into()),
        source_branch: Some(format!("feature/{id}")),
        target_branch: Some("main".into()),
        merge_sha: Some(format!("merge-{id}")),
        labels: Vec::new(),
        pr_created_at: Some(merged_at - chrono::Duration::hours(5)),
        pr_merged_at: Some(merged_at),
        pr_closed_at: Some(merged_at),
        integration_id: "3".into(),
    }
}

pub fn commit(id: &str, repo: &str, committed_at: DateTime<Utc>) -> ScmCommit {
    ScmCommit {
        id: id.to_owned(),
        commit_sha: format!("sha-{id}"),
        repo_ids: vec![repo.to_owned()],
        project: Some("core".into()),
        author: Some("dev".into()),
        committer: Some("dev".into()),
        message: Some(format!("commit {id}")),
        branch: Some("main".into()),
        committed_at: Some(committed_at),
        commit_pushed_at: Some(committed_at),
        tags: Vec::new(),
        commit_url: None,
        integration_id: "3".into(),
    }
}

pub fn job_run(id: &str, end_time: DateTime<Utc>) -> CiCdJobRun {
    CiCdJobRun {
        id: id.to_owned(),
        cicd_job_id: format!("job-{id}"),
        job_run_number: Some(1),
        status: Some("SUCCESS".into()),
        start_time: Some(end_time - chrono::Duration::minutes(10)),
        end_time: Some(end_time),
        duration: Some(600),
        cicd_user_id: Some("deployer".into()),
        job_name: Some("deploy-prod".into()),
        job_normalized_full_name: Some("platform/deploy-prod".into()),
        project_name: Some("platform".into()),
        integration_id: Some("4".into()),
        scm_commit_ids: Vec::new(),
        scm_url: None,
        log_gcspath: None,
        cicd_instance_name: Some("jenkins-main".into()),
        cicd_instance_guid: None,
        cicd_build_url: None,
        url: None,
        logs: None,
        cicd_branch: Some("main".into()),
        repo_url: None,
        rollback: Some(false),
        environment_ids: Vec::new(),
        infra_ids: Vec::new(),
        service_ids: Vec::new(),
        service_types: Vec::new(),
        tags: Vec::new(),
    }
}

pub fn issue(id: &str, resolved_at: DateTime<Utc>) -> JiraIssue {
    JiraIssue {
        id: id.to_owned(),
        key: format!("PAY-{id}"),
        summary: Some(format!("issue {id}")),
        project: Some("PAY".into()),
        status: Some("Done".into()),
        issue_type: Some("Story".into()),
        priority: Some("Medium".into()),
        assignee: None,
        reporter: None,
        labels: Vec::new(),
        fix_versions: vec!["1.0".into()],
        components: Vec::new(),
        story_points: Some(3.0),
        issue_created_at: Some(resolved_at - chrono::Duration::days(2)),
        issue_updated_at: Some(resolved_at),
        issue_resolved_at: Some(resolved_at),
        integration_id: "1".into(),
    }
}

pub fn release(name: &str, ended_at: DateTime<Utc>, issue_count: u64) -> JiraRelease {
    JiraRelease {
        name: name.to_owned(),
        project: Some("PAY".into()),
        issue_count,
        release_end_time: Some(ended_at),
    }
}

pub fn work_item(id: &str, resolved_at: DateTime<Utc>) -> WorkItem {
    WorkItem {
        id: id.to_owned(),
        workitem_id: format!("WI-{id}"),
        summary: Some(format!("work item {id}")),
        project: Some("Contoso".into()),
        status: Some("Closed".into()),
        workitem_type: Some("Bug".into()),
        priority: Some("2".into()),
        assignee: None,
        reporter: None,
        labels: Vec::new(),
        workitem_created_at: Some(resolved_at - chrono::Duration::days(1)),
        workitem_updated_at: Some(resolved_at),
        workitem_resolved_at: Some(resolved_at),
        integration_id: "2".into(),
    }
}
