//! Interfaces of the collaborators the engine calls out to.
//!
//! Query execution, org-unit scoping, caching and profile storage live
//! outside this crate. Implementations own their own retry policy.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cadence_common::error::CadenceResult;

use crate::cache::CacheKey;
use crate::filter::FilterMap;
use crate::kind::DataSourceKind;
use crate::profile::WorkflowProfile;
use crate::records::Milestone;
use crate::request::MetricRequest;

/// One page of rows plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPage<R> {
    pub records: Vec<R>,
    pub total_count: u64,
}

/// Opaque result of org-unit scoping, forwarded to executors and hashed into cache keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgScopeToken {
    pub ou_id: String,
    #[serde(default)]
    pub ou_version: Option<String>,
    #[serde(default)]
    pub integration_ids: Vec<String>,
    #[serde(default)]
    pub filters: FilterMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub application: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Runs a typed filter against one data source.
#[async_trait]
pub trait QueryExecutor<F, R>: Send + Sync
where
    F: Sync,
{
    async fn execute(
        &self,
        tenant: &str,
        filter: &F,
        scope: Option<&OrgScopeToken>,
        page: u32,
        page_size: u32,
    ) -> CadenceResult<RecordPage<R>>;
}

#[async_trait]
pub trait OrgScopeResolver: Send + Sync {
    /// Narrow `request` to the org unit it names.
    async fn resolve(
        &self,
        tenant: &str,
        kinds: &[DataSourceKind],
        request: &MetricRequest,
    ) -> CadenceResult<(MetricRequest, OrgScopeToken)>;
}

#[async_trait]
pub trait IntegrationDirectory: Send + Sync {
    async fn get_integration(&self, tenant: &str, integration_id: &str) -> CadenceResult<Option<Integration>>;
}

pub type ComputeFuture<'a> = Pin<Box<dyn Future<Output = CadenceResult<Value>> + Send + 'a>>;

#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Return the cached value for `key` or run `compute` and store its output.
    async fn cache_or_compute<'a>(
        &self,
        key: &CacheKey,
        integration_ids: &[String],
        ttl: Duration,
        compute: ComputeFuture<'a>,
    ) -> CadenceResult<Value>;
}

#[async_trait]
pub trait WorkflowProfileStore: Send + Sync {
    async fn profile_for_ou(&self, tenant: &str, ou_id: &str) -> CadenceResult<Option<WorkflowProfile>>;
}

#[async_trait]
pub trait MilestoneResolver: Send + Sync {
    /// Milestones per work-item id. Items with none may be absent from the map.
    async fn milestones_for(
        &self,
        tenant: &str,
        integration_ids: &[String],
        workitem_ids: &[String],
    ) -> CadenceResult<HashMap<String, Vec<Milestone>>>;
}

#[async_trait]
pub trait JobParameterSource: Send + Sync {
    /// `(name, value)` rows of run parameters seen for the given jobs.
    async fn job_run_params(&self, tenant: &str, job_ids: &[String]) -> CadenceResult<Vec<(String, String)>>;
}
