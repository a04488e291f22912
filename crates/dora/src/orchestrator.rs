//! Metrics orchestrator: the entry point for DORA calculations.
//!
//! Each call resolves the section's data-source kind and org scope,
//! normalizes the profile definition(s) into typed filters, runs the
//! matching calculator under the configured deadline and classifies the
//! outcome. Results pass through the optional cache layer keyed by
//! [`cache_key`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use cadence_common::error::{CadenceError, CadenceResult};
use cadence_config::AppConfig;

use crate::band::BandTables;
use crate::cache::{cache_key, CacheKey, CacheKeyInputs};
use crate::calculator::{
    AdoCalculator, CiCdCalculator, DeploymentSeries, JiraCalculator, QueryContext, ScmCalculator, SourceCalculator,
};
use crate::drilldown::{unify, DrillDownPage};
use crate::filter::{CalculationField, JobRunParameter, NormalizedFilter};
use crate::kind::DataSourceKind;
use crate::metrics::{MetricResult, Stats};
use crate::normalize::{normalize, resolve_source_kind};
use crate::profile::{DefinitionTarget, DeploymentDefinition, DeploymentRoute, IntegrationBinding, WorkflowProfile};
use crate::records::SourceRecord;
use crate::request::{MetricKind, MetricRequest};
use crate::source::{
    CacheLayer, ComputeFuture, IntegrationDirectory, OrgScopeResolver, OrgScopeToken, RecordPage, WorkflowProfileStore,
};

/// Runtime knobs taken from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub cache_ttl: Duration,
    pub query_timeout: Duration,
    pub aggregation_page_size: u32,
    pub default_page_size: u32,
}

impl From<&AppConfig> for EngineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            cache_ttl: config.cache_ttl(),
            query_timeout: config.query_timeout(),
            aggregation_page_size: config.aggregation_page_size,
            default_page_size: config.default_page_size,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Services the engine calls out to. The cache is optional.
#[derive(Clone)]
pub struct Collaborators {
    pub org_scope: Arc<dyn OrgScopeResolver>,
    pub integrations: Arc<dyn IntegrationDirectory>,
    pub profiles: Arc<dyn WorkflowProfileStore>,
    pub cache: Option<Arc<dyn CacheLayer>>,
}

/// One calculator per data-source kind.
pub struct Calculators {
    pub scm: ScmCalculator,
    pub cicd: CiCdCalculator,
    pub jira: JiraCalculator,
    pub ado: AdoCalculator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeriesRole {
    Deployment,
    Failure,
}

/// A section bound to its data-source kind and org scope.
struct ScopedSection {
    kind: DataSourceKind,
    request: MetricRequest,
    scope: Option<OrgScopeToken>,
}

pub struct DoraService {
    settings: EngineSettings,
    bands: BandTables,
    collaborators: Collaborators,
    calculators: Calculators,
}

impl DoraService {
    pub fn new(
        settings: EngineSettings,
        bands: BandTables,
        collaborators: Collaborators,
        calculators: Calculators,
    ) -> Self {
        Self {
            settings,
            bands,
            collaborators,
            calculators,
        }
    }

    /// Build the service from environment configuration. Fails if the
    /// configured thresholds do not form valid band tables.
    pub fn from_config(
        config: &AppConfig,
        collaborators: Collaborators,
        calculators: Calculators,
    ) -> CadenceResult<Self> {
        let bands = BandTables::from_thresholds(&config.thresholds)?;
        Ok(Self::new(EngineSettings::from(config), bands, collaborators, calculators))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Workflow profile of the request's first org unit.
    pub async fn profile_for_request(&self, tenant: &str, request: &MetricRequest) -> CadenceResult<WorkflowProfile> {
        let ou_id = request
            .first_ou_id()
            .ok_or_else(|| CadenceError::InvalidConfiguration("ou_id is missing in request".into()))?;

        self.collaborators
            .profiles
            .profile_for_ou(tenant, ou_id)
            .await?
            .ok_or_else(|| {
                CadenceError::InvalidConfiguration(format!("no workflow profile is associated with ou_id {ou_id}"))
            })
    }

    pub async fn deployment_frequency(
        &self,
        tenant: &str,
        profile: &WorkflowProfile,
        request: &MetricRequest,
    ) -> CadenceResult<MetricResult> {
        let metric = MetricKind::DeploymentFrequency;
        self.within_deadline(metric.as_str(), async {
            let section = &profile.deployment_frequency;
            let scoped = self.scope(tenant, &section.binding, request).await?;
            let filter = normalize(&scoped.request, &section.binding, &section.deployment, scoped.kind)?;

            let key = self.key(tenant, metric.as_str(), request, &filter, scoped.scope.as_ref(), profile)?;
            let (filter, scoped) = (&filter, &scoped);
            let compute: ComputeFuture<'_> = Box::pin(async move {
                let ctx = self.context(tenant, scoped.scope.as_ref());
                let series = self.compute_series(&ctx, filter, SeriesRole::Deployment).await?;
                let stats = Stats::deployment_frequency(series.total_deployment, filter.active_range(), &self.bands);
                tracing::info!(
                    tenant,
                    profile_id = %profile.id,
                    kind = %scoped.kind,
                    total = series.total_deployment,
                    band = ?stats.band(),
                    "deployment frequency computed"
                );
                encode(&MetricResult {
                    stats,
                    time_series: series.time_series,
                })
            });

            self.cached(&key, request, filter.integration_ids(), compute).await
        })
        .await
    }

    /// Failed deployments, and unless the profile reports absolute counts,
    /// their share of total deployments. Both definitions are normalized
    /// before either query runs; the two queries then run concurrently.
    pub async fn change_failure_rate(
        &self,
        tenant: &str,
        profile: &WorkflowProfile,
        request: &MetricRequest,
    ) -> CadenceResult<MetricResult> {
        let metric = MetricKind::ChangeFailureRate;
        self.within_deadline(metric.as_str(), async {
            let section = &profile.change_failure_rate;
            let scoped = self.scope(tenant, &section.binding, request).await?;
            let failed = normalize(&scoped.request, &section.binding, &section.failed_deployment, scoped.kind)?;

            let total = if section.is_absolute {
                None
            } else {
                let definition = section.total_deployment.as_ref().ok_or_else(|| {
                    CadenceError::InvalidConfiguration(format!(
                        "Invalid configuration for Change Failure Rate for WorkFlow Profile: {}",
                        profile.name
                    ))
                })?;
                Some(normalize(&scoped.request, &section.binding, definition, scoped.kind)?)
            };

            let key = self.key(
                tenant,
                metric.as_str(),
                request,
                &(&failed, total.as_ref()),
                scoped.scope.as_ref(),
                profile,
            )?;
            let (failed, total, scoped) = (&failed, total.as_ref(), &scoped);
            let compute: ComputeFuture<'_> = Box::pin(async move {
                let ctx = self.context(tenant, scoped.scope.as_ref());
                let (failed_series, total_series) = match total {
                    Some(total) => {
                        let (f, t) = tokio::try_join!(
                            self.compute_series(&ctx, failed, SeriesRole::Failure),
                            self.compute_series(&ctx, total, SeriesRole::Deployment),
                        )?;
                        (f, Some(t))
                    }
                    None => (self.compute_series(&ctx, failed, SeriesRole::Failure).await?, None),
                };

                let stats = match &total_series {
                    Some(t) => Stats::change_failure(
                        failed_series.total_deployment,
                        t.total_deployment,
                        &profile.name,
                        &self.bands,
                    )?,
                    None => Stats::absolute_failures(failed_series.total_deployment),
                };
                tracing::info!(
                    tenant,
                    profile_id = %profile.id,
                    kind = %scoped.kind,
                    failed = failed_series.total_deployment,
                    total = ?total_series.as_ref().map(|t| t.total_deployment),
                    band = ?stats.band(),
                    "change failure rate computed"
                );
                encode(&MetricResult {
                    stats,
                    time_series: failed_series.time_series,
                })
            });

            self.cached(&key, request, failed.integration_ids(), compute).await
        })
        .await
    }

    /// One page of the records behind `target`'s count.
    pub async fn drill_down(
        &self,
        tenant: &str,
        profile: &WorkflowProfile,
        request: &MetricRequest,
        target: DefinitionTarget,
    ) -> CadenceResult<DrillDownPage> {
        let (binding, definition) = profile.definition(target).ok_or_else(|| {
            CadenceError::InvalidConfiguration(format!(
                "WorkFlow Profile: {} has no {} definition",
                profile.name,
                target.as_str()
            ))
        })?;
        let endpoint = format!("drill_down_{}", target.as_str());
        self.within_deadline(&endpoint, async {
            let scoped = self.scope(tenant, binding, request).await?;
            let filter = normalize(&scoped.request, binding, definition, scoped.kind)?;
            self.drill_down_page(tenant, profile, request, &endpoint, &scoped, &filter)
                .await
        })
        .await
    }

    /// Direct-to-branch commits behind `target`'s section, pushed inside the
    /// request window. The section's route and calculation field are
    /// replaced; its filters and branch rules still apply.
    pub async fn scm_commit_list(
        &self,
        tenant: &str,
        profile: &WorkflowProfile,
        request: &MetricRequest,
        target: DefinitionTarget,
    ) -> CadenceResult<DrillDownPage> {
        let (binding, definition) = profile.definition(target).ok_or_else(|| {
            CadenceError::InvalidConfiguration(format!(
                "WorkFlow Profile: {} has no {} definition",
                profile.name,
                target.as_str()
            ))
        })?;
        let endpoint = format!("scm_commit_list_{}", target.as_str());
        self.within_deadline(&endpoint, async {
            let scoped = self.scope(tenant, binding, request).await?;
            if scoped.kind != DataSourceKind::Scm {
                return Err(CadenceError::InvalidConfiguration(format!(
                    "commit listing needs an SCM {} section, WorkFlow Profile: {} uses {}",
                    target.as_str(),
                    profile.name,
                    scoped.kind
                )));
            }
            let commits = commit_listing(definition);
            let filter = normalize(&scoped.request, binding, &commits, scoped.kind)?;
            self.drill_down_page(tenant, profile, request, &endpoint, &scoped, &filter)
                .await
        })
        .await
    }

    /// Run parameters recorded for the given CI/CD jobs.
    pub async fn cicd_job_parameters(&self, tenant: &str, job_ids: &[String]) -> CadenceResult<Vec<JobRunParameter>> {
        self.within_deadline("cicd_job_parameters", self.calculators.cicd.job_parameters(tenant, job_ids))
            .await
    }

    // ── internals ─────────────────────────────────────────────────

    async fn drill_down_page(
        &self,
        tenant: &str,
        profile: &WorkflowProfile,
        request: &MetricRequest,
        endpoint: &str,
        scoped: &ScopedSection,
        filter: &NormalizedFilter,
    ) -> CadenceResult<DrillDownPage> {
        let page = request.page;
        let page_size = request
            .page_size
            .filter(|&size| size > 0)
            .unwrap_or(self.settings.default_page_size);

        let key = self.key(tenant, endpoint, request, filter, scoped.scope.as_ref(), profile)?;
        let compute: ComputeFuture<'_> = Box::pin(async move {
            let ctx = self.context(tenant, scoped.scope.as_ref());
            let rows = self.list_page(&ctx, filter, page, page_size).await?;
            let unified = unify(rows, scoped.kind, page, page_size)?;
            tracing::info!(
                tenant,
                profile_id = %profile.id,
                kind = %scoped.kind,
                endpoint,
                returned = unified.records.len(),
                total = unified.total_count,
                "drill-down listed"
            );
            encode(&unified)
        });

        self.cached(&key, request, filter.integration_ids(), compute).await
    }

    async fn scope(
        &self,
        tenant: &str,
        binding: &IntegrationBinding,
        request: &MetricRequest,
    ) -> CadenceResult<ScopedSection> {
        let kind = resolve_source_kind(self.collaborators.integrations.as_ref(), tenant, binding).await?;

        let Some(ou_id) = request.first_ou_id() else {
            return Ok(ScopedSection {
                kind,
                request: request.clone(),
                scope: None,
            });
        };

        match self.collaborators.org_scope.resolve(tenant, &[kind], request).await {
            Ok((scoped, token)) => Ok(ScopedSection {
                kind,
                request: scoped,
                scope: Some(token),
            }),
            Err(err) => {
                tracing::error!(tenant, ou_id, kind = %kind, error = %err, "org unit scoping failed, running unscoped");
                Ok(ScopedSection {
                    kind,
                    request: request.clone(),
                    scope: None,
                })
            }
        }
    }

    fn context<'a>(&self, tenant: &'a str, scope: Option<&'a OrgScopeToken>) -> QueryContext<'a> {
        QueryContext {
            tenant,
            scope,
            aggregation_page_size: self.settings.aggregation_page_size,
        }
    }

    fn key<F: Serialize>(
        &self,
        tenant: &str,
        endpoint: &str,
        request: &MetricRequest,
        filters: &F,
        scope: Option<&OrgScopeToken>,
        profile: &WorkflowProfile,
    ) -> CadenceResult<CacheKey> {
        cache_key(&CacheKeyInputs {
            tenant,
            endpoint,
            page: request.page,
            page_size: request.page_size.unwrap_or(self.settings.default_page_size),
            sort: &request.sort,
            filters,
            scope,
            profile_id: profile.id,
            profile_updated_at: profile.updated_at,
        })
    }

    async fn cached<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        request: &MetricRequest,
        integration_ids: &[String],
        compute: ComputeFuture<'_>,
    ) -> CadenceResult<T> {
        let value = match &self.collaborators.cache {
            Some(cache) if !request.disable_cache => {
                cache
                    .cache_or_compute(key, integration_ids, self.settings.cache_ttl, compute)
                    .await?
            }
            _ => {
                tracing::debug!(key = %key, "cache bypassed");
                compute.await?
            }
        };
        serde_json::from_value(value)
            .map_err(|e| CadenceError::Internal(format!("cached value for {key} is malformed: {e}")))
    }

    async fn within_deadline<T, Fut>(&self, what: &str, fut: Fut) -> CadenceResult<T>
    where
        Fut: Future<Output = CadenceResult<T>>,
    {
        match tokio::time::timeout(self.settings.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(what, timeout_ms = self.settings.query_timeout.as_millis() as u64, "deadline exceeded");
                Err(CadenceError::UpstreamUnavailable(format!(
                    "{what} did not finish within {:?}",
                    self.settings.query_timeout
                )))
            }
        }
    }

    async fn compute_series(
        &self,
        ctx: &QueryContext<'_>,
        filter: &NormalizedFilter,
        role: SeriesRole,
    ) -> CadenceResult<DeploymentSeries> {
        match filter {
            NormalizedFilter::Scm(f) => run_series(&self.calculators.scm, ctx, f, role).await,
            NormalizedFilter::CiCd(f) => run_series(&self.calculators.cicd, ctx, f, role).await,
            NormalizedFilter::Jira(f) => run_series(&self.calculators.jira, ctx, f, role).await,
            NormalizedFilter::WorkItem(f) => run_series(&self.calculators.ado, ctx, f, role).await,
        }
    }

    async fn list_page(
        &self,
        ctx: &QueryContext<'_>,
        filter: &NormalizedFilter,
        page: u32,
        page_size: u32,
    ) -> CadenceResult<RecordPage<SourceRecord>> {
        match filter {
            NormalizedFilter::Scm(f) => self.calculators.scm.list_drill_down_page(ctx, f, page, page_size).await,
            NormalizedFilter::CiCd(f) => self.calculators.cicd.list_drill_down_page(ctx, f, page, page_size).await,
            NormalizedFilter::Jira(f) => self.calculators.jira.list_drill_down_page(ctx, f, page, page_size).await,
            NormalizedFilter::WorkItem(f) => self.calculators.ado.list_drill_down_page(ctx, f, page, page_size).await,
        }
    }
}

async fn run_series<C: SourceCalculator>(
    calculator: &C,
    ctx: &QueryContext<'_>,
    filter: &C::Filter,
    role: SeriesRole,
) -> CadenceResult<DeploymentSeries> {
    match role {
        SeriesRole::Deployment => calculator.compute_deployment_time_series(ctx, filter).await,
        SeriesRole::Failure => calculator.compute_failure_time_series(ctx, filter).await,
    }
}

/// `definition` re-anchored on commit push time and forced onto the commit
/// route. PR-only criteria are dropped.
fn commit_listing(definition: &DeploymentDefinition) -> DeploymentDefinition {
    let mut commits = definition.clone();
    commits.calculation_field = CalculationField::CommitPushedAt;
    commits.deployment_route = Some(DeploymentRoute::Commit);
    commits.deployment_criteria = definition
        .deployment_criteria
        .filter(|c| c.route() == DeploymentRoute::Commit);
    commits
}

fn encode<T: Serialize>(value: &T) -> CadenceResult<Value> {
    serde_json::to_value(value).map_err(|e| CadenceError::Internal(format!("result serialization failed: {e}")))
}
