use std::sync::Arc;

use async_trait::async_trait;

use cadence_common::error::CadenceResult;

use super::{bucket_by_day, collect_all, fetch_page, series, DeploymentSeries, QueryContext, SourceCalculator};
use crate::filter::ScmFilter;
use crate::kind::DataSourceKind;
use crate::profile::DeploymentRoute;
use crate::records::{ScmCommit, ScmPullRequest, SourceRecord};
use crate::source::{QueryExecutor, RecordPage};

/// Deployments are merged/closed pull requests or direct commits to a
/// branch, depending on the filter's route. A calculation only ever reads
/// one of the two.
pub struct ScmCalculator {
    pull_requests: Arc<dyn QueryExecutor<ScmFilter, ScmPullRequest>>,
    commits: Arc<dyn QueryExecutor<ScmFilter, ScmCommit>>,
}

impl ScmCalculator {
    pub fn new(
        pull_requests: Arc<dyn QueryExecutor<ScmFilter, ScmPullRequest>>,
        commits: Arc<dyn QueryExecutor<ScmFilter, ScmCommit>>,
    ) -> Self {
        Self { pull_requests, commits }
    }
}

#[async_trait]
impl SourceCalculator for ScmCalculator {
    type Filter = ScmFilter;

    async fn compute_deployment_time_series(
        &self,
        ctx: &QueryContext<'_>,
        filter: &ScmFilter,
    ) -> CadenceResult<DeploymentSeries> {
        let field = filter.common.calculation_field;
        let counts = match filter.route {
            DeploymentRoute::Pr => {
                let prs = collect_all(self.pull_requests.as_ref(), ctx, filter, DataSourceKind::Scm).await?;
                bucket_by_day(&prs, field, |_| None)
            }
            DeploymentRoute::Commit => {
                let commits = collect_all(self.commits.as_ref(), ctx, filter, DataSourceKind::Scm).await?;
                bucket_by_day(&commits, field, |_| None)
            }
        };
        tracing::debug!(route = %filter.route, total = counts.total(), "scm deployments counted");
        Ok(series(&counts, filter.active_range()))
    }

    async fn list_drill_down_page(
        &self,
        ctx: &QueryContext<'_>,
        filter: &ScmFilter,
        page: u32,
        page_size: u32,
    ) -> CadenceResult<RecordPage<SourceRecord>> {
        match filter.route {
            DeploymentRoute::Pr => {
                fetch_page(
                    self.pull_requests.as_ref(),
                    ctx,
                    filter,
                    DataSourceKind::Scm,
                    page,
                    page_size,
                    SourceRecord::PullRequest,
                )
                .await
            }
            DeploymentRoute::Commit => {
                fetch_page(
                    self.commits.as_ref(),
                    ctx,
                    filter,
                    DataSourceKind::Scm,
                    page,
                    page_size,
                    SourceRecord::Commit,
                )
                .await
            }
        }
    }
}
