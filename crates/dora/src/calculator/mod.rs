//! Source calculators: one per data-source kind.
//!
//! Each calculator walks its executor's pages, buckets matching rows by the
//! active calculation field and returns counts. Band classification and
//! ratios are left to the orchestrator.

pub mod ado;
pub mod cicd;
pub mod jira;
pub mod scm;

use async_trait::async_trait;

use cadence_common::error::{CadenceError, CadenceResult};

use crate::filter::{CalculationField, TimeRange};
use crate::kind::DataSourceKind;
use crate::records::{Anchored, SourceRecord};
use crate::source::{OrgScopeToken, QueryExecutor, RecordPage};
use crate::timeseries::{DayCounts, TimeSeries};

pub use ado::AdoCalculator;
pub use cicd::CiCdCalculator;
pub use jira::JiraCalculator;
pub use scm::ScmCalculator;

/// Per-call context handed to every executor.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    pub tenant: &'a str,
    pub scope: Option<&'a OrgScopeToken>,
    /// Page size used when walking every matching row.
    pub aggregation_page_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentSeries {
    pub time_series: TimeSeries,
    pub total_deployment: u64,
}

#[async_trait]
pub trait SourceCalculator: Send + Sync {
    type Filter: Send + Sync;

    async fn compute_deployment_time_series(
        &self,
        ctx: &QueryContext<'_>,
        filter: &Self::Filter,
    ) -> CadenceResult<DeploymentSeries>;

    /// A failed deployment is a deployment under the failure definition's
    /// filter, so by default this is the same walk.
    async fn compute_failure_time_series(
        &self,
        ctx: &QueryContext<'_>,
        filter: &Self::Filter,
    ) -> CadenceResult<DeploymentSeries> {
        self.compute_deployment_time_series(ctx, filter).await
    }

    async fn list_drill_down_page(
        &self,
        ctx: &QueryContext<'_>,
        filter: &Self::Filter,
        page: u32,
        page_size: u32,
    ) -> CadenceResult<RecordPage<SourceRecord>>;
}

/// Executor failures surface as `UpstreamUnavailable`; caller mistakes pass through.
pub(crate) fn upstream(kind: DataSourceKind) -> impl Fn(CadenceError) -> CadenceError {
    move |err| {
        if err.is_client_error() {
            err
        } else {
            CadenceError::UpstreamUnavailable(format!("{kind} query failed: {err}"))
        }
    }
}

/// Fetch every page for `filter`.
pub(crate) async fn collect_all<F, R>(
    executor: &dyn QueryExecutor<F, R>,
    ctx: &QueryContext<'_>,
    filter: &F,
    kind: DataSourceKind,
) -> CadenceResult<Vec<R>>
where
    F: Sync,
    R: Send,
{
    let page_size = ctx.aggregation_page_size.max(1);
    let mut rows = Vec::new();
    let mut page = 0u32;
    loop {
        let batch = executor
            .execute(ctx.tenant, filter, ctx.scope, page, page_size)
            .await
            .map_err(upstream(kind))?;
        let fetched = batch.records.len();
        rows.extend(batch.records);

        if fetched < page_size as usize || rows.len() as u64 >= batch.total_count {
            break;
        }
        page += 1;
    }
    tracing::debug!(kind = %kind, rows = rows.len(), pages = page + 1, "collected rows");
    Ok(rows)
}

/// Fetch one page and wrap each row as a [`SourceRecord`].
pub(crate) async fn fetch_page<F, R>(
    executor: &dyn QueryExecutor<F, R>,
    ctx: &QueryContext<'_>,
    filter: &F,
    kind: DataSourceKind,
    page: u32,
    page_size: u32,
    wrap: fn(R) -> SourceRecord,
) -> CadenceResult<RecordPage<SourceRecord>>
where
    F: Sync,
    R: Send,
{
    let batch = executor
        .execute(ctx.tenant, filter, ctx.scope, page, page_size)
        .await
        .map_err(upstream(kind))?;
    Ok(RecordPage {
        records: batch.records.into_iter().map(wrap).collect(),
        total_count: batch.total_count,
    })
}

/// Bucket rows by the day of `field`. Rows without that timestamp are skipped.
pub(crate) fn bucket_by_day<R, S>(rows: &[R], field: CalculationField, stack: S) -> DayCounts
where
    R: Anchored,
    S: Fn(&R) -> Option<String>,
{
    let mut counts = DayCounts::new();
    let mut skipped = 0usize;
    for row in rows {
        match row.anchor(field) {
            Some(at) => counts.add(at, stack(row)),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(field = %field, skipped, "rows without anchor timestamp");
    }
    counts
}

pub(crate) fn series(counts: &DayCounts, range: Option<&TimeRange>) -> DeploymentSeries {
    DeploymentSeries {
        time_series: TimeSeries::build(counts, range),
        total_deployment: counts.total(),
    }
}
