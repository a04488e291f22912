use std::sync::Arc;

use async_trait::async_trait;

use cadence_common::error::CadenceResult;

use super::{bucket_by_day, collect_all, series, upstream, DeploymentSeries, QueryContext, SourceCalculator};
use crate::filter::WorkItemFilter;
use crate::kind::DataSourceKind;
use crate::records::{SourceRecord, WorkItem};
use crate::source::{MilestoneResolver, QueryExecutor, RecordPage};

/// Azure DevOps work items. Drill-down rows carry the sprints each item
/// belongs to.
pub struct AdoCalculator {
    work_items: Arc<dyn QueryExecutor<WorkItemFilter, WorkItem>>,
    milestones: Arc<dyn MilestoneResolver>,
}

impl AdoCalculator {
    pub fn new(
        work_items: Arc<dyn QueryExecutor<WorkItemFilter, WorkItem>>,
        milestones: Arc<dyn MilestoneResolver>,
    ) -> Self {
        Self { work_items, milestones }
    }
}

#[async_trait]
impl SourceCalculator for AdoCalculator {
    type Filter = WorkItemFilter;

    async fn compute_deployment_time_series(
        &self,
        ctx: &QueryContext<'_>,
        filter: &WorkItemFilter,
    ) -> CadenceResult<DeploymentSeries> {
        let items = collect_all(self.work_items.as_ref(), ctx, filter, DataSourceKind::AdoIm).await?;
        let counts = bucket_by_day(&items, filter.common.calculation_field, |_| None);
        Ok(series(&counts, filter.active_range()))
    }

    async fn list_drill_down_page(
        &self,
        ctx: &QueryContext<'_>,
        filter: &WorkItemFilter,
        page: u32,
        page_size: u32,
    ) -> CadenceResult<RecordPage<SourceRecord>> {
        let batch = self
            .work_items
            .execute(ctx.tenant, filter, ctx.scope, page, page_size)
            .await
            .map_err(upstream(DataSourceKind::AdoIm))?;

        if batch.records.is_empty() {
            return Ok(RecordPage {
                records: Vec::new(),
                total_count: batch.total_count,
            });
        }

        let ids: Vec<String> = batch.records.iter().map(|w| w.workitem_id.clone()).collect();
        let mut membership = self
            .milestones
            .milestones_for(ctx.tenant, &filter.common.integration_ids, &ids)
            .await
            .map_err(upstream(DataSourceKind::AdoIm))?;

        let records = batch
            .records
            .into_iter()
            .map(|item| {
                let milestones = membership.remove(&item.workitem_id).unwrap_or_default();
                SourceRecord::WorkItem { item, milestones }
            })
            .collect();

        Ok(RecordPage {
            records,
            total_count: batch.total_count,
        })
    }
}
