use std::sync::Arc;

use async_trait::async_trait;

use cadence_common::error::CadenceResult;

use super::{bucket_by_day, collect_all, fetch_page, series, upstream, DeploymentSeries, QueryContext, SourceCalculator};
use crate::filter::{CiCdFilter, CiCdStack, JobRunParameter};
use crate::kind::DataSourceKind;
use crate::records::{CiCdJobRun, SourceRecord};
use crate::source::{JobParameterSource, QueryExecutor, RecordPage};

/// A deployment is one job run matching the filter.
pub struct CiCdCalculator {
    job_runs: Arc<dyn QueryExecutor<CiCdFilter, CiCdJobRun>>,
    job_params: Arc<dyn JobParameterSource>,
}

impl CiCdCalculator {
    pub fn new(
        job_runs: Arc<dyn QueryExecutor<CiCdFilter, CiCdJobRun>>,
        job_params: Arc<dyn JobParameterSource>,
    ) -> Self {
        Self { job_runs, job_params }
    }

    /// Run parameters seen for `job_ids`, grouped by name. Names keep first-seen
    /// order and each value appears once.
    pub async fn job_parameters(&self, tenant: &str, job_ids: &[String]) -> CadenceResult<Vec<JobRunParameter>> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .job_params
            .job_run_params(tenant, job_ids)
            .await
            .map_err(upstream(DataSourceKind::CiCd))?;

        let mut grouped: Vec<JobRunParameter> = Vec::new();
        for (name, value) in rows {
            match grouped.iter_mut().find(|p| p.name == name) {
                Some(param) => {
                    if !param.values.contains(&value) {
                        param.values.push(value);
                    }
                }
                None => grouped.push(JobRunParameter {
                    name,
                    values: vec![value],
                }),
            }
        }
        Ok(grouped)
    }
}

fn stack_value(run: &CiCdJobRun, stack: CiCdStack) -> Option<String> {
    match stack {
        CiCdStack::JobName => run.job_name.clone(),
        CiCdStack::ProjectName => run.project_name.clone(),
        CiCdStack::JobStatus => run.status.clone(),
        CiCdStack::InstanceName => run.cicd_instance_name.clone(),
        CiCdStack::CicdUserId => run.cicd_user_id.clone(),
    }
}

#[async_trait]
impl SourceCalculator for CiCdCalculator {
    type Filter = CiCdFilter;

    async fn compute_deployment_time_series(
        &self,
        ctx: &QueryContext<'_>,
        filter: &CiCdFilter,
    ) -> CadenceResult<DeploymentSeries> {
        let runs = collect_all(self.job_runs.as_ref(), ctx, filter, DataSourceKind::CiCd).await?;
        let counts = bucket_by_day(&runs, filter.common.calculation_field, |run| {
            filter.stack.and_then(|s| stack_value(run, s))
        });
        Ok(series(&counts, filter.active_range()))
    }

    async fn list_drill_down_page(
        &self,
        ctx: &QueryContext<'_>,
        filter: &CiCdFilter,
        page: u32,
        page_size: u32,
    ) -> CadenceResult<RecordPage<SourceRecord>> {
        fetch_page(
            self.job_runs.as_ref(),
            ctx,
            filter,
            DataSourceKind::CiCd,
            page,
            page_size,
            SourceRecord::JobRun,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::typed::FilterCommon;
    use crate::filter::{CalculationField, FilterMap, TimeRange};
    use crate::test_support::{job_run, StaticJobParams, VecExecutor};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn filter(stack: Option<CiCdStack>) -> CiCdFilter {
        let mut map = FilterMap::new();
        map.insert(
            "end_time".into(),
            serde_json::json!({"$gt": "1772323200", "$lt": "1772755200"}),
        );
        let common = FilterCommon {
            calculation_field: CalculationField::EndTime,
            integration_ids: vec!["4".into()],
            excludes: BTreeMap::new(),
            partial_match: BTreeMap::new(),
        };
        CiCdFilter::build(&map, common, stack).unwrap()
    }

    fn ctx() -> QueryContext<'static> {
        QueryContext {
            tenant: "acme",
            scope: None,
            aggregation_page_size: 4,
        }
    }

    /// Ten runs across five days, two per day.
    fn ten_runs() -> Vec<CiCdJobRun> {
        (0..10)
            .map(|i| {
                let mut run = job_run(
                    &format!("r{i}"),
                    Utc.with_ymd_and_hms(2026, 3, 1 + (i / 2) as u32, 8 + i as u32, 0, 0).unwrap(),
                );
                if i % 2 == 1 {
                    run.job_name = Some("deploy-eu".into());
                }
                run
            })
            .collect()
    }

    #[tokio::test]
    async fn counts_runs_per_day_across_pages() {
        let calc = CiCdCalculator::new(
            Arc::new(VecExecutor::<CiCdFilter, CiCdJobRun>::new(ten_runs())),
            Arc::new(StaticJobParams::default()),
        );
        let out = calc.compute_deployment_time_series(&ctx(), &filter(None)).await.unwrap();
        assert_eq!(out.total_deployment, 10);
        let per_day: Vec<u64> = out.time_series.day.iter().map(|p| p.count).collect();
        assert_eq!(per_day, vec![2, 2, 2, 2, 2]);
        assert_eq!(
            filter(None).active_range().copied(),
            Some(TimeRange::new(
                chrono::DateTime::from_timestamp(1_772_323_200, 0),
                chrono::DateTime::from_timestamp(1_772_755_200, 0)
            ))
        );
    }

    #[tokio::test]
    async fn stack_splits_buckets_by_job_name() {
        let calc = CiCdCalculator::new(
            Arc::new(VecExecutor::<CiCdFilter, CiCdJobRun>::new(ten_runs())),
            Arc::new(StaticJobParams::default()),
        );
        let out = calc
            .compute_deployment_time_series(&ctx(), &filter(Some(CiCdStack::JobName)))
            .await
            .unwrap();
        let first = &out.time_series.day[0];
        assert_eq!(first.stacks.get("deploy-prod"), Some(&1));
        assert_eq!(first.stacks.get("deploy-eu"), Some(&1));
        let month = &out.time_series.month[0];
        assert_eq!(month.stacks.values().sum::<u64>(), 10);
    }

    #[tokio::test]
    async fn job_parameters_are_grouped_by_name() {
        let params = StaticJobParams {
            rows: vec![
                ("env".into(), "prod".into()),
                ("region".into(), "eu".into()),
                ("env".into(), "staging".into()),
                ("env".into(), "prod".into()),
            ],
        };
        let calc = CiCdCalculator::new(
            Arc::new(VecExecutor::<CiCdFilter, CiCdJobRun>::new(Vec::new())),
            Arc::new(params),
        );
        let grouped = calc.job_parameters("acme", &["job-1".into()]).await.unwrap();
        assert_eq!(
            grouped,
            vec![
                JobRunParameter {
                    name: "env".into(),
                    values: vec!["prod".into(), "staging".into()]
                },
                JobRunParameter {
                    name: "region".into(),
                    values: vec!["eu".into()]
                },
            ]
        );
    }

    #[tokio::test]
    async fn no_job_ids_means_no_parameters() {
        let params = StaticJobParams {
            rows: vec![("env".into(), "prod".into())],
        };
        let calc = CiCdCalculator::new(
            Arc::new(VecExecutor::<CiCdFilter, CiCdJobRun>::new(Vec::new())),
            Arc::new(params),
        );
        assert!(calc.job_parameters("acme", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drill_down_pages_through_runs() {
        let calc = CiCdCalculator::new(
            Arc::new(VecExecutor::<CiCdFilter, CiCdJobRun>::new(ten_runs())),
            Arc::new(StaticJobParams::default()),
        );
        let page = calc.list_drill_down_page(&ctx(), &filter(None), 2, 4).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total_count, 10);
    }
}
