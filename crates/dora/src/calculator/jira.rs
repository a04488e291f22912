use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use cadence_common::error::CadenceResult;

use super::{bucket_by_day, collect_all, fetch_page, series, DeploymentSeries, QueryContext, SourceCalculator};
use crate::filter::JiraFilter;
use crate::kind::DataSourceKind;
use crate::records::{JiraIssue, JiraRelease, SourceRecord};
use crate::source::{QueryExecutor, RecordPage};

/// A deployment is a matching issue, or for `released_in` a shipped release.
pub struct JiraCalculator {
    issues: Arc<dyn QueryExecutor<JiraFilter, JiraIssue>>,
    releases: Arc<dyn QueryExecutor<JiraFilter, JiraRelease>>,
}

impl JiraCalculator {
    pub fn new(
        issues: Arc<dyn QueryExecutor<JiraFilter, JiraIssue>>,
        releases: Arc<dyn QueryExecutor<JiraFilter, JiraRelease>>,
    ) -> Self {
        Self { issues, releases }
    }
}

#[async_trait]
impl SourceCalculator for JiraCalculator {
    type Filter = JiraFilter;

    async fn compute_deployment_time_series(
        &self,
        ctx: &QueryContext<'_>,
        filter: &JiraFilter,
    ) -> CadenceResult<DeploymentSeries> {
        let field = filter.common.calculation_field;
        let counts = if filter.is_release_route() {
            let mut releases = collect_all(self.releases.as_ref(), ctx, filter, DataSourceKind::JiraIm).await?;
            // same fix version can come back once per issue
            let mut seen = HashSet::new();
            releases.retain(|r| seen.insert((r.project.clone(), r.name.clone())));
            bucket_by_day(&releases, field, |_| None)
        } else {
            let issues = collect_all(self.issues.as_ref(), ctx, filter, DataSourceKind::JiraIm).await?;
            bucket_by_day(&issues, field, |_| None)
        };
        Ok(series(&counts, filter.active_range()))
    }

    async fn list_drill_down_page(
        &self,
        ctx: &QueryContext<'_>,
        filter: &JiraFilter,
        page: u32,
        page_size: u32,
    ) -> CadenceResult<RecordPage<SourceRecord>> {
        if filter.is_release_route() {
            fetch_page(
                self.releases.as_ref(),
                ctx,
                filter,
                DataSourceKind::JiraIm,
                page,
                page_size,
                SourceRecord::Release,
            )
            .await
        } else {
            fetch_page(
                self.issues.as_ref(),
                ctx,
                filter,
                DataSourceKind::JiraIm,
                page,
                page_size,
                SourceRecord::Issue,
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::typed::FilterCommon;
    use crate::filter::{CalculationField, FilterMap};
    use crate::test_support::{issue, release, VecExecutor};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn filter(field: CalculationField) -> JiraFilter {
        let common = FilterCommon {
            calculation_field: field,
            integration_ids: vec!["1".into()],
            excludes: BTreeMap::new(),
            partial_match: BTreeMap::new(),
        };
        JiraFilter::build(&FilterMap::new(), common).unwrap()
    }

    fn ctx() -> QueryContext<'static> {
        QueryContext {
            tenant: "acme",
            scope: None,
            aggregation_page_size: 50,
        }
    }

    fn calculator() -> (
        JiraCalculator,
        Arc<VecExecutor<JiraFilter, JiraIssue>>,
        Arc<VecExecutor<JiraFilter, JiraRelease>>,
    ) {
        let day = |d| Utc.with_ymd_and_hms(2026, 3, d, 12, 0, 0).unwrap();
        let issues = Arc::new(VecExecutor::new(vec![issue("1", day(1)), issue("2", day(1)), issue("3", day(2))]));
        let releases = Arc::new(VecExecutor::new(vec![
            release("1.0", day(1), 2),
            release("1.0", day(1), 2),
            release("1.1", day(2), 1),
        ]));
        (JiraCalculator::new(issues.clone(), releases.clone()), issues, releases)
    }

    #[tokio::test]
    async fn resolved_field_counts_issues() {
        let (calc, _issues, releases) = calculator();
        let out = calc
            .compute_deployment_time_series(&ctx(), &filter(CalculationField::IssueResolvedAt))
            .await
            .unwrap();
        assert_eq!(out.total_deployment, 3);
        assert_eq!(releases.call_count(), 0);
    }

    #[tokio::test]
    async fn released_in_counts_distinct_releases() {
        let (calc, issues, _releases) = calculator();
        let out = calc
            .compute_deployment_time_series(&ctx(), &filter(CalculationField::ReleasedIn))
            .await
            .unwrap();
        assert_eq!(out.total_deployment, 2);
        assert_eq!(issues.call_count(), 0);
    }

    #[tokio::test]
    async fn released_in_drill_down_lists_releases() {
        let (calc, _issues, _releases) = calculator();
        let page = calc
            .list_drill_down_page(&ctx(), &filter(CalculationField::ReleasedIn), 0, 10)
            .await
            .unwrap();
        assert!(page.records.iter().all(|r| matches!(r, SourceRecord::Release(_))));
    }

    #[tokio::test]
    async fn updated_field_drill_down_lists_issues() {
        let (calc, _issues, _releases) = calculator();
        let page = calc
            .list_drill_down_page(&ctx(), &filter(CalculationField::IssueUpdatedAt), 0, 2)
            .await
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total_count, 3);
        assert!(matches!(page.records[0], SourceRecord::Issue(_)));
    }
}
