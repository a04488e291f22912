//! Filter normalizer: request + profile definition -> typed source filter.

use serde_json::Value;

use cadence_common::error::{CadenceError, CadenceResult};

use crate::filter::exclude::{
    extract_excludes, extract_partial_match, CICD_PARTIAL_MATCH_COLUMNS, JIRA_PARTIAL_MATCH_COLUMNS,
    SCM_COMMIT_PARTIAL_MATCH_COLUMNS, SCM_PR_PARTIAL_MATCH_COLUMNS, WORKITEM_PARTIAL_MATCH_COLUMNS,
};
use crate::filter::typed::FilterCommon;
use crate::filter::{
    merge_filters, with_ci_cd_flags, with_job_run_params, CalculationField, CiCdFilter, CiCdStack,
    FilterMap, JiraFilter, NormalizedFilter, ScmFilter, WorkItemFilter,
};
use crate::kind::DataSourceKind;
use crate::profile::{DeploymentDefinition, DeploymentRoute, IntegrationBinding};
use crate::request::MetricRequest;
use crate::source::IntegrationDirectory;

/// Generic window key sent by drill-down widgets.
pub const TIME_RANGE_KEY: &str = "time_range";

/// Resolve the data-source kind of a section from its integrations.
///
/// Every configured id must exist and map to the same kind.
pub async fn resolve_source_kind(
    directory: &dyn IntegrationDirectory,
    tenant: &str,
    binding: &IntegrationBinding,
) -> CadenceResult<DataSourceKind> {
    if binding.integration_ids.is_empty() {
        return Err(CadenceError::InvalidConfiguration(format!(
            "no integration ids configured for {} section",
            binding.integration_type.as_str()
        )));
    }

    let mut resolved: Option<DataSourceKind> = None;
    for id in &binding.integration_ids {
        let integration = directory
            .get_integration(tenant, id)
            .await?
            .ok_or_else(|| CadenceError::InvalidConfiguration(format!("invalid integration id {id}")))?;

        let kind = DataSourceKind::from_application(binding.integration_type, &integration.application)?;
        match resolved {
            Some(prev) if prev != kind => {
                return Err(CadenceError::InvalidConfiguration(format!(
                    "integration ids {:?} mix {prev} and {kind} sources",
                    binding.integration_ids
                )))
            }
            _ => resolved = Some(kind),
        }
    }

    resolved.ok_or_else(|| CadenceError::Internal("integration resolution produced no kind".into()))
}

/// Build the typed filter for one profile definition.
///
/// Precedence, low to high: request filter, profile filter, CI/CD job flags,
/// job-run parameters. Only the active calculation field keeps a range.
pub fn normalize(
    request: &MetricRequest,
    binding: &IntegrationBinding,
    definition: &DeploymentDefinition,
    kind: DataSourceKind,
) -> CadenceResult<NormalizedFilter> {
    let field = definition.calculation_field;
    if field.source_kind() != kind {
        return Err(CadenceError::InvalidConfiguration(format!(
            "calculation field {field} does not apply to {kind} integrations"
        )));
    }
    let scm_route = match kind {
        DataSourceKind::Scm => Some(scm_route(definition)?),
        _ => None,
    };

    let base = with_time_range(&request.filter, field);
    let mut merged = merge_filters(&base, &definition.filter);
    merged = with_ci_cd_flags(merged, definition.is_ci_job, definition.is_cd_job);

    if let Some(event) = &definition.event {
        if kind == DataSourceKind::CiCd && !event.values.is_empty() {
            let mut job_ids = FilterMap::new();
            job_ids.insert(
                "cicd_job_ids".to_owned(),
                Value::Array(event.values.iter().cloned().map(Value::String).collect()),
            );
            merged = merge_filters(&merged, &job_ids);
        }
        merged = with_job_run_params(merged, &event.params)?;
    }

    let excludes = extract_excludes(&mut merged, kind)?;
    let partial_columns = match (kind, scm_route) {
        (DataSourceKind::Scm, Some(DeploymentRoute::Commit)) => SCM_COMMIT_PARTIAL_MATCH_COLUMNS,
        (DataSourceKind::Scm, _) => SCM_PR_PARTIAL_MATCH_COLUMNS,
        (DataSourceKind::CiCd, _) => CICD_PARTIAL_MATCH_COLUMNS,
        (DataSourceKind::JiraIm, _) => JIRA_PARTIAL_MATCH_COLUMNS,
        (DataSourceKind::AdoIm, _) => WORKITEM_PARTIAL_MATCH_COLUMNS,
    };
    let partial_match = extract_partial_match(&mut merged, kind, partial_columns)?;

    let common = FilterCommon {
        calculation_field: field,
        integration_ids: binding.integration_ids.clone(),
        excludes,
        partial_match,
    };

    let filter = match (kind, scm_route) {
        (DataSourceKind::Scm, Some(route)) => NormalizedFilter::Scm(ScmFilter::build(
            &merged,
            common,
            route,
            definition.deployment_criteria,
            definition.scm_filters.clone(),
        )?),
        (DataSourceKind::Scm, None) => {
            return Err(CadenceError::Internal("scm route unresolved".into()));
        }
        (DataSourceKind::CiCd, _) => {
            NormalizedFilter::CiCd(CiCdFilter::build(&merged, common, cicd_stack(request)?)?)
        }
        (DataSourceKind::JiraIm, _) => NormalizedFilter::Jira(JiraFilter::build(&merged, common)?),
        (DataSourceKind::AdoIm, _) => NormalizedFilter::WorkItem(WorkItemFilter::build(&merged, common)?),
    };

    tracing::debug!(
        kind = %kind,
        calculation_field = %field,
        excludes = filter.common().excludes.len(),
        "normalized filter"
    );
    Ok(filter)
}

/// Copy a generic `time_range` onto the calculation field's key unless that
/// key is already given.
fn with_time_range(filter: &FilterMap, field: CalculationField) -> FilterMap {
    let mut out = filter.clone();
    if let Some(range) = out.remove(TIME_RANGE_KEY) {
        if !out.contains_key(field.as_str()) {
            out.insert(field.as_str().to_owned(), range);
        }
    }
    out
}

fn scm_route(definition: &DeploymentDefinition) -> CadenceResult<DeploymentRoute> {
    let field = definition.calculation_field;
    let field_route = match field {
        CalculationField::PrMergedAt | CalculationField::PrClosedAt => DeploymentRoute::Pr,
        _ => DeploymentRoute::Commit,
    };

    let route = definition
        .deployment_route
        .or_else(|| definition.deployment_criteria.map(|c| c.route()))
        .unwrap_or(field_route);

    if let Some(criteria) = definition.deployment_criteria {
        if criteria.route() != route {
            return Err(CadenceError::InvalidConfiguration(format!(
                "deployment criteria {} does not match route {route}",
                criteria.as_str()
            )));
        }
    }
    if field_route != route {
        return Err(CadenceError::InvalidConfiguration(format!(
            "calculation field {field} does not match route {route}"
        )));
    }
    Ok(route)
}

fn cicd_stack(request: &MetricRequest) -> CadenceResult<Option<CiCdStack>> {
    request
        .stacks
        .first()
        .map(|s| s.parse::<CiCdStack>().map_err(CadenceError::InvalidRequest))
        .transpose()
}
