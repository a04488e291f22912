//! Filter merging and typed per-source filters.
//!
//! Request, profile and override filters arrive as loose JSON maps. They are
//! merged here with explicit precedence, then converted once into one of the
//! typed filters in [`typed`].

pub mod exclude;
pub mod time_range;
pub mod typed;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cadence_common::error::CadenceResult;

pub use exclude::{Exclusion, PartialMatch};
pub use time_range::{CalculationField, TimeRange};
pub use typed::{CiCdFilter, CiCdStack, JiraFilter, NormalizedFilter, ScmFilter, WorkItemFilter};

pub type FilterMap = serde_json::Map<String, Value>;

pub const PARAMETERS_KEY: &str = "parameters";

/// Merge two filter maps; `high` takes precedence.
///
/// Lists are unioned (low first, duplicates dropped), nested maps merge
/// recursively, anything else is overwritten by `high`.
pub fn merge_filters(low: &FilterMap, high: &FilterMap) -> FilterMap {
    let mut merged = low.clone();
    for (key, high_value) in high {
        let value = match merged.get(key) {
            Some(low_value) => merge_values(low_value, high_value),
            None => high_value.clone(),
        };
        merged.insert(key.clone(), value);
    }
    merged
}

fn merge_values(low: &Value, high: &Value) -> Value {
    match (low, high) {
        (Value::Array(l), Value::Array(h)) => {
            let mut out: Vec<Value> = Vec::with_capacity(l.len() + h.len());
            for v in l.iter().chain(h.iter()) {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Value::Array(out)
        }
        (Value::Object(l), Value::Object(h)) => Value::Object(merge_filters(l, h)),
        (_, h) => h.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunParameter {
    pub name: String,
    pub values: Vec<String>,
}

/// Merge `params` into the filter's `parameters` list.
///
/// Entries with a name already present get their values unioned; new names
/// are appended in key order. A `parameters` value that is not a list of
/// `{name, values}` entries is an `InvalidRequest`.
pub fn with_job_run_params(mut filter: FilterMap, params: &BTreeMap<String, Vec<String>>) -> CadenceResult<FilterMap> {
    if params.is_empty() {
        return Ok(filter);
    }

    let mut existing = typed::FilterReader(&filter).parameters()?;

    for (name, values) in params {
        match existing.iter_mut().find(|p| &p.name == name) {
            Some(param) => {
                for v in values {
                    if !param.values.contains(v) {
                        param.values.push(v.clone());
                    }
                }
            }
            None => existing.push(JobRunParameter {
                name: name.clone(),
                values: values.clone(),
            }),
        }
    }

    let list = existing
        .into_iter()
        .map(|p| serde_json::json!({ "name": p.name, "values": p.values }))
        .collect();
    filter.insert(PARAMETERS_KEY.to_owned(), Value::Array(list));
    Ok(filter)
}

/// Profile CI/CD job flags override the request when set.
pub fn with_ci_cd_flags(mut filter: FilterMap, is_ci_job: Option<bool>, is_cd_job: Option<bool>) -> FilterMap {
    if let Some(ci) = is_ci_job {
        filter.insert("is_ci_job".to_owned(), Value::Bool(ci));
    }
    if let Some(cd) = is_cd_job {
        filter.insert("is_cd_job".to_owned(), Value::Bool(cd));
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_common::error::CadenceError;
    use serde_json::json;

    fn map(v: Value) -> FilterMap {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    // ── merge_filters ─────────────────────────────────────────────

    #[test]
    fn scalar_collision_high_wins() {
        let low = map(json!({"across": "trend", "is_cd_job": false}));
        let high = map(json!({"is_cd_job": true}));
        let merged = merge_filters(&low, &high);
        assert_eq!(merged["is_cd_job"], json!(true));
        assert_eq!(merged["across"], json!("trend"));
    }

    #[test]
    fn lists_are_unioned_without_duplicates() {
        let low = map(json!({"job_statuses": ["SUCCESS", "FAILURE"]}));
        let high = map(json!({"job_statuses": ["FAILURE", "ABORTED"]}));
        let merged = merge_filters(&low, &high);
        assert_eq!(merged["job_statuses"], json!(["SUCCESS", "FAILURE", "ABORTED"]));
    }

    #[test]
    fn nested_maps_merge_recursively() {
        let low = map(json!({"exclude": {"projects": ["a"]}, "end_time": {"$gt": "10"}}));
        let high = map(json!({"exclude": {"projects": ["b"], "tags": ["x"]}, "end_time": {"$lt": "20"}}));
        let merged = merge_filters(&low, &high);
        assert_eq!(merged["exclude"], json!({"projects": ["a", "b"], "tags": ["x"]}));
        assert_eq!(merged["end_time"], json!({"$gt": "10", "$lt": "20"}));
    }

    #[test]
    fn list_over_scalar_is_overwritten() {
        let low = map(json!({"projects": "solo"}));
        let high = map(json!({"projects": ["a", "b"]}));
        assert_eq!(merge_filters(&low, &high)["projects"], json!(["a", "b"]));
    }

    #[test]
    fn merge_with_empty_maps() {
        let only = map(json!({"k": 1}));
        assert_eq!(merge_filters(&FilterMap::new(), &only), only);
        assert_eq!(merge_filters(&only, &FilterMap::new()), only);
    }

    // ── job run params ────────────────────────────────────────────

    #[test]
    fn params_are_added_as_name_values_list() {
        let mut params = BTreeMap::new();
        params.insert("env".to_owned(), vec!["prod".to_owned()]);
        let filter = with_job_run_params(FilterMap::new(), &params).unwrap();
        assert_eq!(filter[PARAMETERS_KEY], json!([{"name": "env", "values": ["prod"]}]));
    }

    #[test]
    fn params_merge_into_existing_entries() {
        let existing = map(json!({
            "parameters": [
                {"name": "env", "values": ["staging"]},
                {"name": "region", "values": ["eu"]}
            ]
        }));
        let mut params = BTreeMap::new();
        params.insert("env".to_owned(), vec!["prod".to_owned(), "staging".to_owned()]);
        params.insert("tier".to_owned(), vec!["gold".to_owned()]);

        let filter = with_job_run_params(existing, &params).unwrap();
        assert_eq!(
            filter[PARAMETERS_KEY],
            json!([
                {"name": "env", "values": ["staging", "prod"]},
                {"name": "region", "values": ["eu"]},
                {"name": "tier", "values": ["gold"]}
            ])
        );
    }

    #[test]
    fn empty_params_leave_filter_untouched() {
        let filter = map(json!({"a": 1}));
        assert_eq!(with_job_run_params(filter.clone(), &BTreeMap::new()).unwrap(), filter);
    }

    #[test]
    fn malformed_request_params_are_rejected() {
        let mut params = BTreeMap::new();
        params.insert("region".to_owned(), vec!["eu".to_owned()]);
        let err = with_job_run_params(map(json!({"parameters": "env=prod"})), &params).unwrap_err();
        assert!(matches!(err, CadenceError::InvalidRequest(_)));
    }

    // ── ci/cd flags ───────────────────────────────────────────────

    #[test]
    fn flags_only_set_when_present() {
        let base = map(json!({"is_ci_job": true}));
        let filter = with_ci_cd_flags(base, None, Some(true));
        assert_eq!(filter["is_ci_job"], json!(true));
        assert_eq!(filter["is_cd_job"], json!(true));

        let overridden = with_ci_cd_flags(filter, Some(false), None);
        assert_eq!(overridden["is_ci_job"], json!(false));
    }
}
