use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cadence_common::error::{CadenceError, CadenceResult};

use super::FilterMap;
use crate::kind::DataSourceKind;

pub const EXCLUDE_KEY: &str = "exclude";
pub const PARTIAL_MATCH_KEY: &str = "partial_match";

pub const SCM_EXCLUDE_FIELDS: &[&str] = &[
    "repo_ids",
    "projects",
    "creators",
    "committers",
    "authors",
    "reviewers",
    "assignees",
    "states",
    "labels",
    "source_branches",
    "target_branches",
    "commit_branches",
];

pub const CICD_EXCLUDE_FIELDS: &[&str] = &[
    "services",
    "environments",
    "infrastructures",
    "repositories",
    "branches",
    "deployment_types",
    "rollback",
    "tags",
    "triage_rule",
    "job_names",
    "job_normalized_full_names",
    "job_statuses",
    "instance_names",
    "projects",
    "types",
    "cicd_user_ids",
    "qualified_job_names",
    "stage_name",
    "step_name",
    "stage_status",
    "step_status",
];

pub const JIRA_EXCLUDE_FIELDS: &[&str] = &[
    "keys",
    "statuses",
    "status_categories",
    "priorities",
    "issue_types",
    "assignees",
    "reporters",
    "projects",
    "components",
    "labels",
    "fix_versions",
    "versions",
    "epics",
    "resolutions",
    "sprint_names",
];

pub const WORKITEM_EXCLUDE_FIELDS: &[&str] = &[
    "workitem_ids",
    "workitem_statuses",
    "workitem_status_categories",
    "workitem_priorities",
    "workitem_types",
    "workitem_assignees",
    "workitem_reporters",
    "workitem_projects",
    "workitem_components",
    "workitem_labels",
    "workitem_fix_versions",
    "workitem_versions",
    "workitem_epics",
    "workitem_sprint_full_names",
];

pub const SCM_PR_PARTIAL_MATCH_COLUMNS: &[&str] = &[
    "title",
    "source_branch",
    "target_branch",
    "creator",
    "project",
    "repo_id",
    "state",
    "labels",
    "assignees",
    "reviewers",
];

pub const SCM_COMMIT_PARTIAL_MATCH_COLUMNS: &[&str] =
    &["message", "repo_id", "project", "author", "committer", "commit_branch"];

pub const CICD_PARTIAL_MATCH_COLUMNS: &[&str] = &["job_normalized_full_name"];

pub const JIRA_PARTIAL_MATCH_COLUMNS: &[&str] = &[
    "key",
    "project",
    "summary",
    "assignee",
    "reporter",
    "epic",
    "status",
    "labels",
    "components",
    "fix_versions",
];

pub const WORKITEM_PARTIAL_MATCH_COLUMNS: &[&str] = &[
    "workitem_id",
    "project",
    "summary",
    "assignee",
    "reporter",
    "epic",
    "status",
    "labels",
];

pub fn exclude_fields(kind: DataSourceKind) -> &'static [&'static str] {
    match kind {
        DataSourceKind::Scm => SCM_EXCLUDE_FIELDS,
        DataSourceKind::CiCd => CICD_EXCLUDE_FIELDS,
        DataSourceKind::JiraIm => JIRA_EXCLUDE_FIELDS,
        DataSourceKind::AdoIm => WORKITEM_EXCLUDE_FIELDS,
    }
}

/// Values an excluded field must not take. Boolean columns such as
/// `rollback` exclude by flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Exclusion {
    Values(Vec<String>),
    Flag(bool),
}

impl Exclusion {
    fn from_value(key: &str, value: Value) -> CadenceResult<Option<Self>> {
        let invalid = || CadenceError::InvalidRequest(format!("invalid exclude value for {key}"));
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(Self::Flag(b))),
            Value::String(s) => Ok(Some(Self::Values(vec![s]))),
            Value::Number(n) => Ok(Some(Self::Values(vec![n.to_string()]))),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Bool(b) => Ok(b.to_string()),
                    _ => Err(invalid()),
                })
                .collect::<CadenceResult<Vec<_>>>()
                .map(|values| Some(Self::Values(values))),
            Value::Object(_) => Err(invalid()),
        }
    }
}

/// Substring operators on one partial-match column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialMatch {
    #[serde(rename = "$begins", default, skip_serializing_if = "Option::is_none")]
    pub begins: Option<String>,
    #[serde(rename = "$ends", default, skip_serializing_if = "Option::is_none")]
    pub ends: Option<String>,
    #[serde(rename = "$contains", default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(rename = "$regex", default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl PartialMatch {
    pub fn is_empty(&self) -> bool {
        self.begins.is_none() && self.ends.is_none() && self.contains.is_none() && self.regex.is_none()
    }
}

/// Pull the nested `exclude` map out of `filter`, keeping only keys the
/// source understands. Unknown keys are dropped with a warning; a known key
/// with a value that is not a scalar or a list of scalars is rejected.
pub fn extract_excludes(filter: &mut FilterMap, kind: DataSourceKind) -> CadenceResult<BTreeMap<String, Exclusion>> {
    let raw = match filter.remove(EXCLUDE_KEY) {
        Some(Value::Object(m)) => m,
        Some(Value::Null) | None => return Ok(BTreeMap::new()),
        Some(other) => {
            return Err(CadenceError::InvalidRequest(format!(
                "exclude filter must be an object, got {other}"
            )))
        }
    };

    let mut kept = BTreeMap::new();
    for (key, value) in retain_known(raw, exclude_fields(kind), kind, EXCLUDE_KEY) {
        if let Some(exclusion) = Exclusion::from_value(&key, value)? {
            kept.insert(key, exclusion);
        }
    }
    Ok(kept)
}

/// Pull `partial_match` out of `filter`, dropping unsupported columns and
/// columns without any operator.
pub fn extract_partial_match(
    filter: &mut FilterMap,
    kind: DataSourceKind,
    columns: &[&str],
) -> CadenceResult<BTreeMap<String, PartialMatch>> {
    let raw = match filter.remove(PARTIAL_MATCH_KEY) {
        Some(Value::Object(m)) => m,
        Some(Value::Null) | None => return Ok(BTreeMap::new()),
        Some(other) => {
            return Err(CadenceError::InvalidRequest(format!(
                "partial_match filter must be an object, got {other}"
            )))
        }
    };

    let mut kept = BTreeMap::new();
    for (key, value) in retain_known(raw, columns, kind, PARTIAL_MATCH_KEY) {
        let spec: PartialMatch = serde_json::from_value(value).map_err(|e| {
            CadenceError::InvalidRequest(format!("invalid partial match for {key}: {e}"))
        })?;
        if spec.is_empty() {
            tracing::warn!(kind = %kind, key = %key, "ignoring partial match without a supported operator");
            continue;
        }
        kept.insert(key, spec);
    }
    Ok(kept)
}

fn retain_known(raw: FilterMap, known: &[&str], kind: DataSourceKind, section: &str) -> FilterMap {
    let mut kept = FilterMap::new();
    for (key, value) in raw {
        if known.contains(&key.as_str()) {
            kept.insert(key, value);
        } else {
            tracing::warn!(kind = %kind, section, key = %key, "ignoring unsupported filter key");
        }
    }
    kept
}
