use serde::{Deserialize, Serialize};

use crate::filter::FilterMap;

/// Ad-hoc query coming from a widget. Lowest precedence when merged with
/// the workflow profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricRequest {
    #[serde(default)]
    pub filter: FilterMap,
    #[serde(default)]
    pub ou_ids: Vec<String>,
    #[serde(default)]
    pub stacks: Vec<String>,
    #[serde(default)]
    pub across: Option<String>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub sort: Vec<SortSpec>,
    #[serde(default)]
    pub disable_cache: bool,
}

impl MetricRequest {
    pub fn with_filter(filter: FilterMap) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn first_ou_id(&self) -> Option<&str> {
        self.ou_ids.iter().map(String::as_str).find(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub id: String,
    #[serde(default)]
    pub desc: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    DeploymentFrequency,
    ChangeFailureRate,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeploymentFrequency => "deployment_frequency",
            Self::ChangeFailureRate => "change_failure_rate",
        }
    }
}
