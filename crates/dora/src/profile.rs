use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::{CalculationField, FilterMap};
use crate::kind::IntegrationType;

/// Tenant-owned definition of what a deployment and a failed deployment are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowProfile {
    pub id: Uuid,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub deployment_frequency: DeploymentFrequency,
    pub change_failure_rate: ChangeFailureRate,
}

/// Integration type and ids a section draws its data from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationBinding {
    pub integration_type: IntegrationType,
    #[serde(default)]
    pub integration_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentFrequency {
    #[serde(flatten)]
    pub binding: IntegrationBinding,
    pub deployment: DeploymentDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeFailureRate {
    #[serde(flatten)]
    pub binding: IntegrationBinding,
    /// Report the failed count alone; no total, no ratio, no band.
    #[serde(default)]
    pub is_absolute: bool,
    pub failed_deployment: DeploymentDefinition,
    #[serde(default)]
    pub total_deployment: Option<DeploymentDefinition>,
}

/// Which profile definition a calculation or drill-down uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionTarget {
    DeploymentFrequency,
    FailedDeployment,
    TotalDeployment,
}

impl DefinitionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeploymentFrequency => "deployment_frequency",
            Self::FailedDeployment => "failed_deployment",
            Self::TotalDeployment => "total_deployment",
        }
    }
}

impl FromStr for DefinitionTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deployment_frequency" | "deployment_frequency_report" => Ok(Self::DeploymentFrequency),
            "failed_deployment" | "change_failure_rate" => Ok(Self::FailedDeployment),
            "total_deployment" => Ok(Self::TotalDeployment),
            other => Err(format!("unknown drill-down target: {other}")),
        }
    }
}

impl WorkflowProfile {
    /// Binding and definition for `target`, if the profile defines it.
    pub fn definition(&self, target: DefinitionTarget) -> Option<(&IntegrationBinding, &DeploymentDefinition)> {
        match target {
            DefinitionTarget::DeploymentFrequency => Some((
                &self.deployment_frequency.binding,
                &self.deployment_frequency.deployment,
            )),
            DefinitionTarget::FailedDeployment => Some((
                &self.change_failure_rate.binding,
                &self.change_failure_rate.failed_deployment,
            )),
            DefinitionTarget::TotalDeployment => self
                .change_failure_rate
                .total_deployment
                .as_ref()
                .map(|d| (&self.change_failure_rate.binding, d)),
        }
    }
}

/// One "what counts" rule inside a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentDefinition {
    #[serde(default)]
    pub filter: FilterMap,
    pub calculation_field: CalculationField,
    #[serde(default)]
    pub event: Option<EventSpec>,
    #[serde(default)]
    pub is_ci_job: Option<bool>,
    #[serde(default)]
    pub is_cd_job: Option<bool>,
    #[serde(default)]
    pub deployment_route: Option<DeploymentRoute>,
    #[serde(default)]
    pub deployment_criteria: Option<DeploymentCriteria>,
    /// SCM only: field -> operator (`$begins`, `$ends`, `$contains`) -> values.
    #[serde(default)]
    pub scm_filters: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl DeploymentDefinition {
    pub fn new(calculation_field: CalculationField) -> Self {
        Self {
            filter: FilterMap::new(),
            calculation_field,
            event: None,
            is_ci_job: None,
            is_cd_job: None,
            deployment_route: None,
            deployment_criteria: None,
            scm_filters: BTreeMap::new(),
        }
    }
}

/// Qualifying CI/CD jobs (`values` are job ids) plus run parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSpec {
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentRoute {
    Pr,
    Commit,
}

impl DeploymentRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pr => "pr",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for DeploymentRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentRoute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pr" => Ok(Self::Pr),
            "commit" => Ok(Self::Commit),
            other => Err(format!("unknown deployment route: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentCriteria {
    PrMerged,
    PrClosed,
    PrMergedClosed,
    CommitMergedToBranch,
    CommitWithTag,
    CommitMergedToBranchWithTag,
}

impl DeploymentCriteria {
    pub fn route(&self) -> DeploymentRoute {
        match self {
            Self::PrMerged | Self::PrClosed | Self::PrMergedClosed => DeploymentRoute::Pr,
            Self::CommitMergedToBranch | Self::CommitWithTag | Self::CommitMergedToBranchWithTag => {
                DeploymentRoute::Commit
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrMerged => "pr_merged",
            Self::PrClosed => "pr_closed",
            Self::PrMergedClosed => "pr_merged_closed",
            Self::CommitMergedToBranch => "commit_merged_to_branch",
            Self::CommitWithTag => "commit_with_tag",
            Self::CommitMergedToBranchWithTag => "commit_merged_to_branch_with_tag",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_deserializes_with_flattened_binding() {
        let profile: WorkflowProfile = serde_json::from_value(json!({
            "id": "7d1c7a4e-5d55-4c83-9d0e-7f1a6f1f3b11",
            "name": "Default",
            "updated_at": "2026-03-01T00:00:00Z",
            "deployment_frequency": {
                "integration_type": "CICD",
                "integration_ids": ["4"],
                "deployment": {
                    "calculation_field": "end_time",
                    "is_cd_job": true,
                    "event": {"values": ["job-1"], "params": {"env": ["prod"]}}
                }
            },
            "change_failure_rate": {
                "integration_type": "IM",
                "integration_ids": ["1"],
                "is_absolute": true,
                "failed_deployment": {"calculation_field": "issue_resolved_at"}
            }
        }))
        .unwrap();

        assert_eq!(profile.deployment_frequency.binding.integration_type, IntegrationType::CiCd);
        assert_eq!(profile.deployment_frequency.deployment.is_cd_job, Some(true));
        assert!(profile.change_failure_rate.is_absolute);
        assert!(profile.definition(DefinitionTarget::TotalDeployment).is_none());
    }

    #[test]
    fn criteria_maps_to_route() {
        assert_eq!(DeploymentCriteria::PrMergedClosed.route(), DeploymentRoute::Pr);
        assert_eq!(DeploymentCriteria::CommitWithTag.route(), DeploymentRoute::Commit);
    }

    #[test]
    fn target_accepts_widget_aliases() {
        assert_eq!(
            "deployment_frequency_report".parse::<DefinitionTarget>(),
            Ok(DefinitionTarget::DeploymentFrequency)
        );
        assert_eq!(
            "change_failure_rate".parse::<DefinitionTarget>(),
            Ok(DefinitionTarget::FailedDeployment)
        );
    }
}
