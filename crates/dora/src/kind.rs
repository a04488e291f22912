use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use cadence_common::error::{CadenceError, CadenceResult};

/// Integration type declared on a workflow-profile section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationType {
    #[serde(rename = "SCM")]
    Scm,
    #[serde(rename = "CICD")]
    CiCd,
    #[serde(rename = "IM")]
    Im,
}

impl IntegrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scm => "SCM",
            Self::CiCd => "CICD",
            Self::Im => "IM",
        }
    }
}

impl FromStr for IntegrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SCM" => Ok(Self::Scm),
            "CICD" => Ok(Self::CiCd),
            "IM" => Ok(Self::Im),
            other => Err(format!("unknown integration type: {other}")),
        }
    }
}

const SCM_APPLICATIONS: &[&str] = &[
    "github",
    "gitlab",
    "bitbucket",
    "bitbucket_server",
    "azure_devops",
    "helix",
    "gerrit",
];

const CICD_APPLICATIONS: &[&str] = &[
    "jenkins",
    "azure_devops",
    "gitlab",
    "github_actions",
    "harness",
    "circleci",
    "droneci",
];

/// The concrete data source a calculation runs against. Resolved once per
/// section and carried through to the matching calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    Scm,
    CiCd,
    JiraIm,
    AdoIm,
}

impl DataSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scm => "scm",
            Self::CiCd => "ci_cd",
            Self::JiraIm => "jira_im",
            Self::AdoIm => "ado_im",
        }
    }

    /// Map an integration's application string under the section's declared type.
    pub fn from_application(declared: IntegrationType, application: &str) -> CadenceResult<Self> {
        let app = application.trim().to_ascii_lowercase();
        let kind = match declared {
            IntegrationType::Scm if SCM_APPLICATIONS.contains(&app.as_str()) => Some(Self::Scm),
            IntegrationType::CiCd if CICD_APPLICATIONS.contains(&app.as_str()) => Some(Self::CiCd),
            IntegrationType::Im if app == "jira" => Some(Self::JiraIm),
            IntegrationType::Im if app == "azure_devops" => Some(Self::AdoIm),
            _ => None,
        };
        kind.ok_or_else(|| {
            CadenceError::UnsupportedIntegration(format!(
                "application '{application}' is not supported for {} integrations",
                declared.as_str()
            ))
        })
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azure_devops_resolves_by_declared_type() {
        assert_eq!(
            DataSourceKind::from_application(IntegrationType::Im, "azure_devops").unwrap(),
            DataSourceKind::AdoIm
        );
        assert_eq!(
            DataSourceKind::from_application(IntegrationType::CiCd, "azure_devops").unwrap(),
            DataSourceKind::CiCd
        );
        assert_eq!(
            DataSourceKind::from_application(IntegrationType::Scm, "azure_devops").unwrap(),
            DataSourceKind::Scm
        );
    }

    #[test]
    fn jira_under_cicd_is_unsupported() {
        let err = DataSourceKind::from_application(IntegrationType::CiCd, "jira").unwrap_err();
        assert!(matches!(err, CadenceError::UnsupportedIntegration(_)));
    }

    #[test]
    fn application_match_ignores_case() {
        assert_eq!(
            DataSourceKind::from_application(IntegrationType::Scm, "GitHub").unwrap(),
            DataSourceKind::Scm
        );
    }

    #[test]
    fn integration_type_parses_case_insensitively() {
        assert_eq!("cicd".parse::<IntegrationType>(), Ok(IntegrationType::CiCd));
        assert!("crm".parse::<IntegrationType>().is_err());
    }
}
