use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadenceError {
    /// Workflow profile is unusable as configured: unknown integration,
    /// inconsistent failed/total definitions, missing org unit.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unsupported integration: {0}")]
    UnsupportedIntegration(String),

    /// A query executor or other collaborator failed or timed out.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CadenceError {
    /// Errors caused by the caller's input or the tenant's profile. Never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::UnsupportedIntegration(_) | Self::InvalidRequest(_)
        )
    }
}

pub type CadenceResult<T> = Result<T, CadenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_errors_are_client_errors() {
        assert!(CadenceError::InvalidConfiguration("x".into()).is_client_error());
        assert!(CadenceError::UnsupportedIntegration("x".into()).is_client_error());
        assert!(CadenceError::InvalidRequest("x".into()).is_client_error());
    }

    #[test]
    fn upstream_errors_are_server_errors() {
        assert!(!CadenceError::UpstreamUnavailable("db down".into()).is_client_error());
        assert!(!CadenceError::Internal("boom".into()).is_client_error());
        assert!(!CadenceError::Config("bad".into()).is_client_error());
    }

    #[test]
    fn display_carries_message() {
        let err = CadenceError::InvalidConfiguration("profile Default".into());
        assert_eq!(err.to_string(), "invalid configuration: profile Default");
    }
}
