//! Error taxonomy for provisioning runs.

use thiserror::Error;

use crate::aws::AwsError;

/// Every error aborts the run. Remote messages are carried verbatim so the
/// operator sees exactly what the API returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    /// Bad or missing arguments, malformed identifiers or policy documents.
    /// Raised before any remote call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The pre-flight credential check failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("{step} failed for {resource}: not authorized: {message}")]
    Authorization {
        step: &'static str,
        resource: String,
        message: String,
    },

    #[error("{step} failed for {resource}: resource not found: {message}")]
    NotFound {
        step: &'static str,
        resource: String,
        message: String,
    },

    /// Not retried here; callers needing retry wrap the invocation.
    #[error("{step} failed for {resource}: network error: {message}")]
    TransientNetwork {
        step: &'static str,
        resource: String,
        message: String,
    },

    #[error("{step} failed for {resource}: {message}")]
    Remote {
        step: &'static str,
        resource: String,
        message: String,
    },
}

pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

impl ProvisioningError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ProvisioningError::Configuration(message.into())
    }

    /// Attach the failing step and resource to a backend error.
    pub fn from_aws(step: &'static str, resource: impl Into<String>, err: AwsError) -> Self {
        let resource = resource.into();
        match err {
            AwsError::ConfigError(message) | AwsError::PolicyError(message) => {
                ProvisioningError::Configuration(format!("{step} ({resource}): {message}"))
            }
            AwsError::NotFound(message) => ProvisioningError::NotFound {
                step,
                resource,
                message,
            },
            AwsError::AccessDenied(message) => ProvisioningError::Authorization {
                step,
                resource,
                message,
            },
            AwsError::Transient(message) => ProvisioningError::TransientNetwork {
                step,
                resource,
                message,
            },
            AwsError::ServiceError(message) => ProvisioningError::Remote {
                step,
                resource,
                message,
            },
        }
    }

    /// Whether the error was raised before touching the network.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProvisioningError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_aws_keeps_step_and_resource() {
        let err = ProvisioningError::from_aws(
            "register resource",
            "arn:aws:s3tables:us-east-1:111122223333:bucket/*",
            AwsError::AccessDenied("User is not authorized".to_string()),
        );
        let text = err.to_string();
        assert!(text.contains("register resource"));
        assert!(text.contains("arn:aws:s3tables:us-east-1:111122223333:bucket/*"));
        assert!(text.contains("User is not authorized"));
        assert!(matches!(err, ProvisioningError::Authorization { .. }));
    }

    #[test]
    fn test_not_found_maps_to_not_found() {
        let err = ProvisioningError::from_aws(
            "grant table permissions",
            "tbills",
            AwsError::NotFound("EntityNotFoundException".to_string()),
        );
        assert!(matches!(err, ProvisioningError::NotFound { .. }));
        assert!(!err.is_configuration());
    }
}
