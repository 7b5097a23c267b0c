//! AWS SDK integration: IAM, STS, Lake Formation and Glue client wrappers.

pub(crate) mod glue_client;
pub(crate) mod iam_client;
pub(crate) mod lakeformation_client;
pub mod principal;
pub(crate) mod sts;

use std::time::Duration;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

use crate::backend::ProvisioningBackend;
use crate::types::{
    CallerIdentity, CatalogInfo, FederatedCatalogSpec, GrantRequest, RegisteredResource,
    RegistrationRequest, RoleInfo,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AwsError {
    #[error("AWS configuration error: {0}")]
    ConfigError(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("network error: {0}")]
    Transient(String),
    #[error("AWS service error: {0}")]
    ServiceError(String),
    #[error("policy document error: {0}")]
    PolicyError(String),
}

pub type AwsResult<T> = Result<T, AwsError>;

const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchEntity",
    "NoSuchEntityException",
    "EntityNotFoundException",
    "ResourceNotFoundException",
];

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "InvalidClientTokenId",
    "ExpiredToken",
    "ExpiredTokenException",
];

/// Classify an SDK failure. The operator-facing text is kept verbatim.
pub(crate) fn classify_sdk_error<E, R>(context: &str, err: SdkError<E, R>) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = format!("{context}: {}", DisplayErrorContext(&err));
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => AwsError::Transient(detail),
        SdkError::ServiceError(service_err) => {
            let code = service_err.err().code().unwrap_or_default();
            if NOT_FOUND_CODES.contains(&code) {
                AwsError::NotFound(detail)
            } else if ACCESS_DENIED_CODES.contains(&code) {
                AwsError::AccessDenied(detail)
            } else {
                AwsError::ServiceError(detail)
            }
        }
        _ => AwsError::ServiceError(detail),
    }
}

/// Client context for one provisioning run: region, credentials profile and
/// per-call timeout are resolved once and shared by every service client.
#[derive(Debug, Clone)]
pub struct AwsContext {
    sdk_config: SdkConfig,
}

impl AwsContext {
    pub async fn load(
        region: &str,
        profile: Option<&str>,
        call_timeout: Option<Duration>,
    ) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }

        if let Some(timeout) = call_timeout {
            loader = loader.timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .build(),
            );
        }

        Self {
            sdk_config: loader.load().await,
        }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk_config
    }
}

/// Backend talking to the real AWS APIs.
pub struct AwsBackend {
    iam_client: aws_sdk_iam::Client,
    sts_client: aws_sdk_sts::Client,
    lakeformation_client: aws_sdk_lakeformation::Client,
    glue_client: aws_sdk_glue::Client,
}

impl AwsBackend {
    pub fn new(context: &AwsContext) -> Self {
        let config = context.sdk_config();
        Self {
            iam_client: aws_sdk_iam::Client::new(config),
            sts_client: aws_sdk_sts::Client::new(config),
            lakeformation_client: aws_sdk_lakeformation::Client::new(config),
            glue_client: aws_sdk_glue::Client::new(config),
        }
    }
}

#[async_trait]
impl ProvisioningBackend for AwsBackend {
    async fn caller_identity(&self) -> AwsResult<CallerIdentity> {
        sts::caller_identity(&self.sts_client).await
    }

    async fn get_role(&self, role_name: &str) -> AwsResult<RoleInfo> {
        iam_client::get_role(&self.iam_client, role_name).await
    }

    async fn create_role(&self, role_name: &str, trust_policy_json: &str) -> AwsResult<RoleInfo> {
        iam_client::create_role(&self.iam_client, role_name, trust_policy_json).await
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> AwsResult<()> {
        iam_client::attach_role_policy(&self.iam_client, role_name, policy_arn).await
    }

    async fn list_registered_resources(&self) -> AwsResult<Vec<RegisteredResource>> {
        lakeformation_client::list_resources(&self.lakeformation_client).await
    }

    async fn register_resource(&self, request: &RegistrationRequest) -> AwsResult<()> {
        lakeformation_client::register_resource(&self.lakeformation_client, request).await
    }

    async fn get_catalog(&self, catalog_name: &str) -> AwsResult<CatalogInfo> {
        glue_client::get_catalog(&self.glue_client, catalog_name).await
    }

    async fn create_catalog(&self, desired: &FederatedCatalogSpec) -> AwsResult<()> {
        glue_client::create_catalog(&self.glue_client, desired).await
    }

    async fn grant_permissions(&self, request: &GrantRequest) -> AwsResult<()> {
        lakeformation_client::grant_permissions(&self.lakeformation_client, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_glue::operation::get_catalog::GetCatalogError;
    use aws_sdk_iam::error::ErrorMetadata;
    use aws_sdk_iam::operation::get_role::GetRoleError;

    fn meta(code: &str, message: &str) -> ErrorMetadata {
        ErrorMetadata::builder().code(code).message(message).build()
    }

    #[test]
    fn test_missing_role_is_not_found() {
        let source = GetRoleError::NoSuchEntityException(
            aws_sdk_iam::types::error::NoSuchEntityException::builder()
                .message("The role with name S3TablesRoleForLakeFormation cannot be found.")
                .meta(meta(
                    "NoSuchEntity",
                    "The role with name S3TablesRoleForLakeFormation cannot be found.",
                ))
                .build(),
        );
        let err: SdkError<GetRoleError, ()> = SdkError::service_error(source, ());

        match classify_sdk_error("get IAM role S3TablesRoleForLakeFormation", err) {
            AwsError::NotFound(detail) => {
                assert!(detail.starts_with("get IAM role S3TablesRoleForLakeFormation: "));
                assert!(detail.contains("cannot be found"), "detail was: {detail}");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_glue_access_denied_is_access_denied() {
        let source = GetCatalogError::AccessDeniedException(
            aws_sdk_glue::types::error::AccessDeniedException::builder()
                .message("User is not authorized to perform: glue:GetCatalog")
                .meta(meta(
                    "AccessDeniedException",
                    "User is not authorized to perform: glue:GetCatalog",
                ))
                .build(),
        );
        let err: SdkError<GetCatalogError, ()> = SdkError::service_error(source, ());

        match classify_sdk_error("get Glue catalog s3tablescatalog", err) {
            AwsError::AccessDenied(detail) => {
                assert!(detail.contains("glue:GetCatalog"), "detail was: {detail}");
            }
            other => panic!("expected AccessDenied, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_is_transient() {
        let err: SdkError<GetRoleError, ()> = SdkError::timeout_error("operation timed out");

        assert!(matches!(
            classify_sdk_error("get IAM role S3TablesRoleForLakeFormation", err),
            AwsError::Transient(_)
        ));
    }

    #[test]
    fn test_unknown_code_is_service_error() {
        let source = GetRoleError::generic(meta("Throttling", "Rate exceeded"));
        let err: SdkError<GetRoleError, ()> = SdkError::service_error(source, ());

        match classify_sdk_error("get IAM role S3TablesRoleForLakeFormation", err) {
            AwsError::ServiceError(detail) => {
                assert!(detail.contains("Throttling"), "detail was: {detail}");
            }
            other => panic!("expected ServiceError, got {other:?}"),
        }
    }
}
