//! Remote-state seam for provisioning.
//!
//! The service only talks to AWS through [`ProvisioningBackend`], so the real
//! SDK-backed [`AwsBackend`](crate::AwsBackend) and the recording
//! [`InMemoryBackend`](memory::InMemoryBackend) are interchangeable.

pub mod memory;

use async_trait::async_trait;

use crate::aws::AwsResult;
use crate::types::{
    CallerIdentity, CatalogInfo, FederatedCatalogSpec, GrantRequest, RegisteredResource,
    RegistrationRequest, RoleInfo,
};

/// Lookups report a missing resource as [`AwsError::NotFound`](crate::AwsError::NotFound);
/// the state inspector turns that into an absent state.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// STS caller identity for the pre-flight credential check.
    async fn caller_identity(&self) -> AwsResult<CallerIdentity>;

    async fn get_role(&self, role_name: &str) -> AwsResult<RoleInfo>;

    async fn create_role(&self, role_name: &str, trust_policy_json: &str) -> AwsResult<RoleInfo>;

    /// Attaching an already attached policy succeeds.
    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> AwsResult<()>;

    async fn list_registered_resources(&self) -> AwsResult<Vec<RegisteredResource>>;

    async fn register_resource(&self, request: &RegistrationRequest) -> AwsResult<()>;

    async fn get_catalog(&self, catalog_name: &str) -> AwsResult<CatalogInfo>;

    async fn create_catalog(&self, desired: &FederatedCatalogSpec) -> AwsResult<()>;

    /// Repeated identical grants are merged remotely and succeed.
    async fn grant_permissions(&self, request: &GrantRequest) -> AwsResult<()>;
}
