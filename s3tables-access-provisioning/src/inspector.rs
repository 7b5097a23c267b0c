//! Live-state inspection.
//!
//! A lookup that reports "not found" becomes [`ResourceState::Absent`]; any
//! other failure, including authorization and network errors, propagates.

use crate::aws::{AwsError, AwsResult};
use crate::backend::ProvisioningBackend;
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::policy::trust::{parse_trust_policy, validate_trust_policy};
use crate::types::{CatalogInfo, FederatedCatalogSpec, RegisteredResource, ResourceState, RoleInfo};

pub struct StateInspector<'a, B: ProvisioningBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: ProvisioningBackend + ?Sized> StateInspector<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Role state plus the observed role, when present. Drift means the
    /// trust policy no longer lets Lake Formation in from `account_id`.
    pub async fn inspect_role(
        &self,
        role_name: &str,
        account_id: &str,
    ) -> ProvisioningResult<(ResourceState, Option<RoleInfo>)> {
        let lookup = self.backend.get_role(role_name).await;
        let Some(role) = absent_if_not_found(lookup)
            .map_err(|e| ProvisioningError::from_aws("inspect IAM role", role_name, e))?
        else {
            return Ok((ResourceState::Absent, None));
        };

        let drift = match role.trust_policy_json.as_deref() {
            None => None,
            Some(json) => parse_trust_policy(json)
                .and_then(|doc| validate_trust_policy(&doc, account_id, &role.arn))
                .err()
                .map(|e| e.to_string()),
        };

        let state = match drift {
            Some(drift) => ResourceState::PresentWithDrift(drift),
            None => ResourceState::Present,
        };
        Ok((state, Some(role)))
    }

    /// Presence is an exact ARN match over the full registration listing.
    pub async fn inspect_registration(
        &self,
        resource_arn: &str,
        role_arn: &str,
    ) -> ProvisioningResult<ResourceState> {
        let registrations = self
            .backend
            .list_registered_resources()
            .await
            .map_err(|e| {
                ProvisioningError::from_aws("list Lake Formation registrations", resource_arn, e)
            })?;

        Ok(registration_state(&registrations, resource_arn, role_arn))
    }

    pub async fn inspect_catalog(
        &self,
        desired: &FederatedCatalogSpec,
    ) -> ProvisioningResult<ResourceState> {
        let lookup = self.backend.get_catalog(&desired.name).await;
        let catalog = absent_if_not_found(lookup)
            .map_err(|e| ProvisioningError::from_aws("inspect Glue catalog", &desired.name, e))?;

        Ok(match catalog {
            None => ResourceState::Absent,
            Some(catalog) => catalog_state(&catalog, desired),
        })
    }
}

fn absent_if_not_found<T>(lookup: AwsResult<T>) -> AwsResult<Option<T>> {
    match lookup {
        Ok(found) => Ok(Some(found)),
        Err(AwsError::NotFound(message)) => {
            log::debug!("treating lookup as absent: {message}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn registration_state(
    registrations: &[RegisteredResource],
    resource_arn: &str,
    role_arn: &str,
) -> ResourceState {
    let Some(existing) = registrations
        .iter()
        .find(|r| r.resource_arn == resource_arn)
    else {
        return ResourceState::Absent;
    };

    let mut drift = Vec::new();
    if !existing.with_federation {
        drift.push("registered without federation".to_string());
    }
    match existing.role_arn.as_deref() {
        Some(actual) if actual != role_arn => {
            drift.push(format!("registered with role {actual}"));
        }
        _ => {}
    }

    if drift.is_empty() {
        ResourceState::Present
    } else {
        ResourceState::PresentWithDrift(drift.join("; "))
    }
}

fn catalog_state(catalog: &CatalogInfo, desired: &FederatedCatalogSpec) -> ResourceState {
    let mut drift = Vec::new();
    if catalog.federated_identifier.as_deref() != Some(desired.federated_identifier.as_str()) {
        drift.push(format!(
            "federated identifier is {}",
            catalog.federated_identifier.as_deref().unwrap_or("unset")
        ));
    }
    if catalog.connection_name.as_deref() != Some(desired.connection_name.as_str()) {
        drift.push(format!(
            "connection is {}",
            catalog.connection_name.as_deref().unwrap_or("unset")
        ));
    }

    if drift.is_empty() {
        ResourceState::Present
    } else {
        ResourceState::PresentWithDrift(drift.join("; "))
    }
}
