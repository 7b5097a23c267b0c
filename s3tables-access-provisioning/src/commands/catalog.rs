//! Lake Formation registration and the federated Glue catalog.

use crate::backend::ProvisioningBackend;
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::identifiers::validate_catalog_name;
use crate::reconciler::Decision;
use crate::types::{
    FederatedCatalogSpec, ReconciliationOutcome, RegistrationRequest, ResourceKind,
};

impl<B: ProvisioningBackend> super::service::ProvisioningService<B> {
    /// Register `resource_arn` with Lake Formation under `role_arn`, unless an
    /// exact registration for that ARN already exists.
    pub async fn register_resource(
        &self,
        resource_arn: &str,
        role_arn: &str,
        with_federation: bool,
        with_privileged_access: bool,
    ) -> ProvisioningResult<ReconciliationOutcome> {
        if !resource_arn.starts_with("arn:") || !role_arn.starts_with("arn:") {
            return Err(ProvisioningError::configuration(format!(
                "cannot register '{resource_arn}' with role '{role_arn}': both must be ARNs"
            )));
        }

        log::info!("Checking Lake Formation registration for {resource_arn}");
        let state = self
            .inspector()
            .inspect_registration(resource_arn, role_arn)
            .await?;
        let decision = self
            .reconciler
            .decide(ResourceKind::LakeFormationRegistration, &state);

        if decision == Decision::Create {
            let request = RegistrationRequest {
                resource_arn: resource_arn.to_string(),
                role_arn: role_arn.to_string(),
                with_federation,
                with_privileged_access,
            };
            self.backend
                .register_resource(&request)
                .await
                .map_err(|e| ProvisioningError::from_aws("register resource", resource_arn, e))?;
        }

        Ok(ReconciliationOutcome::new(
            ResourceKind::LakeFormationRegistration,
            resource_arn,
            decision.action(),
        ))
    }

    /// Create the S3 Tables federated catalog `catalog_name` if it does not
    /// exist. An existing catalog is never replaced.
    pub async fn ensure_federated_catalog(
        &self,
        catalog_name: &str,
        resource_arn: &str,
    ) -> ProvisioningResult<ReconciliationOutcome> {
        validate_catalog_name(catalog_name)?;
        let desired = FederatedCatalogSpec::s3tables(catalog_name, resource_arn);

        log::info!("Checking Glue catalog {catalog_name}");
        let state = self.inspector().inspect_catalog(&desired).await?;
        let decision = self.reconciler.decide(ResourceKind::GlueCatalog, &state);

        if decision == Decision::Create {
            log::debug!("CreateCatalog {desired:?}");
            self.backend
                .create_catalog(&desired)
                .await
                .map_err(|e| ProvisioningError::from_aws("create Glue catalog", catalog_name, e))?;
        }

        Ok(ReconciliationOutcome::new(
            ResourceKind::GlueCatalog,
            catalog_name,
            decision.action(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::aws::AwsError;
    use crate::backend::memory::{BackendCall, InMemoryBackend, Operation};
    use crate::commands::ProvisioningService;
    use crate::config::ProvisioningConfig;
    use crate::error::ProvisioningError;
    use crate::types::{CatalogInfo, ReconcileAction, RegisteredResource};

    const ACCOUNT: &str = "111122223333";
    const CALLER: &str = "arn:aws:iam::111122223333:role/github-actions";
    const RESOURCE_ARN: &str = "arn:aws:s3tables:us-east-1:111122223333:bucket/*";
    const ROLE_ARN: &str = "arn:aws:iam::111122223333:role/S3TablesRoleForLakeFormation";

    fn service(backend: InMemoryBackend) -> ProvisioningService<InMemoryBackend> {
        let config = ProvisioningConfig::builder()
            .account_id(ACCOUNT)
            .table_bucket("financial-data")
            .namespace("treasury")
            .table("tbills")
            .build()
            .unwrap();
        ProvisioningService::with_backend(backend, config)
    }

    #[tokio::test]
    async fn test_second_registration_is_a_no_op() {
        let service = service(InMemoryBackend::new(ACCOUNT, CALLER));

        let first = service
            .register_resource(RESOURCE_ARN, ROLE_ARN, true, true)
            .await
            .unwrap();
        let second = service
            .register_resource(RESOURCE_ARN, ROLE_ARN, true, true)
            .await
            .unwrap();

        assert_eq!(first.action, ReconcileAction::Created);
        assert_eq!(second.action, ReconcileAction::AlreadyExists);
        let registers = service
            .backend()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::RegisterResource(_)))
            .count();
        assert_eq!(registers, 1);
    }

    #[tokio::test]
    async fn test_existing_registration_with_other_role_is_left_alone() {
        let service = service(InMemoryBackend::new(ACCOUNT, CALLER).with_registration(
            RegisteredResource {
                resource_arn: RESOURCE_ARN.to_string(),
                role_arn: Some("arn:aws:iam::111122223333:role/Legacy".to_string()),
                with_federation: true,
            },
        ));

        let outcome = service
            .register_resource(RESOURCE_ARN, ROLE_ARN, true, true)
            .await
            .unwrap();
        assert_eq!(outcome.action, ReconcileAction::AlreadyExists);
        assert!(service.backend().mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_registration() {
        let service = service(InMemoryBackend::new(ACCOUNT, CALLER).fail_on(
            Operation::ListResources,
            AwsError::Transient("dispatch failure: connection reset".to_string()),
        ));

        let err = service
            .register_resource(RESOURCE_ARN, ROLE_ARN, true, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::TransientNetwork { .. }));
        assert!(service.backend().mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_created_once() {
        let service = service(InMemoryBackend::new(ACCOUNT, CALLER));

        let first = service
            .ensure_federated_catalog("s3tablescatalog", RESOURCE_ARN)
            .await
            .unwrap();
        let second = service
            .ensure_federated_catalog("s3tablescatalog", RESOURCE_ARN)
            .await
            .unwrap();

        assert_eq!(first.action, ReconcileAction::Created);
        assert_eq!(second.action, ReconcileAction::AlreadyExists);
        assert_eq!(
            service.backend().mutation_calls(),
            vec![BackendCall::CreateCatalog("s3tablescatalog".to_string())]
        );
    }

    #[tokio::test]
    async fn test_drifted_catalog_is_not_replaced() {
        let service = service(InMemoryBackend::new(ACCOUNT, CALLER).with_catalog(CatalogInfo {
            name: "s3tablescatalog".to_string(),
            federated_identifier: None,
            connection_name: None,
        }));

        let outcome = service
            .ensure_federated_catalog("s3tablescatalog", RESOURCE_ARN)
            .await
            .unwrap();
        assert_eq!(outcome.action, ReconcileAction::AlreadyExists);
        assert!(service.backend().mutation_calls().is_empty());
    }
}
