//! Lake Formation table grants.

use crate::aws::principal::resolve_principal;
use crate::backend::ProvisioningBackend;
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::identifiers::{parse_composite_catalog_id, validate_namespace, validate_table_name};
use crate::types::{
    GrantRequest, LfPermission, ReconciliationOutcome, ResourceKind, ResourceState,
    TableReference,
};

impl<B: ProvisioningBackend> super::service::ProvisioningService<B> {
    /// Grant `permissions` on one table to `principal_arn`.
    ///
    /// An empty permission list means `ALL`. With `with_grant_option` the
    /// principal may re-grant exactly the permissions it receives. Existing
    /// grants are not inspected; Lake Formation treats a repeated grant as a
    /// no-op. Assumed-role session ARNs are granted on the underlying role.
    pub async fn grant_table_permissions(
        &self,
        catalog_id: &str,
        namespace: &str,
        table: &str,
        principal_arn: &str,
        permissions: &[LfPermission],
        with_grant_option: bool,
    ) -> ProvisioningResult<ReconciliationOutcome> {
        parse_composite_catalog_id(catalog_id)?;
        validate_namespace(namespace)?;
        validate_table_name(table)?;
        let principal = resolve_principal(principal_arn).map_err(ProvisioningError::Configuration)?;

        let permissions = if permissions.is_empty() {
            &[LfPermission::All][..]
        } else {
            permissions
        };
        let table = TableReference {
            catalog_id: catalog_id.to_string(),
            namespace: namespace.to_string(),
            table: table.to_string(),
        };
        let request = GrantRequest::new(&principal.arn, table, permissions, with_grant_option)?;
        let identifier = format!("{} for {}", request.table(), principal.arn);

        let decision = self
            .reconciler
            .decide(ResourceKind::LakeFormationGrant, &ResourceState::Absent);
        log::info!(
            "Granting {:?} on {} to {}",
            request.permissions(),
            request.table(),
            principal.arn
        );
        self.backend
            .grant_permissions(&request)
            .await
            .map_err(|e| ProvisioningError::from_aws("grant permissions", &identifier, e))?;

        Ok(ReconciliationOutcome::new(
            ResourceKind::LakeFormationGrant,
            identifier,
            decision.action(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::memory::{BackendCall, InMemoryBackend};
    use crate::commands::ProvisioningService;
    use crate::config::ProvisioningConfig;
    use crate::error::ProvisioningError;
    use crate::types::{CatalogInfo, LfPermission, ReconcileAction, RegisteredResource};

    const ACCOUNT: &str = "111122223333";
    const CALLER: &str = "arn:aws:iam::111122223333:role/github-actions";
    const CATALOG_ID: &str = "111122223333:s3tablescatalog/financial-data";
    const RESOURCE_ARN: &str = "arn:aws:s3tables:us-east-1:111122223333:bucket/*";

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

    fn integrated() -> InMemoryBackend {
        InMemoryBackend::new(ACCOUNT, CALLER)
            .with_registration(RegisteredResource {
                resource_arn: RESOURCE_ARN.to_string(),
                role_arn: Some(
                    "arn:aws:iam::111122223333:role/S3TablesRoleForLakeFormation".to_string(),
                ),
                with_federation: true,
            })
            .with_catalog(CatalogInfo {
                name: "s3tablescatalog".to_string(),
                federated_identifier: Some(RESOURCE_ARN.to_string()),
                connection_name: Some("aws:s3tables".to_string()),
            })
            .with_table("financial-data", "treasury", "tbills")
    }

    #[tokio::test]
    async fn test_default_grant_is_all_with_grant_option() {
        let service = service(integrated());

        let outcome = service
            .grant_table_permissions(CATALOG_ID, "treasury", "tbills", CALLER, &[], true)
            .await
            .unwrap();
        assert_eq!(outcome.action, ReconcileAction::Updated);

        let grants = service.backend().grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].principal_arn(), CALLER);
        assert_eq!(grants[0].table().catalog_id, CATALOG_ID);
        assert_eq!(grants[0].permissions(), &[LfPermission::All]);
        assert_eq!(grants[0].permissions_with_grant_option(), &[LfPermission::All]);
    }

    #[tokio::test]
    async fn test_assumed_role_session_granted_on_role() {
        let service = service(integrated());

        service
            .grant_table_permissions(
                CATALOG_ID,
                "treasury",
                "tbills",
                "arn:aws:sts::111122223333:assumed-role/github-actions/run-42",
                &[LfPermission::Select],
                false,
            )
            .await
            .unwrap();

        let grants = service.backend().grants();
        assert_eq!(grants[0].principal_arn(), CALLER);
        assert!(grants[0].permissions_with_grant_option().is_empty());
    }

    #[tokio::test]
    async fn test_grant_before_registration_is_not_found() {
        let service = service(
            InMemoryBackend::new(ACCOUNT, CALLER).with_table("financial-data", "treasury", "tbills"),
        );

        let err = service
            .grant_table_permissions(CATALOG_ID, "treasury", "tbills", CALLER, &[], true)
            .await
            .unwrap_err();
        match err {
            ProvisioningError::NotFound { step, resource, .. } => {
                assert_eq!(step, "grant permissions");
                assert!(resource.contains(CATALOG_ID));
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_inputs_rejected_before_any_call() {
        let service = service(integrated());

        let bad_catalog = service
            .grant_table_permissions("s3tablescatalog", "treasury", "tbills", CALLER, &[], true)
            .await
            .unwrap_err();
        let bad_principal = service
            .grant_table_permissions(
                CATALOG_ID,
                "treasury",
                "tbills",
                "arn:aws:s3:::financial-data",
                &[],
                true,
            )
            .await
            .unwrap_err();
        let bad_namespace = service
            .grant_table_permissions(CATALOG_ID, "Treasury-Data", "tbills", CALLER, &[], true)
            .await
            .unwrap_err();

        assert!(bad_catalog.is_configuration());
        assert!(bad_principal.is_configuration());
        assert!(bad_namespace.is_configuration());
        assert!(service.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_grant_issues_call_each_time() {
        let service = service(integrated());
        for _ in 0..2 {
            service
                .grant_table_permissions(CATALOG_ID, "treasury", "tbills", CALLER, &[], true)
                .await
                .unwrap();
        }
        let grants = service
            .backend()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::GrantPermissions(_)))
            .count();
        assert_eq!(grants, 2);
    }
}
