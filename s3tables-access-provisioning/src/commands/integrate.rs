//! End-to-end integration of a table bucket with Lake Formation.
//!
//! Steps run strictly in order: credential check, service role, managed
//! policy attachment, resource registration, federated catalog. The first
//! failure aborts the run; whatever was applied before it stays applied.

use crate::backend::ProvisioningBackend;
use crate::error::ProvisioningResult;
use crate::types::{
    FederatedCatalogSpec, PlannedStep, ReconciliationOutcome, ResourceKind, ResourceState,
};

impl<B: ProvisioningBackend> super::service::ProvisioningService<B> {
    /// Run the full integration. `on_step` sees each outcome as soon as the
    /// step completes, so progress is visible even when a later step fails.
    pub async fn integrate(
        &self,
        mut on_step: impl FnMut(&ReconciliationOutcome),
    ) -> ProvisioningResult<Vec<ReconciliationOutcome>> {
        self.preflight().await?;

        let config = &self.config;
        let mut outcomes = Vec::with_capacity(4);
        let mut record = |outcome: ReconciliationOutcome| {
            on_step(&outcome);
            outcomes.push(outcome);
        };

        let role = self
            .ensure_service_role(&config.role_name, &config.trust_policy)
            .await?;
        record(role.role);
        record(role.policy_attachment);

        let resource_arn = config.resource_arn();
        record(
            self.register_resource(&resource_arn, &role.arn, true, true)
                .await?,
        );
        record(
            self.ensure_federated_catalog(&config.catalog_name, &resource_arn)
                .await?,
        );

        log::info!(
            "Table bucket {} is reachable through catalog {}",
            config.table_bucket,
            config.catalog_id()
        );
        Ok(outcomes)
    }

    /// Inspect live state and report what [`integrate`](Self::integrate)
    /// would do, without mutating anything.
    pub async fn plan_integration(&self) -> ProvisioningResult<Vec<PlannedStep>> {
        self.preflight().await?;

        let config = &self.config;
        let inspector = self.inspector();
        let resource_arn = config.resource_arn();
        let catalog = FederatedCatalogSpec::s3tables(&config.catalog_name, &resource_arn);

        let (role_state, _) = inspector
            .inspect_role(&config.role_name, &config.account_id)
            .await?;
        let registration_state = inspector
            .inspect_registration(&resource_arn, &config.role_arn())
            .await?;
        let catalog_state = inspector.inspect_catalog(&catalog).await?;

        let steps = [
            (ResourceKind::IamRole, config.role_name.clone(), role_state),
            (
                ResourceKind::ManagedPolicyAttachment,
                format!("{} on {}", config.managed_policy_arn, config.role_name),
                ResourceState::Absent,
            ),
            (
                ResourceKind::LakeFormationRegistration,
                resource_arn,
                registration_state,
            ),
            (ResourceKind::GlueCatalog, config.catalog_name.clone(), catalog_state),
        ];

        Ok(steps
            .into_iter()
            .map(|(kind, identifier, state)| {
                let planned = self.reconciler.decide(kind, &state).action();
                PlannedStep {
                    kind,
                    identifier,
                    state,
                    planned,
                }
            })
            .collect())
    }
}
