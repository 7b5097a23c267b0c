//! Service role provisioning.

use crate::backend::ProvisioningBackend;
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::identifiers::{role_arn, validate_managed_policy_arn, validate_role_name};
use crate::policy::document::PolicyDocument;
use crate::policy::trust::validate_trust_policy;
use crate::reconciler::Decision;
use crate::types::{ReconciliationOutcome, ResourceKind, ResourceState, RoleInfo};

/// Result of [`ProvisioningService::ensure_service_role`](super::ProvisioningService::ensure_service_role).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRole {
    pub arn: String,
    pub role: ReconciliationOutcome,
    pub policy_attachment: ReconciliationOutcome,
}

impl<B: ProvisioningBackend> super::service::ProvisioningService<B> {
    /// Ensure the Lake Formation service role exists and carries the managed
    /// policy. The role is created only when absent; the policy is attached on
    /// every call so a run interrupted between the two steps heals itself.
    pub async fn ensure_service_role(
        &self,
        role_name: &str,
        trust_policy: &PolicyDocument,
    ) -> ProvisioningResult<ServiceRole> {
        let account_id = &self.config.account_id;
        let policy_arn = &self.config.managed_policy_arn;

        validate_role_name(role_name)?;
        validate_managed_policy_arn(policy_arn)?;
        validate_trust_policy(trust_policy, account_id, &role_arn(account_id, role_name))?;
        let trust_policy_json = serde_json::to_string(trust_policy).map_err(|e| {
            ProvisioningError::configuration(format!("cannot serialize trust policy: {e}"))
        })?;

        log::info!("Checking IAM role {role_name}");
        let (state, existing) = self.inspector().inspect_role(role_name, account_id).await?;
        let decision = self.reconciler.decide(ResourceKind::IamRole, &state);

        let role = match role_to_reuse(decision, existing, role_name)? {
            Some(role) => role,
            None => {
                log::debug!("CreateRole {role_name} trust policy: {trust_policy_json}");
                self.backend
                    .create_role(role_name, &trust_policy_json)
                    .await
                    .map_err(|e| ProvisioningError::from_aws("create IAM role", role_name, e))?
            }
        };
        let role_outcome =
            ReconciliationOutcome::new(ResourceKind::IamRole, role_name, decision.action());

        let attachment = self
            .reconciler
            .decide(ResourceKind::ManagedPolicyAttachment, &ResourceState::Present);
        let attachment_id = format!("{policy_arn} on {role_name}");
        self.backend
            .attach_role_policy(role_name, policy_arn)
            .await
            .map_err(|e| ProvisioningError::from_aws("attach managed policy", &attachment_id, e))?;

        Ok(ServiceRole {
            arn: role.arn,
            role: role_outcome,
            policy_attachment: ReconciliationOutcome::new(
                ResourceKind::ManagedPolicyAttachment,
                attachment_id,
                attachment.action(),
            ),
        })
    }
}

/// The existing role when the decision keeps it, `None` when it must be
/// created. Keeping a role the inspector did not return is an error rather
/// than a silent create.
fn role_to_reuse(
    decision: Decision,
    existing: Option<RoleInfo>,
    role_name: &str,
) -> ProvisioningResult<Option<RoleInfo>> {
    match (decision, existing) {
        (Decision::Create, _) => Ok(None),
        (_, Some(role)) => Ok(Some(role)),
        (_, None) => Err(ProvisioningError::Remote {
            step: "inspect IAM role",
            resource: role_name.to_string(),
            message: "role reported present but not returned".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::aws::AwsError;
    use crate::backend::memory::{BackendCall, InMemoryBackend, Operation};
    use crate::commands::ProvisioningService;
    use crate::config::ProvisioningConfig;
    use crate::error::ProvisioningError;
    use crate::policy::trust::lake_formation_trust_policy;
    use crate::reconciler::Decision;
    use crate::types::{ReconcileAction, RoleInfo};

    use super::role_to_reuse;

    const ACCOUNT: &str = "111122223333";
    const ROLE: &str = "S3TablesRoleForLakeFormation";
    const POLICY: &str = "arn:aws:iam::aws:policy/AmazonS3TablesFullAccess";

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
    async fn test_ensure_service_role_twice() {
        let service = service(InMemoryBackend::new(
            ACCOUNT,
            "arn:aws:iam::111122223333:role/github-actions",
        ));
        let trust = lake_formation_trust_policy(ACCOUNT);

        let first = service.ensure_service_role(ROLE, &trust).await.unwrap();
        let second = service.ensure_service_role(ROLE, &trust).await.unwrap();

        assert_eq!(first.arn, "arn:aws:iam::111122223333:role/S3TablesRoleForLakeFormation");
        assert_eq!(first.arn, second.arn);
        assert_eq!(first.role.action, ReconcileAction::Created);
        assert_eq!(second.role.action, ReconcileAction::AlreadyExists);
        assert_eq!(second.policy_attachment.action, ReconcileAction::Updated);

        let calls = service.backend().calls();
        let creates = calls
            .iter()
            .filter(|c| matches!(c, BackendCall::CreateRole(_)))
            .count();
        let attaches = calls
            .iter()
            .filter(|c| matches!(c, BackendCall::AttachRolePolicy { .. }))
            .count();
        assert_eq!(creates, 1);
        assert_eq!(attaches, 2);
        assert_eq!(service.backend().attached_policies(ROLE), vec![POLICY.to_string()]);
    }

    #[tokio::test]
    async fn test_mismatched_trust_policy_fails_before_any_call() {
        let service = service(InMemoryBackend::new(
            ACCOUNT,
            "arn:aws:iam::111122223333:role/github-actions",
        ));
        let trust = lake_formation_trust_policy("444455556666");

        let err = service.ensure_service_role(ROLE, &trust).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(service.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_denied_names_the_role() {
        let service = service(
            InMemoryBackend::new(ACCOUNT, "arn:aws:iam::111122223333:role/github-actions").fail_on(
                Operation::CreateRole,
                AwsError::AccessDenied("iam:CreateRole not allowed".to_string()),
            ),
        );
        let trust = lake_formation_trust_policy(ACCOUNT);

        let err = service.ensure_service_role(ROLE, &trust).await.unwrap_err();
        match &err {
            ProvisioningError::Authorization { step, resource, message } => {
                assert_eq!(*step, "create IAM role");
                assert_eq!(resource, ROLE);
                assert!(message.contains("iam:CreateRole not allowed"));
            }
            other => panic!("expected authorization error, got {other:?}"),
        }
        let attaches = service
            .backend()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::AttachRolePolicy { .. }))
            .count();
        assert_eq!(attaches, 0);
    }

    #[test]
    fn test_kept_role_must_have_been_returned() {
        let role = RoleInfo {
            name: ROLE.to_string(),
            arn: "arn:aws:iam::111122223333:role/S3TablesRoleForLakeFormation".to_string(),
            trust_policy_json: None,
        };

        assert_eq!(role_to_reuse(Decision::Create, None, ROLE).unwrap(), None);
        assert_eq!(
            role_to_reuse(Decision::Skip, Some(role.clone()), ROLE).unwrap(),
            Some(role)
        );
        match role_to_reuse(Decision::Skip, None, ROLE).unwrap_err() {
            ProvisioningError::Remote { step, resource, .. } => {
                assert_eq!(step, "inspect IAM role");
                assert_eq!(resource, ROLE);
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }
}
