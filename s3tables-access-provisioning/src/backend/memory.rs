//! In-memory backend for local dry runs and tests.
//!
//! Holds the account's IAM roles, Lake Formation registrations, Glue catalogs,
//! S3 Tables tables and grants, and records every call in order so callers can
//! assert on exactly which remote operations a run performed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::aws::{AwsError, AwsResult};
use crate::backend::ProvisioningBackend;
use crate::identifiers::{parse_composite_catalog_id, role_arn};
use crate::types::{
    CallerIdentity, CatalogInfo, FederatedCatalogSpec, GrantRequest, RegisteredResource,
    RegistrationRequest, RoleInfo,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CallerIdentity,
    GetRole(String),
    CreateRole(String),
    AttachRolePolicy { role_name: String, policy_arn: String },
    ListResources,
    RegisterResource(String),
    GetCatalog(String),
    CreateCatalog(String),
    GrantPermissions(GrantRequest),
}

impl BackendCall {
    /// Whether the call changes remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            BackendCall::CallerIdentity
                | BackendCall::GetRole(_)
                | BackendCall::ListResources
                | BackendCall::GetCatalog(_)
        )
    }

    fn operation(&self) -> Operation {
        match self {
            BackendCall::CallerIdentity => Operation::CallerIdentity,
            BackendCall::GetRole(_) => Operation::GetRole,
            BackendCall::CreateRole(_) => Operation::CreateRole,
            BackendCall::AttachRolePolicy { .. } => Operation::AttachRolePolicy,
            BackendCall::ListResources => Operation::ListResources,
            BackendCall::RegisterResource(_) => Operation::RegisterResource,
            BackendCall::GetCatalog(_) => Operation::GetCatalog,
            BackendCall::CreateCatalog(_) => Operation::CreateCatalog,
            BackendCall::GrantPermissions(_) => Operation::GrantPermissions,
        }
    }
}

/// Backend operation, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CallerIdentity,
    GetRole,
    CreateRole,
    AttachRolePolicy,
    ListResources,
    RegisterResource,
    GetCatalog,
    CreateCatalog,
    GrantPermissions,
}

#[derive(Debug, Clone)]
struct StoredRole {
    info: RoleInfo,
    attached_policies: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct State {
    roles: BTreeMap<String, StoredRole>,
    registrations: Vec<RegisteredResource>,
    catalogs: BTreeMap<String, CatalogInfo>,
    // (table bucket, namespace, table)
    tables: BTreeSet<(String, String, String)>,
    grants: Vec<GrantRequest>,
    failures: HashMap<Operation, AwsError>,
    calls: Vec<BackendCall>,
}

pub struct InMemoryBackend {
    identity: CallerIdentity,
    state: Mutex<State>,
}

impl InMemoryBackend {
    /// Empty account whose caller is `caller_arn`.
    pub fn new(account_id: &str, caller_arn: &str) -> Self {
        Self {
            identity: CallerIdentity {
                account_id: account_id.to_string(),
                arn: caller_arn.to_string(),
            },
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_role(self, role_name: &str, trust_policy_json: &str) -> Self {
        {
            let mut state = self.lock();
            let info = RoleInfo {
                name: role_name.to_string(),
                arn: role_arn(&self.identity.account_id, role_name),
                trust_policy_json: Some(trust_policy_json.to_string()),
            };
            state.roles.insert(
                role_name.to_string(),
                StoredRole {
                    info,
                    attached_policies: BTreeSet::new(),
                },
            );
        }
        self
    }

    pub fn with_registration(self, registration: RegisteredResource) -> Self {
        self.lock().registrations.push(registration);
        self
    }

    pub fn with_catalog(self, catalog: CatalogInfo) -> Self {
        self.lock().catalogs.insert(catalog.name.clone(), catalog);
        self
    }

    /// A table that exists in a table bucket, independent of catalog wiring.
    pub fn with_table(self, table_bucket: &str, namespace: &str, table: &str) -> Self {
        self.lock().tables.insert((
            table_bucket.to_string(),
            namespace.to_string(),
            table.to_string(),
        ));
        self
    }

    /// Make every subsequent call of `operation` fail with `error`.
    pub fn fail_on(self, operation: Operation, error: AwsError) -> Self {
        self.lock().failures.insert(operation, error);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<BackendCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn grants(&self) -> Vec<GrantRequest> {
        self.lock().grants.clone()
    }

    pub fn attached_policies(&self, role_name: &str) -> Vec<String> {
        self.lock()
            .roles
            .get(role_name)
            .map(|role| role.attached_policies.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and return the injected failure, if any.
    fn record(&self, call: BackendCall) -> AwsResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        let operation = call.operation();
        state.calls.push(call);
        if let Some(error) = state.failures.get(&operation).cloned() {
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl ProvisioningBackend for InMemoryBackend {
    async fn caller_identity(&self) -> AwsResult<CallerIdentity> {
        let _state = self.record(BackendCall::CallerIdentity)?;
        Ok(self.identity.clone())
    }

    async fn get_role(&self, role_name: &str) -> AwsResult<RoleInfo> {
        let state = self.record(BackendCall::GetRole(role_name.to_string()))?;
        state
            .roles
            .get(role_name)
            .map(|role| role.info.clone())
            .ok_or_else(|| AwsError::NotFound(format!("The role with name {role_name} cannot be found.")))
    }

    async fn create_role(&self, role_name: &str, trust_policy_json: &str) -> AwsResult<RoleInfo> {
        let mut state = self.record(BackendCall::CreateRole(role_name.to_string()))?;
        if state.roles.contains_key(role_name) {
            return Err(AwsError::ServiceError(format!(
                "EntityAlreadyExists: Role with name {role_name} already exists."
            )));
        }
        let info = RoleInfo {
            name: role_name.to_string(),
            arn: role_arn(&self.identity.account_id, role_name),
            trust_policy_json: Some(trust_policy_json.to_string()),
        };
        state.roles.insert(
            role_name.to_string(),
            StoredRole {
                info: info.clone(),
                attached_policies: BTreeSet::new(),
            },
        );
        Ok(info)
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> AwsResult<()> {
        let mut state = self.record(BackendCall::AttachRolePolicy {
            role_name: role_name.to_string(),
            policy_arn: policy_arn.to_string(),
        })?;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| AwsError::NotFound(format!("The role with name {role_name} cannot be found.")))?;
        role.attached_policies.insert(policy_arn.to_string());
        Ok(())
    }

    async fn list_registered_resources(&self) -> AwsResult<Vec<RegisteredResource>> {
        let state = self.record(BackendCall::ListResources)?;
        Ok(state.registrations.clone())
    }

    async fn register_resource(&self, request: &RegistrationRequest) -> AwsResult<()> {
        let mut state = self.record(BackendCall::RegisterResource(request.resource_arn.clone()))?;
        if state
            .registrations
            .iter()
            .any(|r| r.resource_arn == request.resource_arn)
        {
            return Err(AwsError::ServiceError(format!(
                "AlreadyExistsException: Resource is already registered: {}",
                request.resource_arn
            )));
        }
        state.registrations.push(RegisteredResource {
            resource_arn: request.resource_arn.clone(),
            role_arn: Some(request.role_arn.clone()),
            with_federation: request.with_federation,
        });
        Ok(())
    }

    async fn get_catalog(&self, catalog_name: &str) -> AwsResult<CatalogInfo> {
        let state = self.record(BackendCall::GetCatalog(catalog_name.to_string()))?;
        state
            .catalogs
            .get(catalog_name)
            .cloned()
            .ok_or_else(|| AwsError::NotFound(format!("Catalog not found: {catalog_name}")))
    }

    async fn create_catalog(&self, desired: &FederatedCatalogSpec) -> AwsResult<()> {
        let mut state = self.record(BackendCall::CreateCatalog(desired.name.clone()))?;
        if state.catalogs.contains_key(&desired.name) {
            return Err(AwsError::ServiceError(format!(
                "AlreadyExistsException: Catalog already exists: {}",
                desired.name
            )));
        }
        state.catalogs.insert(
            desired.name.clone(),
            CatalogInfo {
                name: desired.name.clone(),
                federated_identifier: Some(desired.federated_identifier.clone()),
                connection_name: Some(desired.connection_name.clone()),
            },
        );
        Ok(())
    }

    async fn grant_permissions(&self, request: &GrantRequest) -> AwsResult<()> {
        let mut state = self.record(BackendCall::GrantPermissions(request.clone()))?;
        let table = request.table();

        let (_, catalog_name, bucket) =
            parse_composite_catalog_id(&table.catalog_id).map_err(|_| {
                AwsError::ServiceError(format!(
                    "InvalidInputException: malformed catalog id '{}'",
                    table.catalog_id
                ))
            })?;

        let catalog_federated = state
            .catalogs
            .get(catalog_name)
            .is_some_and(|c| c.federated_identifier.is_some());
        let registered = state
            .registrations
            .iter()
            .any(|r| r.with_federation && r.resource_arn.starts_with("arn:aws:s3tables:"));
        let table_exists = state.tables.contains(&(
            bucket.to_string(),
            table.namespace.clone(),
            table.table.clone(),
        ));

        if !(catalog_federated && registered && table_exists) {
            return Err(AwsError::NotFound(format!(
                "EntityNotFoundException: Table {} not found in catalog {}",
                table.table, table.catalog_id
            )));
        }

        state.grants.push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "111122223333";
    const CALLER: &str = "arn:aws:iam::111122223333:role/github-actions";

    #[tokio::test]
    async fn test_caller_identity_releases_state() {
        let backend = InMemoryBackend::new(ACCOUNT, CALLER);

        let identity = backend.caller_identity().await.unwrap();
        assert_eq!(identity.account_id, ACCOUNT);
        assert_eq!(identity.arn, CALLER);

        // The call log is readable again and a second lookup does not block.
        backend.caller_identity().await.unwrap();
        assert_eq!(
            backend.calls(),
            vec![BackendCall::CallerIdentity, BackendCall::CallerIdentity]
        );
        assert!(backend.mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn test_injected_caller_identity_failure_is_recorded() {
        let backend = InMemoryBackend::new(ACCOUNT, CALLER).fail_on(
            Operation::CallerIdentity,
            AwsError::AccessDenied("ExpiredToken".to_string()),
        );

        let err = backend.caller_identity().await.unwrap_err();
        assert_eq!(err, AwsError::AccessDenied("ExpiredToken".to_string()));
        assert_eq!(backend.calls(), vec![BackendCall::CallerIdentity]);
    }
}
