//! Shared data types for provisioning runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisioningError, ProvisioningResult};

/// Kind of object managed by a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    IamRole,
    ManagedPolicyAttachment,
    LakeFormationRegistration,
    GlueCatalog,
    LakeFormationGrant,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::IamRole => "IAM role",
            ResourceKind::ManagedPolicyAttachment => "Managed policy attachment",
            ResourceKind::LakeFormationRegistration => "Lake Formation registration",
            ResourceKind::GlueCatalog => "Glue catalog",
            ResourceKind::LakeFormationGrant => "Lake Formation grant",
        };
        f.write_str(label)
    }
}

/// Live state of a managed resource as reported by the state inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    Absent,
    Present,
    /// Present, but differs from the desired configuration. Carries a
    /// human-readable description of the difference.
    PresentWithDrift(String),
}

impl ResourceState {
    pub fn is_present(&self) -> bool {
        !matches!(self, ResourceState::Absent)
    }
}

/// Action a reconciliation step took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileAction {
    Created,
    AlreadyExists,
    Updated,
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileAction::Created => f.write_str("created"),
            ReconcileAction::AlreadyExists => f.write_str("already exists"),
            ReconcileAction::Updated => f.write_str("updated"),
        }
    }
}

/// Result of reconciling a single resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub kind: ResourceKind,
    pub identifier: String,
    pub action: ReconcileAction,
}

impl ReconciliationOutcome {
    pub fn new(kind: ResourceKind, identifier: impl Into<String>, action: ReconcileAction) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            action,
        }
    }
}

impl fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.identifier, self.action)
    }
}

/// A step the integration flow would take, computed without mutating anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub kind: ResourceKind,
    pub identifier: String,
    pub state: ResourceState,
    pub planned: ReconcileAction,
}

impl fmt::Display for PlannedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.planned {
            ReconcileAction::Created => "would create",
            ReconcileAction::AlreadyExists => "already exists, would skip",
            ReconcileAction::Updated => "would apply",
        };
        write!(f, "{} {}: {}", self.kind, self.identifier, verb)?;
        if let ResourceState::PresentWithDrift(drift) = &self.state {
            write!(f, " (drift: {drift})")?;
        }
        Ok(())
    }
}

/// Lake Formation permission vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LfPermission {
    All,
    Select,
    Insert,
    Delete,
    Describe,
    Alter,
    Drop,
}

impl LfPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            LfPermission::All => "ALL",
            LfPermission::Select => "SELECT",
            LfPermission::Insert => "INSERT",
            LfPermission::Delete => "DELETE",
            LfPermission::Describe => "DESCRIBE",
            LfPermission::Alter => "ALTER",
            LfPermission::Drop => "DROP",
        }
    }

    /// Whether holding `self` covers a request for `requested`.
    pub fn covers(&self, requested: LfPermission) -> bool {
        *self == LfPermission::All || *self == requested
    }
}

impl fmt::Display for LfPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LfPermission {
    type Err = ProvisioningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(LfPermission::All),
            "SELECT" => Ok(LfPermission::Select),
            "INSERT" => Ok(LfPermission::Insert),
            "DELETE" => Ok(LfPermission::Delete),
            "DESCRIBE" => Ok(LfPermission::Describe),
            "ALTER" => Ok(LfPermission::Alter),
            "DROP" => Ok(LfPermission::Drop),
            other => Err(ProvisioningError::configuration(format!(
                "unknown Lake Formation permission '{other}'"
            ))),
        }
    }
}

/// Address of a table inside a federated S3 Tables catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableReference {
    pub catalog_id: String,
    #[serde(rename = "DatabaseName")]
    pub namespace: String,
    #[serde(rename = "Name")]
    pub table: String,
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.catalog_id, self.namespace, self.table)
    }
}

/// A single Lake Formation grant on one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    principal_arn: String,
    table: TableReference,
    permissions: Vec<LfPermission>,
    permissions_with_grant_option: Vec<LfPermission>,
}

impl GrantRequest {
    /// Build a grant. The permission list must be non-empty; duplicates are
    /// dropped while keeping first-seen order. With `with_grant_option` the
    /// grantable set is exactly the granted set.
    pub fn new(
        principal_arn: impl Into<String>,
        table: TableReference,
        permissions: &[LfPermission],
        with_grant_option: bool,
    ) -> ProvisioningResult<Self> {
        let mut deduped: Vec<LfPermission> = Vec::with_capacity(permissions.len());
        for permission in permissions {
            if !deduped.contains(permission) {
                deduped.push(*permission);
            }
        }
        if deduped.is_empty() {
            return Err(ProvisioningError::configuration(
                "grant requires at least one Lake Formation permission",
            ));
        }

        let permissions_with_grant_option = if with_grant_option {
            deduped.clone()
        } else {
            Vec::new()
        };

        Ok(Self {
            principal_arn: principal_arn.into(),
            table,
            permissions: deduped,
            permissions_with_grant_option,
        })
    }

    pub fn principal_arn(&self) -> &str {
        &self.principal_arn
    }

    pub fn table(&self) -> &TableReference {
        &self.table
    }

    pub fn permissions(&self) -> &[LfPermission] {
        &self.permissions
    }

    pub fn permissions_with_grant_option(&self) -> &[LfPermission] {
        &self.permissions_with_grant_option
    }
}

/// Identity returned by the STS pre-flight check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: String,
    pub arn: String,
}

/// IAM role as observed remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub name: String,
    pub arn: String,
    /// Decoded trust policy JSON, when returned by the API.
    pub trust_policy_json: Option<String>,
}

/// One Lake Formation resource registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredResource {
    pub resource_arn: String,
    pub role_arn: Option<String>,
    pub with_federation: bool,
}

/// Desired Lake Formation registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub resource_arn: String,
    pub role_arn: String,
    pub with_federation: bool,
    pub with_privileged_access: bool,
}

/// Glue catalog as observed remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogInfo {
    pub name: String,
    pub federated_identifier: Option<String>,
    pub connection_name: Option<String>,
}

/// Connection name marking a Glue catalog as an S3 Tables federation.
pub const S3TABLES_CONNECTION_NAME: &str = "aws:s3tables";

/// Desired federated Glue catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedCatalogSpec {
    pub name: String,
    pub federated_identifier: String,
    pub connection_name: String,
    pub allow_full_table_external_data_access: bool,
}

impl FederatedCatalogSpec {
    /// Least-privilege S3 Tables federation: no default database or table
    /// permissions, full external data access enabled at catalog level.
    pub fn s3tables(catalog_name: &str, resource_arn: &str) -> Self {
        Self {
            name: catalog_name.to_string(),
            federated_identifier: resource_arn.to_string(),
            connection_name: S3TABLES_CONNECTION_NAME.to_string(),
            allow_full_table_external_data_access: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableReference {
        TableReference {
            catalog_id: "111122223333:s3tablescatalog/financial-data".to_string(),
            namespace: "treasury".to_string(),
            table: "tbills".to_string(),
        }
    }

    #[test]
    fn test_grant_option_mirrors_permissions() {
        let grant = GrantRequest::new(
            "arn:aws:iam::111122223333:role/ci",
            table(),
            &[LfPermission::All],
            true,
        )
        .unwrap();
        assert_eq!(grant.permissions(), &[LfPermission::All]);
        assert_eq!(grant.permissions_with_grant_option(), &[LfPermission::All]);
    }

    #[test]
    fn test_grant_without_option_has_empty_grantable_set() {
        let grant = GrantRequest::new(
            "arn:aws:iam::111122223333:role/ci",
            table(),
            &[LfPermission::Select, LfPermission::Insert, LfPermission::Select],
            false,
        )
        .unwrap();
        assert_eq!(
            grant.permissions(),
            &[LfPermission::Select, LfPermission::Insert]
        );
        assert!(grant.permissions_with_grant_option().is_empty());
    }

    #[test]
    fn test_empty_permissions_rejected() {
        let result = GrantRequest::new("arn:aws:iam::111122223333:role/ci", table(), &[], true);
        assert!(matches!(result, Err(ProvisioningError::Configuration(_))));
    }

    #[test]
    fn test_permission_parsing() {
        assert_eq!("all".parse::<LfPermission>().unwrap(), LfPermission::All);
        assert_eq!(" Select ".parse::<LfPermission>().unwrap(), LfPermission::Select);
        assert!("WRITE".parse::<LfPermission>().is_err());
    }

    #[test]
    fn test_outcome_line() {
        let outcome = ReconciliationOutcome::new(
            ResourceKind::IamRole,
            "S3TablesRoleForLakeFormation",
            ReconcileAction::AlreadyExists,
        );
        assert_eq!(
            outcome.to_string(),
            "IAM role S3TablesRoleForLakeFormation: already exists"
        );
    }
}
