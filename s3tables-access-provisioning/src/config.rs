//! Validated configuration for a provisioning run.
//!
//! Built once at entry; every check here runs before any network call, so a
//! bad argument always surfaces as [`ProvisioningError::Configuration`].

use std::time::Duration;

use crate::error::{ProvisioningError, ProvisioningResult};
use crate::identifiers::{
    composite_catalog_id, role_arn, s3tables_resource_arn, table_bucket_arn,
    validate_account_id, validate_catalog_name, validate_managed_policy_arn, validate_namespace,
    validate_region, validate_role_name, validate_table_bucket_name, validate_table_name,
    DEFAULT_CATALOG_NAME, DEFAULT_MANAGED_POLICY_ARN, DEFAULT_REGION, DEFAULT_ROLE_NAME,
};
use crate::policy::document::PolicyDocument;
use crate::policy::trust::{lake_formation_trust_policy, validate_trust_policy};
use crate::types::TableReference;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub account_id: String,
    pub region: String,
    pub profile: Option<String>,
    pub table_bucket: String,
    pub namespace: String,
    pub table: String,
    pub catalog_name: String,
    pub role_name: String,
    pub managed_policy_arn: String,
    pub trust_policy: PolicyDocument,
    pub call_timeout: Option<Duration>,
}

impl ProvisioningConfig {
    pub fn builder() -> ProvisioningConfigBuilder {
        ProvisioningConfigBuilder::default()
    }

    pub fn role_arn(&self) -> String {
        role_arn(&self.account_id, &self.role_name)
    }

    /// Wildcard S3 Tables ARN registered with Lake Formation and used as the
    /// federated catalog identifier.
    pub fn resource_arn(&self) -> String {
        s3tables_resource_arn(&self.region, &self.account_id)
    }

    pub fn table_bucket_arn(&self) -> String {
        table_bucket_arn(&self.region, &self.account_id, &self.table_bucket)
    }

    pub fn catalog_id(&self) -> String {
        composite_catalog_id(&self.account_id, &self.catalog_name, &self.table_bucket)
    }

    pub fn table_reference(&self) -> TableReference {
        TableReference {
            catalog_id: self.catalog_id(),
            namespace: self.namespace.clone(),
            table: self.table.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProvisioningConfigBuilder {
    account_id: Option<String>,
    region: Option<String>,
    profile: Option<String>,
    table_bucket: Option<String>,
    namespace: Option<String>,
    table: Option<String>,
    catalog_name: Option<String>,
    role_name: Option<String>,
    managed_policy_arn: Option<String>,
    trust_policy: Option<PolicyDocument>,
    call_timeout: Option<Duration>,
}

impl ProvisioningConfigBuilder {
    pub fn account_id(mut self, value: impl Into<String>) -> Self {
        self.account_id = Some(value.into());
        self
    }

    pub fn region(mut self, value: impl Into<String>) -> Self {
        self.region = Some(value.into());
        self
    }

    pub fn profile(mut self, value: Option<String>) -> Self {
        self.profile = value;
        self
    }

    pub fn table_bucket(mut self, value: impl Into<String>) -> Self {
        self.table_bucket = Some(value.into());
        self
    }

    pub fn namespace(mut self, value: impl Into<String>) -> Self {
        self.namespace = Some(value.into());
        self
    }

    pub fn table(mut self, value: impl Into<String>) -> Self {
        self.table = Some(value.into());
        self
    }

    pub fn catalog_name(mut self, value: impl Into<String>) -> Self {
        self.catalog_name = Some(value.into());
        self
    }

    pub fn role_name(mut self, value: impl Into<String>) -> Self {
        self.role_name = Some(value.into());
        self
    }

    pub fn managed_policy_arn(mut self, value: impl Into<String>) -> Self {
        self.managed_policy_arn = Some(value.into());
        self
    }

    /// Replace the generated Lake Formation trust policy.
    pub fn trust_policy(mut self, value: PolicyDocument) -> Self {
        self.trust_policy = Some(value);
        self
    }

    pub fn call_timeout(mut self, value: Option<Duration>) -> Self {
        self.call_timeout = value;
        self
    }

    pub fn build(self) -> ProvisioningResult<ProvisioningConfig> {
        let account_id = required(self.account_id, "account id")?;
        validate_account_id(&account_id)?;

        let region = self.region.unwrap_or_else(|| DEFAULT_REGION.to_string());
        validate_region(&region)?;

        let table_bucket = required(self.table_bucket, "table bucket name")?;
        validate_table_bucket_name(&table_bucket)?;

        let namespace = required(self.namespace, "namespace")?;
        validate_namespace(&namespace)?;

        let table = required(self.table, "table name")?;
        validate_table_name(&table)?;

        let catalog_name = self
            .catalog_name
            .unwrap_or_else(|| DEFAULT_CATALOG_NAME.to_string());
        validate_catalog_name(&catalog_name)?;

        let role_name = self
            .role_name
            .unwrap_or_else(|| DEFAULT_ROLE_NAME.to_string());
        validate_role_name(&role_name)?;

        let managed_policy_arn = self
            .managed_policy_arn
            .unwrap_or_else(|| DEFAULT_MANAGED_POLICY_ARN.to_string());
        validate_managed_policy_arn(&managed_policy_arn)?;

        let trust_policy = self
            .trust_policy
            .unwrap_or_else(|| lake_formation_trust_policy(&account_id));
        validate_trust_policy(&trust_policy, &account_id, &role_arn(&account_id, &role_name))?;

        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ProvisioningError::configuration(
                "call timeout must be greater than zero",
            ));
        }

        Ok(ProvisioningConfig {
            account_id,
            region,
            profile: self.profile.filter(|p| !p.is_empty()),
            table_bucket,
            namespace,
            table,
            catalog_name,
            role_name,
            managed_policy_arn,
            trust_policy,
            call_timeout: self.call_timeout,
        })
    }
}

fn required(value: Option<String>, what: &str) -> ProvisioningResult<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ProvisioningError::configuration(format!("missing {what}"))),
    }
}
