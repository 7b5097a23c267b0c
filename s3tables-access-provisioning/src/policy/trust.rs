//! Trust policy for the Lake Formation service role.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ProvisioningError, ProvisioningResult};
use crate::policy::document::{
    wildcard_match, Effect, OneOrMany, PolicyDocument, PolicyPrincipal, Statement, POLICY_VERSION,
};

pub const LAKE_FORMATION_SERVICE: &str = "lakeformation.amazonaws.com";

const TRUST_ACTIONS: [&str; 3] = ["sts:AssumeRole", "sts:SetContext", "sts:SetSourceIdentity"];

/// Lets Lake Formation assume the role, restricted to requests originating
/// from `account_id`.
pub fn lake_formation_trust_policy(account_id: &str) -> PolicyDocument {
    let mut source_account = BTreeMap::new();
    source_account.insert(
        "aws:SourceAccount".to_string(),
        OneOrMany::Single(account_id.to_string()),
    );
    let mut condition = BTreeMap::new();
    condition.insert("StringEquals".to_string(), source_account);

    PolicyDocument {
        id: None,
        version: POLICY_VERSION.to_string(),
        statement: vec![Statement {
            sid: Some("LakeFormationDataAccessPolicy".to_string()),
            effect: Effect::Allow,
            principal: Some(PolicyPrincipal::service(LAKE_FORMATION_SERVICE)),
            action: TRUST_ACTIONS
                .iter()
                .map(|action| action.to_string())
                .collect::<Vec<_>>()
                .into(),
            resource: None,
            condition,
        }],
    }
}

pub fn parse_trust_policy(json: &str) -> ProvisioningResult<PolicyDocument> {
    serde_json::from_str(json)
        .map_err(|e| ProvisioningError::configuration(format!("malformed trust policy JSON: {e}")))
}

pub fn load_trust_policy(path: &Path) -> ProvisioningResult<PolicyDocument> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        ProvisioningError::configuration(format!(
            "cannot read trust policy {}: {e}",
            path.display()
        ))
    })?;
    parse_trust_policy(&json)
}

/// Check a trust policy against the role it will be attached to.
///
/// The document must let Lake Formation assume the role only from
/// `account_id`: every `aws:SourceAccount` value must be that account, and at
/// least one statement trusting Lake Formation must carry the condition.
/// Every IAM role ARN the document mentions must be `role_arn` itself.
pub fn validate_trust_policy(
    doc: &PolicyDocument,
    account_id: &str,
    role_arn: &str,
) -> ProvisioningResult<()> {
    let lake_formation_statements: Vec<&Statement> = doc
        .statement
        .iter()
        .filter(|statement| {
            statement.effect == Effect::Allow
                && statement.principal.as_ref().is_some_and(|principal| {
                    principal
                        .values("Service")
                        .contains(&LAKE_FORMATION_SERVICE)
                })
                && statement.matches_action("sts:AssumeRole")
        })
        .collect();
    if lake_formation_statements.is_empty() {
        return Err(ProvisioningError::configuration(format!(
            "trust policy does not allow {LAKE_FORMATION_SERVICE} to assume the role"
        )));
    }

    for statement in &doc.statement {
        for source_account in statement.condition_values("aws:SourceAccount") {
            if source_account != account_id {
                return Err(ProvisioningError::configuration(format!(
                    "trust policy {} is scoped to account {source_account}, expected {account_id}",
                    statement.label()
                )));
            }
        }

        let mut referenced: Vec<&str> = statement.condition_values("aws:SourceArn");
        referenced.extend(statement.condition_values("aws:PrincipalArn"));
        if let Some(principal) = &statement.principal {
            referenced.extend(principal.values("AWS"));
        }

        for arn in referenced.into_iter().filter(|arn| arn.contains(":role/")) {
            if !wildcard_match(arn, role_arn) {
                return Err(ProvisioningError::configuration(format!(
                    "trust policy {} references role {arn}, but the role being provisioned is {role_arn}",
                    statement.label()
                )));
            }
        }
    }

    let scoped_to_account = lake_formation_statements.iter().any(|statement| {
        statement
            .condition_values("aws:SourceAccount")
            .contains(&account_id)
    });
    if !scoped_to_account {
        return Err(ProvisioningError::configuration(format!(
            "trust policy lets {LAKE_FORMATION_SERVICE} assume the role without an \
             aws:SourceAccount condition for account {account_id}"
        )));
    }

    Ok(())
}
