//! Dual-layer authorization check.
//!
//! An operation on S3 Tables data succeeds only when every applicable layer
//! allows it:
//!
//! 1. the principal's IAM identity policies allow the action on the resource;
//! 2. for `s3tables:` actions, the table bucket policy allows the same action
//!    for the principal, within the namespace condition when one is present;
//! 3. for reads and writes mediated by Lake Formation, the principal holds a
//!    table grant covering the requested permission.
//!
//! Updating one layer without the others is the usual cause of access
//! failures after provisioning, so [`AuthorizationDecision::missing_layers`]
//! names every layer that does not allow the request.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifiers::extract_account_from_arn;
use crate::policy::document::{Effect, PolicyDocument, Statement};
use crate::types::{GrantRequest, LfPermission, TableReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    IdentityPolicy,
    TableBucketPolicy,
    LakeFormation,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::IdentityPolicy => f.write_str("IAM identity policy"),
            Layer::TableBucketPolicy => f.write_str("table bucket policy"),
            Layer::LakeFormation => f.write_str("Lake Formation grants"),
        }
    }
}

/// A Lake Formation table grant as held by a principal. `Name = "*"` stands
/// for every table of the namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrantRecord {
    pub principal: String,
    pub table: TableReference,
    pub permissions: Vec<LfPermission>,
}

impl From<&GrantRequest> for GrantRecord {
    fn from(request: &GrantRequest) -> Self {
        Self {
            principal: request.principal_arn().to_string(),
            table: request.table().clone(),
            permissions: request.permissions().to_vec(),
        }
    }
}

/// Everything the three layers know about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessContext {
    pub identity_policies: Vec<PolicyDocument>,
    pub bucket_policy: Option<PolicyDocument>,
    pub grants: Vec<GrantRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub principal_arn: String,
    pub action: String,
    pub resource_arn: String,
    pub namespace: Option<String>,
    pub table: Option<TableReference>,
    pub lake_formation_permission: Option<LfPermission>,
}

impl AccessRequest {
    pub fn new(
        principal_arn: impl Into<String>,
        action: impl Into<String>,
        resource_arn: impl Into<String>,
    ) -> Self {
        Self {
            principal_arn: principal_arn.into(),
            action: action.into(),
            resource_arn: resource_arn.into(),
            namespace: None,
            table: None,
            lake_formation_permission: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Route the request through Lake Formation for `table`.
    pub fn through_lake_formation(mut self, table: TableReference, permission: LfPermission) -> Self {
        if self.namespace.is_none() {
            self.namespace = Some(table.namespace.clone());
        }
        self.table = Some(table);
        self.lake_formation_permission = Some(permission);
        self
    }

    fn is_s3tables_action(&self) -> bool {
        self.action.to_ascii_lowercase().starts_with("s3tables:")
    }

    fn condition_context(&self) -> BTreeMap<String, String> {
        let mut context = BTreeMap::new();
        context.insert("aws:PrincipalArn".to_string(), self.principal_arn.clone());
        if let Some(account) = extract_account_from_arn(&self.principal_arn) {
            context.insert("aws:PrincipalAccount".to_string(), account);
        }
        if let Some(namespace) = &self.namespace {
            context.insert("s3tables:namespace".to_string(), namespace.clone());
        }
        if let Some(table) = &self.table {
            context.insert("s3tables:tableName".to_string(), table.table.clone());
        }
        context
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerVerdict {
    pub layer: Layer,
    pub applicable: bool,
    pub allowed: bool,
    pub reason: String,
}

impl fmt::Display for LayerVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match (self.applicable, self.allowed) {
            (false, _) => "not applicable",
            (true, true) => "ALLOW",
            (true, false) => "DENY",
        };
        write!(f, "{}: {status} ({})", self.layer, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub verdicts: Vec<LayerVerdict>,
}

impl AuthorizationDecision {
    pub fn is_allowed(&self) -> bool {
        self.verdicts.iter().all(|v| !v.applicable || v.allowed)
    }

    pub fn missing_layers(&self) -> Vec<Layer> {
        self.verdicts
            .iter()
            .filter(|v| v.applicable && !v.allowed)
            .map(|v| v.layer)
            .collect()
    }
}

pub fn evaluate(context: &AccessContext, request: &AccessRequest) -> AuthorizationDecision {
    AuthorizationDecision {
        verdicts: vec![
            identity_layer(context, request),
            bucket_policy_layer(context, request),
            lake_formation_layer(context, request),
        ],
    }
}

enum StatementMatch<'a> {
    Denied(&'a Statement),
    Allowed(&'a Statement),
    NoMatch,
}

/// Explicit deny wins over any allow. A statement whose condition cannot be
/// evaluated is assumed to apply when it denies and not to apply when it
/// allows.
fn match_statements<'a>(
    statements: impl Iterator<Item = &'a Statement>,
    request: &AccessRequest,
    principal_filter: impl Fn(&Statement) -> bool,
) -> StatementMatch<'a> {
    let context = request.condition_context();
    let mut allowed = None;

    for statement in statements {
        if !statement.matches_action(&request.action)
            || !statement.matches_resource(&request.resource_arn)
            || !principal_filter(statement)
        {
            continue;
        }
        let conditions = statement.conditions_hold(&context);
        match statement.effect {
            Effect::Deny if conditions != Some(false) => return StatementMatch::Denied(statement),
            Effect::Allow if conditions == Some(true) && allowed.is_none() => {
                allowed = Some(statement);
            }
            _ => {}
        }
    }

    allowed.map_or(StatementMatch::NoMatch, StatementMatch::Allowed)
}

fn identity_layer(context: &AccessContext, request: &AccessRequest) -> LayerVerdict {
    let statements = context
        .identity_policies
        .iter()
        .flat_map(|doc| doc.statement.iter());

    let (allowed, reason) = match match_statements(statements, request, |_| true) {
        StatementMatch::Denied(s) => (false, format!("explicitly denied by {}", s.label())),
        StatementMatch::Allowed(s) => (true, format!("allowed by {}", s.label())),
        StatementMatch::NoMatch => (
            false,
            format!(
                "no identity-based policy allows {} on {}",
                request.action, request.resource_arn
            ),
        ),
    };

    LayerVerdict {
        layer: Layer::IdentityPolicy,
        applicable: true,
        allowed,
        reason,
    }
}

fn bucket_policy_layer(context: &AccessContext, request: &AccessRequest) -> LayerVerdict {
    if !request.is_s3tables_action() {
        return LayerVerdict {
            layer: Layer::TableBucketPolicy,
            applicable: false,
            allowed: true,
            reason: format!("{} is not an S3 Tables action", request.action),
        };
    }

    let Some(policy) = &context.bucket_policy else {
        return LayerVerdict {
            layer: Layer::TableBucketPolicy,
            applicable: true,
            allowed: false,
            reason: "no table bucket policy".to_string(),
        };
    };

    let account = extract_account_from_arn(&request.principal_arn).unwrap_or_default();
    let principal_filter = |statement: &Statement| {
        statement
            .principal
            .as_ref()
            .is_some_and(|p| p.matches_aws(&request.principal_arn, &account))
    };

    let (allowed, reason) = match match_statements(policy.statement.iter(), request, principal_filter)
    {
        StatementMatch::Denied(s) => (false, format!("explicitly denied by {}", s.label())),
        StatementMatch::Allowed(s) => (true, format!("allowed by {}", s.label())),
        StatementMatch::NoMatch => (
            false,
            match &request.namespace {
                Some(namespace) => format!(
                    "no statement allows {} for {} in namespace {namespace}",
                    request.action, request.principal_arn
                ),
                None => format!(
                    "no statement allows {} for {}",
                    request.action, request.principal_arn
                ),
            },
        ),
    };

    LayerVerdict {
        layer: Layer::TableBucketPolicy,
        applicable: true,
        allowed,
        reason,
    }
}

fn lake_formation_layer(context: &AccessContext, request: &AccessRequest) -> LayerVerdict {
    let (Some(table), Some(permission)) = (&request.table, request.lake_formation_permission)
    else {
        return LayerVerdict {
            layer: Layer::LakeFormation,
            applicable: false,
            allowed: true,
            reason: "request is not mediated by Lake Formation".to_string(),
        };
    };

    let grant = context.grants.iter().find(|grant| {
        grant.principal == request.principal_arn
            && grant.table.catalog_id == table.catalog_id
            && grant.table.namespace == table.namespace
            && (grant.table.table == table.table || grant.table.table == "*")
            && grant.permissions.iter().any(|held| held.covers(permission))
    });

    let (allowed, reason) = match grant {
        Some(grant) => (
            true,
            format!("granted {:?} on {}", grant.permissions, grant.table),
        ),
        None => (
            false,
            format!(
                "{} holds no {permission} grant on {table}",
                request.principal_arn
            ),
        ),
    };

    LayerVerdict {
        layer: Layer::LakeFormation,
        applicable: true,
        allowed,
        reason,
    }
}
