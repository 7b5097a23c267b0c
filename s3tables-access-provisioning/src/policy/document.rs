//! IAM-style policy documents: identity policies, resource policies and trust
//! policies share this shape.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

pub const POLICY_VERSION: &str = "2012-10-17";

/// A JSON value that may be a single string/object or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Single(T),
    Multiple(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::Single(value) => std::slice::from_ref(value).iter(),
            OneOrMany::Multiple(values) => values.iter(),
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            OneOrMany::Single(values.remove(0))
        } else {
            OneOrMany::Multiple(values)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("Allow"),
            Effect::Deny => f.write_str("Deny"),
        }
    }
}

/// `"Principal": "*"` or `"Principal": {"AWS": [...], "Service": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyPrincipal {
    Wildcard(String),
    Mapped(BTreeMap<String, OneOrMany<String>>),
}

impl PolicyPrincipal {
    pub fn service(name: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert("Service".to_string(), OneOrMany::Single(name.to_string()));
        PolicyPrincipal::Mapped(map)
    }

    /// Values listed under one principal type (`AWS`, `Service`, ...).
    pub fn values<'a>(&'a self, principal_type: &str) -> Vec<&'a str> {
        match self {
            PolicyPrincipal::Wildcard(_) => Vec::new(),
            PolicyPrincipal::Mapped(map) => map
                .get(principal_type)
                .map(|values| values.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        }
    }

    /// Whether an IAM principal is named by this element. Account ids and
    /// account root ARNs cover every principal of the account.
    pub fn matches_aws(&self, principal_arn: &str, account_id: &str) -> bool {
        match self {
            PolicyPrincipal::Wildcard(value) => value == "*",
            PolicyPrincipal::Mapped(_) => self.values("AWS").into_iter().any(|value| {
                value == "*"
                    || value == principal_arn
                    || value == account_id
                    || value.ends_with(&format!(":{account_id}:root"))
            }),
        }
    }
}

pub type ConditionBlock = BTreeMap<String, BTreeMap<String, OneOrMany<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<PolicyPrincipal>,
    pub action: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: ConditionBlock,
}

impl Statement {
    pub fn label(&self) -> String {
        self.sid
            .clone()
            .unwrap_or_else(|| format!("{} statement", self.effect))
    }

    /// IAM action names are case-insensitive and may use wildcards.
    pub fn matches_action(&self, action: &str) -> bool {
        let action = action.to_ascii_lowercase();
        self.action
            .iter()
            .any(|pattern| wildcard_match(&pattern.to_ascii_lowercase(), &action))
    }

    /// A statement without a `Resource` element matches nothing.
    pub fn matches_resource(&self, resource_arn: &str) -> bool {
        self.resource
            .as_ref()
            .is_some_and(|resources| resources.iter().any(|p| wildcard_match(p, resource_arn)))
    }

    /// Evaluate the condition block against request context keys. `None`
    /// when an operator or key cannot be evaluated from the context.
    pub fn conditions_hold(&self, context: &BTreeMap<String, String>) -> Option<bool> {
        for (operator, entries) in &self.condition {
            for (key, expected) in entries {
                let actual = context.get(key)?;
                let hit = match operator.as_str() {
                    "StringEquals" | "ArnEquals" => expected.iter().any(|e| e == actual),
                    "StringNotEquals" | "ArnNotEquals" => expected.iter().all(|e| e != actual),
                    "StringEqualsIgnoreCase" => {
                        expected.iter().any(|e| e.eq_ignore_ascii_case(actual))
                    }
                    "StringLike" | "ArnLike" => {
                        expected.iter().any(|e| wildcard_match(e, actual))
                    }
                    "StringNotLike" | "ArnNotLike" => {
                        expected.iter().all(|e| !wildcard_match(e, actual))
                    }
                    _ => return None,
                };
                if !hit {
                    return Some(false);
                }
            }
        }
        Some(true)
    }

    /// Values under any operator for one condition key.
    pub fn condition_values(&self, key: &str) -> Vec<&str> {
        self.condition
            .values()
            .filter_map(|entries| entries.get(key))
            .flat_map(|values| values.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub version: String,
    #[serde(deserialize_with = "statements")]
    pub statement: Vec<Statement>,
}

fn statements<'de, D>(deserializer: D) -> Result<Vec<Statement>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::<Statement>::deserialize(deserializer)? {
        OneOrMany::Single(statement) => vec![statement],
        OneOrMany::Multiple(statements) => statements,
    })
}

/// Glob match supporting `*` (any run) and `?` (any single character).
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    let (mut p, mut v) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while v < value.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == value[v]) {
            p += 1;
            v += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            resume = v;
            p += 1;
        } else if let Some(star_at) = star {
            p = star_at + 1;
            resume += 1;
            v = resume;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
