//! Deterministic identifier composition and naming rules.
//!
//! Every ARN and catalog id used by a run is derived here from the account
//! id, region, catalog name and bucket name. Nothing else in the crate
//! formats these strings.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ProvisioningError, ProvisioningResult};

pub const DEFAULT_CATALOG_NAME: &str = "s3tablescatalog";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_ROLE_NAME: &str = "S3TablesRoleForLakeFormation";
pub const DEFAULT_MANAGED_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AmazonS3TablesFullAccess";

static REGION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-[a-z]+)+-[0-9]$").expect("region pattern is valid")
});

// Table bucket names: 3-63 chars, lowercase letters, digits and hyphens,
// starting and ending with a letter or digit.
static BUCKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]{1,61}[a-z0-9]$").expect("bucket pattern is valid")
});

// Namespaces and tables: lowercase letters, digits and underscores, starting
// and ending with a letter or digit.
static NAMESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9_]{0,253}[a-z0-9])?$").expect("namespace pattern is valid")
});

static ROLE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_+=,.@-]{1,64}$").expect("role name pattern is valid")
});

static CATALOG_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{1,255}$").expect("catalog name pattern is valid")
});

static POLICY_ARN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-z-]*:iam::(aws|[0-9]{12}):policy/[A-Za-z0-9_+=,.@/-]+$")
        .expect("policy ARN pattern is valid")
});

/// `{account_id}:{catalog_name}/{table_bucket_name}`: how Lake Formation
/// addresses one table bucket inside the federated S3 Tables catalog.
pub fn composite_catalog_id(account_id: &str, catalog_name: &str, table_bucket: &str) -> String {
    format!("{account_id}:{catalog_name}/{table_bucket}")
}

/// Split a composite catalog id into account id, catalog name and bucket,
/// validating each part.
pub fn parse_composite_catalog_id(catalog_id: &str) -> ProvisioningResult<(&str, &str, &str)> {
    let malformed = || {
        ProvisioningError::configuration(format!(
            "catalog id '{catalog_id}' must look like <account_id>:<catalog_name>/<table_bucket>"
        ))
    };
    let (account_id, rest) = catalog_id.split_once(':').ok_or_else(malformed)?;
    let (catalog_name, table_bucket) = rest.split_once('/').ok_or_else(malformed)?;

    validate_account_id(account_id)?;
    validate_catalog_name(catalog_name)?;
    validate_table_bucket_name(table_bucket)?;
    Ok((account_id, catalog_name, table_bucket))
}

/// Wildcard ARN covering every table bucket of the account in a region.
pub fn s3tables_resource_arn(region: &str, account_id: &str) -> String {
    format!("arn:aws:s3tables:{region}:{account_id}:bucket/*")
}

pub fn table_bucket_arn(region: &str, account_id: &str, table_bucket: &str) -> String {
    format!("arn:aws:s3tables:{region}:{account_id}:bucket/{table_bucket}")
}

pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

/// Extract 12-digit account ID from ARN (field 5 in colon-delimited format)
pub fn extract_account_from_arn(arn: &str) -> Option<String> {
    let parts: Vec<&str> = arn.split(':').collect();
    if parts.len() >= 6 && parts[0] == "arn" {
        let account_id = parts[4];
        if is_account_id(account_id) {
            return Some(account_id.to_string());
        }
    }
    None
}

fn is_account_id(value: &str) -> bool {
    value.len() == 12 && value.chars().all(|c| c.is_ascii_digit())
}

pub fn validate_account_id(account_id: &str) -> ProvisioningResult<()> {
    if is_account_id(account_id) {
        Ok(())
    } else {
        Err(ProvisioningError::configuration(format!(
            "account id must be 12 digits, got '{account_id}'"
        )))
    }
}

pub fn validate_region(region: &str) -> ProvisioningResult<()> {
    check(&REGION_RE, region, "region")
}

pub fn validate_table_bucket_name(name: &str) -> ProvisioningResult<()> {
    check(&BUCKET_RE, name, "table bucket name")?;
    if name.starts_with("xn--") || name.ends_with("--table-s3") {
        return Err(ProvisioningError::configuration(format!(
            "invalid table bucket name '{name}': reserved prefix or suffix"
        )));
    }
    Ok(())
}

pub fn validate_namespace(name: &str) -> ProvisioningResult<()> {
    check(&NAMESPACE_RE, name, "namespace")
}

pub fn validate_table_name(name: &str) -> ProvisioningResult<()> {
    check(&NAMESPACE_RE, name, "table name")
}

pub fn validate_role_name(name: &str) -> ProvisioningResult<()> {
    check(&ROLE_NAME_RE, name, "IAM role name")
}

pub fn validate_catalog_name(name: &str) -> ProvisioningResult<()> {
    check(&CATALOG_NAME_RE, name, "catalog name")
}

pub fn validate_managed_policy_arn(arn: &str) -> ProvisioningResult<()> {
    check(&POLICY_ARN_RE, arn, "managed policy ARN")
}

fn check(pattern: &Regex, value: &str, what: &str) -> ProvisioningResult<()> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(ProvisioningError::configuration(format!(
            "invalid {what} '{value}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_catalog_id() {
        assert_eq!(
            composite_catalog_id("111122223333", "s3tablescatalog", "financial-data"),
            "111122223333:s3tablescatalog/financial-data"
        );
    }

    #[test]
    fn test_parse_composite_catalog_id() {
        let id = composite_catalog_id("111122223333", "s3tablescatalog", "financial-data");
        assert_eq!(
            parse_composite_catalog_id(&id).unwrap(),
            ("111122223333", "s3tablescatalog", "financial-data")
        );
        assert!(parse_composite_catalog_id("111122223333:s3tablescatalog").is_err());
        assert!(parse_composite_catalog_id("s3tablescatalog/financial-data").is_err());
        assert!(parse_composite_catalog_id("1234:s3tablescatalog/financial-data").is_err());
    }

    #[test]
    fn test_resource_arns() {
        assert_eq!(
            s3tables_resource_arn("us-east-1", "111122223333"),
            "arn:aws:s3tables:us-east-1:111122223333:bucket/*"
        );
        assert_eq!(
            table_bucket_arn("eu-west-2", "111122223333", "financial-data"),
            "arn:aws:s3tables:eu-west-2:111122223333:bucket/financial-data"
        );
        assert_eq!(
            role_arn("111122223333", DEFAULT_ROLE_NAME),
            "arn:aws:iam::111122223333:role/S3TablesRoleForLakeFormation"
        );
    }

    #[test]
    fn test_extract_account_from_arn() {
        assert_eq!(
            extract_account_from_arn("arn:aws:iam::123456789012:role/MyRole"),
            Some("123456789012".to_string())
        );
        assert_eq!(extract_account_from_arn("not-an-arn"), None);
        assert_eq!(extract_account_from_arn("arn:aws:iam::::"), None);
        assert_eq!(
            extract_account_from_arn("arn:aws:iam::12345678901a:role/MyRole"),
            None
        );
        assert_eq!(
            extract_account_from_arn("arn:aws:iam::1234567890123:role/MyRole"),
            None
        );
    }

    #[test]
    fn test_bucket_names() {
        assert!(validate_table_bucket_name("financial-data").is_ok());
        assert!(validate_table_bucket_name("ab").is_err());
        assert!(validate_table_bucket_name("Financial-Data").is_err());
        assert!(validate_table_bucket_name("-leading").is_err());
        assert!(validate_table_bucket_name("xn--bucket").is_err());
        assert!(validate_table_bucket_name("data--table-s3").is_err());
    }

    #[test]
    fn test_namespace_and_table_names() {
        assert!(validate_namespace("treasury").is_ok());
        assert!(validate_namespace("treasury_bills").is_ok());
        assert!(validate_namespace("_hidden").is_err());
        assert!(validate_namespace("has-hyphen").is_err());
        assert!(validate_namespace("treasury_").is_err());
        assert!(validate_namespace("t").is_ok());
        assert!(validate_table_name("tbills_").is_err());
        assert!(validate_table_name("tbills_2024").is_ok());
        assert!(validate_table_name("tbills").is_ok());
        assert!(validate_table_name("").is_err());
    }

    #[test]
    fn test_region_and_account() {
        assert!(validate_region("us-east-1").is_ok());
        assert!(validate_region("ap-southeast-2").is_ok());
        assert!(validate_region("us-gov-west-1").is_ok());
        assert!(validate_region("useast1").is_err());
        assert!(validate_account_id("111122223333").is_ok());
        assert!(validate_account_id("11112222333").is_err());
    }

    #[test]
    fn test_policy_and_role_names() {
        assert!(validate_managed_policy_arn(DEFAULT_MANAGED_POLICY_ARN).is_ok());
        assert!(validate_managed_policy_arn(
            "arn:aws:iam::111122223333:policy/team/LakeAccess"
        )
        .is_ok());
        assert!(validate_managed_policy_arn("AmazonS3TablesFullAccess").is_err());
        assert!(validate_role_name(DEFAULT_ROLE_NAME).is_ok());
        assert!(validate_role_name("has space").is_err());
        assert!(validate_role_name("rôle-é").is_err());
        assert!(validate_managed_policy_arn("arn:aws:iam::aws:policy/Accès").is_err());
        assert!(validate_managed_policy_arn("arn:aws:iam::١١١١٢٢٢٢٣٣٣٣:policy/P").is_err());
        assert!(validate_catalog_name(DEFAULT_CATALOG_NAME).is_ok());
        assert!(validate_catalog_name("bad/name").is_err());
    }
}
