//! IAM principal ARN parsing.

use crate::identifiers::extract_account_from_arn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    Role,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalInfo {
    pub kind: PrincipalKind,
    pub account_id: String,
    /// Name without any IAM path.
    pub name: String,
    pub arn: String,
}

/// Resolve an IAM role or user ARN. Assumed-role session ARNs are mapped back
/// to the role they were assumed from, since Lake Formation grants target the
/// role itself.
pub fn resolve_principal(arn: &str) -> Result<PrincipalInfo, String> {
    let account_id = extract_account_from_arn(arn)
        .ok_or_else(|| format!("could not extract account id from principal ARN '{arn}'"))?;

    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    if parts.len() != 6 || !parts[1].starts_with("aws") {
        return Err(format!("malformed principal ARN '{arn}'"));
    }
    let (service, resource) = (parts[2], parts[5]);

    let (kind, name) = match (service, resource.split_once('/')) {
        ("iam", Some(("role", path))) => (PrincipalKind::Role, last_segment(path)),
        ("iam", Some(("user", path))) => (PrincipalKind::User, last_segment(path)),
        ("sts", Some(("assumed-role", rest))) => {
            let role = rest.split('/').next().unwrap_or_default();
            (PrincipalKind::Role, role)
        }
        _ => {
            return Err(format!(
                "unsupported principal '{arn}': expected an IAM role or user ARN"
            ))
        }
    };

    if name.is_empty() {
        return Err(format!("principal ARN '{arn}' has an empty name"));
    }

    let arn = if service == "sts" {
        format!("arn:{}:iam::{account_id}:role/{name}", parts[1])
    } else {
        arn.to_string()
    };

    Ok(PrincipalInfo {
        kind,
        account_id,
        name: name.to_string(),
        arn,
    })
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arn() {
        let info = resolve_principal("arn:aws:iam::111122223333:role/github-actions").unwrap();
        assert_eq!(info.kind, PrincipalKind::Role);
        assert_eq!(info.name, "github-actions");
        assert_eq!(info.account_id, "111122223333");
    }

    #[test]
    fn test_role_with_path() {
        let info = resolve_principal("arn:aws:iam::111122223333:role/ci/deployer").unwrap();
        assert_eq!(info.name, "deployer");
        assert_eq!(info.arn, "arn:aws:iam::111122223333:role/ci/deployer");
    }

    #[test]
    fn test_user_arn() {
        let info = resolve_principal("arn:aws:iam::111122223333:user/alice").unwrap();
        assert_eq!(info.kind, PrincipalKind::User);
        assert_eq!(info.name, "alice");
    }

    #[test]
    fn test_assumed_role_maps_to_role() {
        let info =
            resolve_principal("arn:aws:sts::111122223333:assumed-role/github-actions/session-1")
                .unwrap();
        assert_eq!(info.kind, PrincipalKind::Role);
        assert_eq!(info.arn, "arn:aws:iam::111122223333:role/github-actions");
    }

    #[test]
    fn test_rejects_non_iam() {
        assert!(resolve_principal("arn:aws:s3:::my-bucket").is_err());
        assert!(resolve_principal("arn:aws:iam::111122223333:group/devs").is_err());
        assert!(resolve_principal("arn:aws:iam::111122223333:role/").is_err());
    }
}
