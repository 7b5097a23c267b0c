//! AWS IAM client wrapper for service-role operations

use aws_sdk_iam::types::Role;
use aws_sdk_iam::Client as IamClient;

use crate::aws::{classify_sdk_error, AwsError, AwsResult};
use crate::types::RoleInfo;

const ROLE_DESCRIPTION: &str = "Lets Lake Formation vend credentials for S3 Tables federation";

pub(crate) async fn get_role(client: &IamClient, role_name: &str) -> AwsResult<RoleInfo> {
    let response = client
        .get_role()
        .role_name(role_name)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&format!("iam:GetRole {role_name}"), e))?;

    let role = response
        .role()
        .ok_or_else(|| AwsError::NotFound(format!("GetRole returned no role for '{role_name}'")))?;
    role_info(role)
}

pub(crate) async fn create_role(
    client: &IamClient,
    role_name: &str,
    trust_policy_json: &str,
) -> AwsResult<RoleInfo> {
    let response = client
        .create_role()
        .role_name(role_name)
        .assume_role_policy_document(trust_policy_json)
        .description(ROLE_DESCRIPTION)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&format!("iam:CreateRole {role_name}"), e))?;

    let role = response.role().ok_or_else(|| {
        AwsError::ServiceError(format!("CreateRole returned no role for '{role_name}'"))
    })?;
    role_info(role)
}

pub(crate) async fn attach_role_policy(
    client: &IamClient,
    role_name: &str,
    policy_arn: &str,
) -> AwsResult<()> {
    client
        .attach_role_policy()
        .role_name(role_name)
        .policy_arn(policy_arn)
        .send()
        .await
        .map_err(|e| {
            classify_sdk_error(
                &format!("iam:AttachRolePolicy {policy_arn} on role {role_name}"),
                e,
            )
        })?;
    Ok(())
}

fn role_info(role: &Role) -> AwsResult<RoleInfo> {
    // IAM returns the trust policy URL-encoded
    let trust_policy_json = role
        .assume_role_policy_document()
        .map(|encoded| {
            percent_encoding::percent_decode_str(encoded)
                .decode_utf8()
                .map(|decoded| decoded.into_owned())
                .map_err(|e| {
                    AwsError::PolicyError(format!("Failed to URL decode trust policy: {e}"))
                })
        })
        .transpose()?;

    Ok(RoleInfo {
        name: role.role_name().to_string(),
        arn: role.arn().to_string(),
        trust_policy_json,
    })
}
