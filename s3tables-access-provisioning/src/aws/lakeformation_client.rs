//! AWS Lake Formation client wrapper: resource registration and grants.

use aws_sdk_lakeformation::types::{
    DataLakePrincipal, Permission as AwsLfPermission, Resource as LfResource, TableResource,
};
use aws_sdk_lakeformation::Client as LakeFormationClient;

use crate::aws::{classify_sdk_error, AwsError, AwsResult};
use crate::types::{GrantRequest, LfPermission, RegisteredResource, RegistrationRequest};

/// All registrations, across every page. There is no direct existence check
/// for a wildcard ARN, so callers filter this listing.
pub(crate) async fn list_resources(
    client: &LakeFormationClient,
) -> AwsResult<Vec<RegisteredResource>> {
    let mut resources = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let response = client
            .list_resources()
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| classify_sdk_error("lakeformation:ListResources", e))?;

        for info in response.resource_info_list() {
            let Some(resource_arn) = info.resource_arn() else {
                continue;
            };
            resources.push(RegisteredResource {
                resource_arn: resource_arn.to_string(),
                role_arn: info.role_arn().map(str::to_string),
                with_federation: info.with_federation().unwrap_or(false),
            });
        }

        match response.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
            _ => break,
        }
    }

    log::debug!("Lake Formation lists {} registered resources", resources.len());
    Ok(resources)
}

pub(crate) async fn register_resource(
    client: &LakeFormationClient,
    request: &RegistrationRequest,
) -> AwsResult<()> {
    client
        .register_resource()
        .resource_arn(&request.resource_arn)
        .role_arn(&request.role_arn)
        .use_service_linked_role(false)
        .with_federation(request.with_federation)
        .with_privileged_access(request.with_privileged_access)
        .send()
        .await
        .map_err(|e| {
            classify_sdk_error(
                &format!("lakeformation:RegisterResource {}", request.resource_arn),
                e,
            )
        })?;
    Ok(())
}

pub(crate) async fn grant_permissions(
    client: &LakeFormationClient,
    request: &GrantRequest,
) -> AwsResult<()> {
    let principal = DataLakePrincipal::builder()
        .data_lake_principal_identifier(request.principal_arn())
        .build();

    let table = request.table();
    let table_resource = TableResource::builder()
        .catalog_id(&table.catalog_id)
        .database_name(&table.namespace)
        .name(&table.table)
        .build()
        .map_err(|e| AwsError::ConfigError(format!("Failed to build table resource: {e}")))?;

    let resource = LfResource::builder().table(table_resource).build();

    let grantable = request.permissions_with_grant_option();
    let builder = client
        .grant_permissions()
        .principal(principal)
        .resource(resource)
        .set_permissions(Some(convert_permissions(request.permissions())));

    let builder = if grantable.is_empty() {
        builder
    } else {
        builder.set_permissions_with_grant_option(Some(convert_permissions(grantable)))
    };

    log::debug!(
        "GrantPermissions principal={} table={} permissions={:?} grantable={:?}",
        request.principal_arn(),
        table,
        request.permissions(),
        grantable
    );

    builder.send().await.map_err(|e| {
        classify_sdk_error(&format!("lakeformation:GrantPermissions on {table}"), e)
    })?;
    Ok(())
}

fn convert_permissions(permissions: &[LfPermission]) -> Vec<AwsLfPermission> {
    permissions
        .iter()
        .map(|permission| AwsLfPermission::from(permission.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_permissions() {
        let converted = convert_permissions(&[LfPermission::All, LfPermission::Select]);
        assert_eq!(
            converted,
            vec![AwsLfPermission::All, AwsLfPermission::Select]
        );
    }
}
