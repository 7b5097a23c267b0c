//! AWS Glue client wrapper for federated catalogs.

use aws_sdk_glue::types::{AllowFullTableExternalDataAccessEnum, CatalogInput, FederatedCatalog};
use aws_sdk_glue::Client as GlueClient;

use crate::aws::{classify_sdk_error, AwsError, AwsResult};
use crate::types::{CatalogInfo, FederatedCatalogSpec};

pub(crate) async fn get_catalog(client: &GlueClient, catalog_name: &str) -> AwsResult<CatalogInfo> {
    let response = client
        .get_catalog()
        .catalog_id(catalog_name)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&format!("glue:GetCatalog {catalog_name}"), e))?;

    let catalog = response.catalog().ok_or_else(|| {
        AwsError::NotFound(format!("GetCatalog returned no catalog for '{catalog_name}'"))
    })?;

    let federated = catalog.federated_catalog();
    Ok(CatalogInfo {
        name: catalog.name().to_string(),
        federated_identifier: federated
            .and_then(|f| f.identifier())
            .map(str::to_string),
        connection_name: federated
            .and_then(|f| f.connection_name())
            .map(str::to_string),
    })
}

pub(crate) async fn create_catalog(client: &GlueClient, desired: &FederatedCatalogSpec) -> AwsResult<()> {
    let federated = FederatedCatalog::builder()
        .identifier(&desired.federated_identifier)
        .connection_name(&desired.connection_name)
        .build();

    let external_access = if desired.allow_full_table_external_data_access {
        AllowFullTableExternalDataAccessEnum::True
    } else {
        AllowFullTableExternalDataAccessEnum::False
    };

    let input = CatalogInput::builder()
        .federated_catalog(federated)
        .set_create_database_default_permissions(Some(Vec::new()))
        .set_create_table_default_permissions(Some(Vec::new()))
        .allow_full_table_external_data_access(external_access)
        .build();

    client
        .create_catalog()
        .name(&desired.name)
        .catalog_input(input)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&format!("glue:CreateCatalog {}", desired.name), e))?;
    Ok(())
}
