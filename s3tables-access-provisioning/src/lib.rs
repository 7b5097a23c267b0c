//! S3 Tables Access Provisioning Library
//!
//! This crate provides the core business logic for wiring an S3 table bucket
//! into Lake Formation:
//! - Lake Formation service role with its trust policy and managed policy
//! - Resource registration and the federated `s3tablescatalog` Glue catalog
//! - Table-level Lake Formation grants
//! - Offline evaluation of IAM, table-bucket and Lake Formation permissions
//!
//! Every step inspects live state first and only creates what is missing.

pub mod aws;
pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
pub mod identifiers;
pub mod inspector;
pub mod policy;
pub mod reconciler;
pub mod types;

// Re-exports for a small, focused public API
pub use aws::principal::{resolve_principal, PrincipalInfo, PrincipalKind};
pub use aws::{AwsBackend, AwsContext, AwsError};
pub use backend::memory::InMemoryBackend;
pub use backend::ProvisioningBackend;
pub use commands::{ProvisioningService, ServiceRole};
pub use config::{ProvisioningConfig, ProvisioningConfigBuilder};
pub use error::{ProvisioningError, ProvisioningResult};
pub use types::{
    GrantRequest, LfPermission, PlannedStep, ReconcileAction, ReconciliationOutcome,
    ResourceKind, ResourceState, TableReference,
};
