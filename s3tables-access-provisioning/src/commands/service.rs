//! S3 Tables access provisioning service layer
//!
//! This module provides the main service interface. The service holds the
//! validated run configuration and the backend, and exposes the provisioning
//! steps (service role, registration, catalog, grants) plus the end-to-end
//! integration flow built from them.

use crate::aws::{AwsBackend, AwsContext};
use crate::backend::ProvisioningBackend;
use crate::config::ProvisioningConfig;
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::inspector::StateInspector;
use crate::reconciler::Reconciler;
use crate::types::CallerIdentity;

/// Main service struct that holds the backend and provides business logic operations
pub struct ProvisioningService<B: ProvisioningBackend = AwsBackend> {
    pub(crate) backend: B,
    pub(crate) config: ProvisioningConfig,
    pub(crate) reconciler: Reconciler,
}

impl ProvisioningService<AwsBackend> {
    /// Create a new service instance talking to AWS.
    ///
    /// The SDK configuration is loaded once for the configured region,
    /// profile and per-call timeout, and shared by every client.
    pub async fn new(config: ProvisioningConfig) -> Self {
        let context = AwsContext::load(
            &config.region,
            config.profile.as_deref(),
            config.call_timeout,
        )
        .await;
        Self::with_backend(AwsBackend::new(&context), config)
    }
}

impl<B: ProvisioningBackend> ProvisioningService<B> {
    pub fn with_backend(backend: B, config: ProvisioningConfig) -> Self {
        Self {
            backend,
            config,
            reconciler: Reconciler,
        }
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn inspector(&self) -> StateInspector<'_, B> {
        StateInspector::new(&self.backend)
    }

    /// Validate credentials before touching anything: the STS identity must
    /// resolve, and it must belong to the configured account.
    pub async fn preflight(&self) -> ProvisioningResult<CallerIdentity> {
        let identity = self
            .backend
            .caller_identity()
            .await
            .map_err(|e| ProvisioningError::Authentication(e.to_string()))?;

        if identity.account_id != self.config.account_id {
            return Err(ProvisioningError::configuration(format!(
                "credentials belong to account {} ({}), but account {} was requested",
                identity.account_id, identity.arn, self.config.account_id
            )));
        }

        log::info!("Authenticated as {}", identity.arn);
        Ok(identity)
    }
}
