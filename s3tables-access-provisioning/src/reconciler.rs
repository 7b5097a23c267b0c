//! Per-kind reconciliation policy.
//!
//! | kind                        | Absent | Present / drifted         |
//! |-----------------------------|--------|---------------------------|
//! | IAM role                    | create | skip                      |
//! | Lake Formation registration | create | skip                      |
//! | Glue catalog                | create | skip                      |
//! | managed policy attachment   | apply  | apply                     |
//! | Lake Formation grant        | apply  | apply                     |
//!
//! Drift is reported, never corrected.

use crate::types::{ReconcileAction, ResourceKind, ResourceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create,
    Skip,
    /// Idempotent remote call issued on every run.
    Apply,
}

impl Decision {
    /// The outcome recorded once the decision has been carried out.
    pub fn action(self) -> ReconcileAction {
        match self {
            Decision::Create => ReconcileAction::Created,
            Decision::Skip => ReconcileAction::AlreadyExists,
            Decision::Apply => ReconcileAction::Updated,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    pub fn decide(&self, kind: ResourceKind, state: &ResourceState) -> Decision {
        match kind {
            ResourceKind::ManagedPolicyAttachment | ResourceKind::LakeFormationGrant => {
                Decision::Apply
            }
            ResourceKind::IamRole
            | ResourceKind::LakeFormationRegistration
            | ResourceKind::GlueCatalog => match state {
                ResourceState::Absent => Decision::Create,
                ResourceState::Present => Decision::Skip,
                ResourceState::PresentWithDrift(drift) => {
                    log::warn!("{kind} differs from the desired configuration ({drift}); leaving it unchanged");
                    Decision::Skip
                }
            },
        }
    }
}
