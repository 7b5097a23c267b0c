//! Commands module - service layer for S3 Tables access provisioning

mod catalog;
mod grant;
mod identity;
mod integrate;
pub(crate) mod service;

pub use identity::ServiceRole;
pub use service::ProvisioningService;
