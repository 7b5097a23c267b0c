//! Policy documents, the Lake Formation trust policy and the dual-layer
//! authorization check.

pub mod composer;
pub mod document;
pub mod trust;

pub use composer::{
    evaluate, AccessContext, AccessRequest, AuthorizationDecision, GrantRecord, Layer,
    LayerVerdict,
};
pub use document::{Effect, OneOrMany, PolicyDocument, PolicyPrincipal, Statement};
pub use trust::{
    lake_formation_trust_policy, load_trust_policy, parse_trust_policy, validate_trust_policy,
};
