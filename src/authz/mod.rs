pub mod engine;
pub mod errors;
pub mod loader;
pub mod permission;
pub mod policy;
pub mod registry;
pub mod token;
pub mod types;
pub mod web;

#[cfg(test)]
mod testing;

use registry::PolicyRegistry;
use token::TrustedKey;
use types::{AuthorizationDecision, Method};

/// Everything a decision needs, shared across requests.
/// Immutable after construction; policy changes require a service reload.
#[derive(Debug)]
pub struct AuthzState {
    pub registry: PolicyRegistry,
    pub trusted_key: TrustedKey,
}

impl AuthzState {
    pub fn new(registry: PolicyRegistry, trusted_key: TrustedKey) -> Self {
        Self {
            registry,
            trusted_key,
        }
    }

    pub fn authorize(
        &self,
        resource_type: &str,
        method: Method,
        authorization_header: Option<&str>,
    ) -> AuthorizationDecision {
        let requirements = self.registry.resolve(resource_type, method);
        engine::authorize(requirements, authorization_header, &self.trusted_key)
    }
}
