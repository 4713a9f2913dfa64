use chrono::{DateTime, Utc};

use crate::authz::permission::{PermissionRequirement, RequiredPermissions};
use crate::authz::token::{self, TrustedKey, VerifiedClaims};
use crate::authz::types::{AuthorizationDecision, Effect, PolicyEntry, Requirement, RequirementSet};

pub const NOT_ALLOWED: &str = "Not allowed to access method.";
pub const HEADER_MISSING: &str = "The authorisation header is missing.";
pub const HEADER_MALFORMED: &str = "The authorisation header must be of the form 'Bearer <token>'.";
pub const PERMISSION_MISSING: &str = "The required permission is missing.";

/// Decide whether a caller presenting `authorization_header` may pass `requirements`.
pub fn authorize(
    requirements: &RequirementSet,
    authorization_header: Option<&str>,
    key: &TrustedKey,
) -> AuthorizationDecision {
    authorize_at(requirements, authorization_header, key, Utc::now())
}

/// Same as [`authorize`], with token expiry judged at `now`.
pub fn authorize_at(
    requirements: &RequirementSet,
    authorization_header: Option<&str>,
    key: &TrustedKey,
    now: DateTime<Utc>,
) -> AuthorizationDecision {
    // 1. Nothing declared
    if requirements.is_empty() {
        return AuthorizationDecision::Allowed;
    }

    let entries = requirements.entries();

    // 2. Unconditional blocks win over everything else
    if entries.iter().any(blocks_everyone) {
        return AuthorizationDecision::forbidden(NOT_ALLOWED);
    }

    // 3. Declarations the engine cannot interpret
    if let Some(kind) = entries.iter().find_map(unsupported_kind) {
        return AuthorizationDecision::unauthorized(format!(
            "The permission type {kind} is not supported."
        ));
    }

    // 4. Open to everyone
    if entries.iter().any(admits_everyone) {
        return AuthorizationDecision::Allowed;
    }

    // 5. From here on a bearer token is needed
    let Some(header) = authorization_header else {
        return AuthorizationDecision::unauthorized(HEADER_MISSING);
    };
    let Some(raw_token) = bearer_token(header) else {
        return AuthorizationDecision::unauthorized(HEADER_MALFORMED);
    };

    // 6. Verification failures become ordinary denials
    let claims = match token::verify_at(raw_token, key, now) {
        Ok(claims) => claims,
        Err(e) => return AuthorizationDecision::forbidden(e.to_string()),
    };

    evaluate_claims(entries, &claims)
}

/// Steps 7 and 8: exclusions and exemptions in declaration order, then plain requirements.
fn evaluate_claims(entries: &[PolicyEntry], claims: &VerifiedClaims) -> AuthorizationDecision {
    for entry in entries {
        let Some(requirement) = entry.permission() else {
            continue;
        };
        match entry.effect {
            Effect::Deny if requirement.matches(&claims.roles, &claims.authorities) => {
                return AuthorizationDecision::forbidden(NOT_ALLOWED);
            }
            Effect::Exempt if requirement.matches(&claims.roles, &claims.authorities) => {
                return AuthorizationDecision::Allowed;
            }
            Effect::Require | Effect::Deny | Effect::Exempt => {}
        }
    }

    let required = RequiredPermissions::from_requirements(
        entries
            .iter()
            .filter(|e| e.effect == Effect::Require)
            .filter_map(PolicyEntry::permission),
    );
    if required.is_empty() || required.is_met_by(&claims.roles, &claims.authorities) {
        AuthorizationDecision::Allowed
    } else {
        AuthorizationDecision::forbidden(PERMISSION_MISSING)
    }
}

fn blocks_everyone(entry: &PolicyEntry) -> bool {
    matches!(
        (entry.effect, entry.permission()),
        (_, Some(PermissionRequirement::Denied))
            | (Effect::Deny, Some(PermissionRequirement::Anonymous))
    )
}

fn admits_everyone(entry: &PolicyEntry) -> bool {
    matches!(
        (entry.effect, entry.permission()),
        (
            Effect::Require | Effect::Exempt,
            Some(PermissionRequirement::Anonymous)
        )
    )
}

fn unsupported_kind(entry: &PolicyEntry) -> Option<&str> {
    match &entry.requirement {
        Requirement::Unsupported { kind } => Some(kind),
        Requirement::Permission(_) => None,
    }
}

/// Extract the token from `Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") || parts.next().is_some() {
        return None;
    }
    Some(token)
}
