use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authz::errors::AuthzError;
use crate::authz::permission::PermissionRequirement;

/// HTTP methods a policy can be declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Map an HTTP request method onto the policy vocabulary.
    /// `HEAD` is guarded like `GET`; anything else has no policy.
    pub fn from_http(method: &axum::http::Method) -> Option<Self> {
        match *method {
            axum::http::Method::GET | axum::http::Method::HEAD => Some(Method::Get),
            axum::http::Method::POST => Some(Method::Post),
            axum::http::Method::PUT => Some(Method::Put),
            axum::http::Method::PATCH => Some(Method::Patch),
            axum::http::Method::DELETE => Some(Method::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AuthzError::UnknownMethod(s.to_string()))
    }
}

/// The methods a builder operation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MethodScope {
    #[default]
    All,
    Only(Vec<Method>),
}

impl MethodScope {
    pub fn methods(&self) -> Vec<Method> {
        match self {
            MethodScope::All => Method::ALL.to_vec(),
            MethodScope::Only(methods) => methods.clone(),
        }
    }
}

impl From<Method> for MethodScope {
    fn from(method: Method) -> Self {
        MethodScope::Only(vec![method])
    }
}

impl<const N: usize> From<[Method; N]> for MethodScope {
    fn from(methods: [Method; N]) -> Self {
        MethodScope::Only(methods.to_vec())
    }
}

impl From<Vec<Method>> for MethodScope {
    fn from(methods: Vec<Method>) -> Self {
        MethodScope::Only(methods)
    }
}

/// How an entry takes part in evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Caller must match at least one plain requirement of the set.
    Require,
    /// Callers matching the requirement are refused.
    Deny,
    /// Callers matching the requirement are let through.
    Exempt,
}

/// A declared requirement. `Unsupported` only comes from decoded policy input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Requirement {
    Permission(PermissionRequirement),
    Unsupported { kind: String },
}

impl From<PermissionRequirement> for Requirement {
    fn from(requirement: PermissionRequirement) -> Self {
        Requirement::Permission(requirement)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyEntry {
    pub effect: Effect,
    pub requirement: Requirement,
}

impl PolicyEntry {
    /// The known requirement, if this entry carries one.
    pub fn permission(&self) -> Option<&PermissionRequirement> {
        match &self.requirement {
            Requirement::Permission(p) => Some(p),
            Requirement::Unsupported { .. } => None,
        }
    }
}

/// Ordered entries guarding one (resource, method) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequirementSet {
    entries: Vec<PolicyEntry>,
}

impl RequirementSet {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn denied() -> Self {
        Self {
            entries: vec![PolicyEntry {
                effect: Effect::Require,
                requirement: PermissionRequirement::Denied.into(),
            }],
        }
    }

    /// Drop the leading `{Denied}` entry installed by `deny_all`.
    pub(crate) fn remove_default_denial(&mut self) {
        let leading_denial = self.entries.first().is_some_and(|e| {
            e.effect == Effect::Require && e.permission() == Some(&PermissionRequirement::Denied)
        });
        if leading_denial {
            self.entries.remove(0);
        }
    }

    pub fn push(&mut self, effect: Effect, requirement: impl Into<Requirement>) {
        self.entries.push(PolicyEntry {
            effect,
            requirement: requirement.into(),
        });
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Why a request was refused, mapped to an HTTP status at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// Credential missing or malformed, or the policy itself is unusable.
    Unauthorized,
    /// Credential present but insufficient, rejected, or the method is blocked.
    Forbidden,
}

impl DenialKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DenialKind::Unauthorized => StatusCode::UNAUTHORIZED,
            DenialKind::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Denial {
    pub kind: DenialKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Allowed,
    Denied(Denial),
}

impl AuthorizationDecision {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Denied(Denial {
            kind: DenialKind::Unauthorized,
            message: message.into(),
        })
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Denied(Denial {
            kind: DenialKind::Forbidden,
            message: message.into(),
        })
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied(denial) => Err(denial),
        }
    }
}

// ---------- API request/response types ----------

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// e.g. "users"
    pub resource: String,
    /// e.g. "GET"
    pub method: String,
    /// Raw `Authorization` header value, if the caller sent one
    #[serde(default)]
    pub authorization: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    /// HTTP status the protected service should answer with
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<AuthorizationDecision> for CheckResponse {
    fn from(decision: AuthorizationDecision) -> Self {
        match decision {
            AuthorizationDecision::Allowed => Self {
                allowed: true,
                status: StatusCode::OK.as_u16(),
                message: None,
            },
            AuthorizationDecision::Denied(denial) => Self {
                allowed: false,
                status: denial.kind.status_code().as_u16(),
                message: Some(denial.message),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub resource: String,
    pub methods: BTreeMap<Method, RequirementSet>,
}
