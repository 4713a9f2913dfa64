use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

/// A single permission requirement attached to a (resource, method) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum PermissionRequirement {
    /// Caller must hold the named role.
    Role(String),
    /// Caller must hold the named authority.
    Authority(String),
    /// No caller may pass.
    Denied,
    /// Every caller passes, authenticated or not.
    Anonymous,
}

impl PermissionRequirement {
    pub fn role(name: impl Into<String>) -> Self {
        Self::Role(name.into())
    }

    pub fn authority(name: impl Into<String>) -> Self {
        Self::Authority(name.into())
    }

    /// Lowercase kind name, as used in policy files.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Role(_) => "role",
            Self::Authority(_) => "authority",
            Self::Denied => "denied",
            Self::Anonymous => "anonymous",
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Role(name) | Self::Authority(name) => Some(name),
            Self::Denied | Self::Anonymous => None,
        }
    }

    /// Whether a caller holding `roles` and `authorities` satisfies this requirement.
    pub fn matches(&self, roles: &HashSet<String>, authorities: &HashSet<String>) -> bool {
        match self {
            Self::Role(name) => roles.contains(name),
            Self::Authority(name) => authorities.contains(name),
            Self::Denied => false,
            Self::Anonymous => true,
        }
    }
}

impl fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}:{}", self.kind(), name),
            None => f.write_str(self.kind()),
        }
    }
}

/// Role and authority names a caller must match at least one of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredPermissions {
    pub roles: HashSet<String>,
    pub authorities: HashSet<String>,
}

impl RequiredPermissions {
    /// Collect the named requirements, skipping `Denied` and `Anonymous`.
    pub fn from_requirements<'a>(
        requirements: impl IntoIterator<Item = &'a PermissionRequirement>,
    ) -> Self {
        let mut required = Self::default();
        for requirement in requirements {
            match requirement {
                PermissionRequirement::Role(name) => {
                    required.roles.insert(name.clone());
                }
                PermissionRequirement::Authority(name) => {
                    required.authorities.insert(name.clone());
                }
                PermissionRequirement::Denied | PermissionRequirement::Anonymous => {}
            }
        }
        required
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.authorities.is_empty()
    }

    /// True when either the role or the authority intersection is non-empty.
    pub fn is_met_by(&self, roles: &HashSet<String>, authorities: &HashSet<String>) -> bool {
        !self.roles.is_disjoint(roles) || !self.authorities.is_disjoint(authorities)
    }
}
