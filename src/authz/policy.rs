use kdl::{KdlDocument, KdlNode};

use crate::authz::errors::AuthzError;
use crate::authz::permission::PermissionRequirement;
use crate::authz::registry::PolicyRegistry;
use crate::authz::types::{Effect, Method, MethodScope, Requirement};

/// Declarations read from one KDL document, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPolicy {
    pub resources: Vec<ResourceDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDecl {
    pub resource_type: String,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    DenyAll(MethodScope),
    Rule {
        effect: Effect,
        requirement: Requirement,
        methods: MethodScope,
    },
}

impl ParsedPolicy {
    /// Replay every statement against the registry builder.
    pub fn apply_to(&self, registry: &mut PolicyRegistry) {
        for decl in &self.resources {
            let policy = registry.resource(&decl.resource_type);
            for statement in &decl.statements {
                match statement {
                    Statement::DenyAll(methods) => {
                        policy.deny_all(methods.clone());
                    }
                    Statement::Rule {
                        effect,
                        requirement,
                        methods,
                    } => {
                        let requirement = requirement.clone();
                        let methods = methods.clone();
                        match effect {
                            Effect::Require => policy.require(requirement, methods),
                            Effect::Deny => policy.deny(requirement, methods),
                            Effect::Exempt => policy.exempt(requirement, methods),
                        };
                    }
                }
            }
        }
    }
}

/// Parse a KDL document string into typed policy declarations.
pub fn parse_kdl_document(source: &str) -> Result<ParsedPolicy, AuthzError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| AuthzError::KdlParse(e.to_string()))?;

    let mut policy = ParsedPolicy::default();

    for node in doc.nodes() {
        match node.name().value() {
            "resource" => {
                let resource_type = first_string_arg(node).ok_or_else(|| {
                    AuthzError::InvalidPolicy(
                        "resource node requires a string argument (e.g. resource \"users\")".into(),
                    )
                })?;

                let mut statements = Vec::new();
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        statements.push(parse_statement(child, &resource_type)?);
                    }
                }

                policy.resources.push(ResourceDecl {
                    resource_type,
                    statements,
                });
            }
            other => {
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(policy)
}

fn parse_statement(node: &KdlNode, resource_type: &str) -> Result<Statement, AuthzError> {
    let methods = method_scope(node, resource_type)?;
    let effect = match node.name().value() {
        "deny-all" => return Ok(Statement::DenyAll(methods)),
        "require" => Effect::Require,
        "deny" => Effect::Deny,
        "exempt" => Effect::Exempt,
        other => {
            return Err(AuthzError::InvalidPolicy(format!(
                "unexpected child `{other}` in resource `{resource_type}` (expected `deny-all`, `require`, `deny` or `exempt`)"
            )));
        }
    };

    Ok(Statement::Rule {
        effect,
        requirement: parse_requirement(node, resource_type)?,
        methods,
    })
}

/// `require "role" "admin"`, `exempt "anonymous"`, ...
fn parse_requirement(node: &KdlNode, resource_type: &str) -> Result<Requirement, AuthzError> {
    let statement = node.name().value();
    let args = string_args(node);
    let Some(kind) = args.first().copied() else {
        return Err(AuthzError::InvalidPolicy(format!(
            "`{statement}` in resource `{resource_type}` requires a permission kind (e.g. {statement} \"role\" \"admin\")"
        )));
    };
    let name = args.get(1).copied();

    let named = |build: fn(String) -> PermissionRequirement| {
        name.map(|n| Requirement::from(build(n.to_string())))
            .ok_or_else(|| {
                AuthzError::InvalidPolicy(format!(
                    "`{statement} \"{kind}\"` in resource `{resource_type}` requires a name"
                ))
            })
    };

    match kind {
        "role" => named(PermissionRequirement::Role),
        "authority" => named(PermissionRequirement::Authority),
        "anonymous" => Ok(PermissionRequirement::Anonymous.into()),
        "denied" => Ok(PermissionRequirement::Denied.into()),
        other => {
            tracing::warn!(
                resource = resource_type,
                kind = other,
                "unsupported permission kind in policy"
            );
            Ok(Requirement::Unsupported {
                kind: other.to_string(),
            })
        }
    }
}

/// The `methods="GET POST"` property; absent means every method.
fn method_scope(node: &KdlNode, resource_type: &str) -> Result<MethodScope, AuthzError> {
    let Some(value) = node.get("methods") else {
        return Ok(MethodScope::All);
    };
    let raw = value.as_string().ok_or_else(|| {
        AuthzError::InvalidPolicy(format!(
            "`methods` in resource `{resource_type}` must be a string (e.g. methods=\"GET POST\")"
        ))
    })?;

    let methods = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Method>().map_err(|_| {
                AuthzError::InvalidPolicy(format!(
                    "unknown method `{s}` in resource `{resource_type}`"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if methods.is_empty() {
        return Err(AuthzError::InvalidPolicy(format!(
            "`methods` in resource `{resource_type}` lists no methods"
        )));
    }
    Ok(methods.into())
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &KdlNode) -> Option<String> {
    string_args(node).first().map(|s| s.to_string())
}

/// Positional string arguments, properties skipped.
fn string_args(node: &KdlNode) -> Vec<&str> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .collect()
}
