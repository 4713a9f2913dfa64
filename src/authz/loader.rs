use std::path::Path;

use crate::authz::errors::AuthzError;
use crate::authz::policy::{parse_kdl_document, ParsedPolicy};
use crate::authz::registry::PolicyRegistry;

/// Load all `.kdl` policy files from the given directory into one registry.
/// Files are applied in path order, so later files append to earlier ones.
pub fn load_policies(dir: &Path) -> Result<PolicyRegistry, AuthzError> {
    if !dir.is_dir() {
        return Err(AuthzError::InvalidPolicy(format!(
            "policies directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut all_parsed = Vec::new();

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| AuthzError::PolicyLoadError {
                path: path.display().to_string(),
                source,
            })?;
        let parsed = parse_kdl_document(&contents).map_err(|e| match e {
            AuthzError::KdlParse(msg) => AuthzError::KdlParse(format!("{}: {msg}", path.display())),
            AuthzError::InvalidPolicy(msg) => {
                AuthzError::InvalidPolicy(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        all_parsed.push(parsed);
    }

    let file_count = all_parsed.len();
    let registry = compile_policies(&all_parsed);

    tracing::info!(
        files = file_count,
        resources = registry.len(),
        "Loaded authorization policies"
    );

    Ok(registry)
}

/// Merge parsed documents into a single registry.
pub fn compile_policies(parsed: &[ParsedPolicy]) -> PolicyRegistry {
    let mut registry = PolicyRegistry::new();
    for policy in parsed {
        policy.apply_to(&mut registry);
    }
    registry
}
