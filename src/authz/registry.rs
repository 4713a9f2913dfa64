use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::authz::types::{Effect, Method, MethodScope, Requirement, RequirementSet};

/// Requirement sets declared for one resource type, keyed by method.
#[derive(Debug, Clone, Default)]
pub struct ResourcePolicy {
    sets: BTreeMap<Method, RequirementSet>,
    /// Methods whose set is still the `{Denied}` left by `deny_all`.
    placeholders: BTreeSet<Method>,
}

impl ResourcePolicy {
    /// Replace the set of every method in scope with `{Denied}`.
    ///
    /// The `{Denied}` set is a default: a later `require` on the same method
    /// replaces it, while `deny` and `exempt` are added next to it.
    pub fn deny_all(&mut self, methods: impl Into<MethodScope>) -> &mut Self {
        for method in methods.into().methods() {
            self.sets.insert(method, RequirementSet::denied());
            self.placeholders.insert(method);
        }
        self
    }

    /// Caller must satisfy `requirement` (or another plain requirement of the set).
    pub fn require(
        &mut self,
        requirement: impl Into<Requirement>,
        methods: impl Into<MethodScope>,
    ) -> &mut Self {
        let scope = methods.into();
        for method in scope.methods() {
            if self.placeholders.remove(&method) {
                if let Some(set) = self.sets.get_mut(&method) {
                    set.remove_default_denial();
                }
            }
        }
        self.append(Effect::Require, requirement.into(), scope)
    }

    /// Callers satisfying `requirement` are refused.
    pub fn deny(
        &mut self,
        requirement: impl Into<Requirement>,
        methods: impl Into<MethodScope>,
    ) -> &mut Self {
        self.append(Effect::Deny, requirement.into(), methods.into())
    }

    /// Callers satisfying `requirement` are let through without further checks.
    pub fn exempt(
        &mut self,
        requirement: impl Into<Requirement>,
        methods: impl Into<MethodScope>,
    ) -> &mut Self {
        self.append(Effect::Exempt, requirement.into(), methods.into())
    }

    pub fn get(&self, method: Method) -> Option<&RequirementSet> {
        self.sets.get(&method)
    }

    pub fn sets(&self) -> &BTreeMap<Method, RequirementSet> {
        &self.sets
    }

    fn append(
        &mut self,
        effect: Effect,
        requirement: Requirement,
        scope: MethodScope,
    ) -> &mut Self {
        for method in scope.methods() {
            self.sets
                .entry(method)
                .or_default()
                .push(effect, requirement.clone());
        }
        self
    }
}

/// (resource type, method) -> requirement set.
///
/// Mutated only while the service is being assembled; afterwards it lives
/// inside the shared `AuthzState` and is read-only.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    resources: HashMap<String, ResourcePolicy>,
}

static UNRESTRICTED: RequirementSet = RequirementSet::new();

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declaration handle for `resource_type`, created on first use.
    pub fn resource(&mut self, resource_type: &str) -> &mut ResourcePolicy {
        self.resources.entry(resource_type.to_string()).or_default()
    }

    /// The set guarding (resource_type, method); empty when nothing was declared.
    pub fn resolve(&self, resource_type: &str, method: Method) -> &RequirementSet {
        self.resources
            .get(resource_type)
            .and_then(|policy| policy.get(method))
            .unwrap_or(&UNRESTRICTED)
    }

    pub fn policy(&self, resource_type: &str) -> Option<&ResourcePolicy> {
        self.resources.get(resource_type)
    }

    /// Declared resource types, sorted.
    pub fn resources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
