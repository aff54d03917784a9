//! Resource declarations and the per-run declaration set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stratus_id::ResourceName;

use crate::{collect_references, DeclError, Reference, SpecHash};

/// Drift policy when provider-observed state diverges from desired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveConflicts {
    /// Re-apply the declared properties over the observed state.
    #[default]
    Overwrite,
    /// Record the drift but leave the resource alone.
    Ignore,
}

/// A declared desired resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Stack-unique logical name.
    pub name: ResourceName,

    /// Provider adapter kind (e.g. `iam-role`, `cluster`, `add-on`).
    pub kind: String,

    /// Desired properties: a JSON object whose string values may embed
    /// `${resource.output}` reference markers.
    pub properties: serde_json::Value,

    /// Explicit ordering dependencies, independent of data references.
    #[serde(default)]
    pub depends_on: Vec<ResourceName>,

    /// Drift policy for this resource.
    #[serde(default)]
    pub resolve_conflicts: ResolveConflicts,

    /// Per-resource provisioning timeout override, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ResourceDecl {
    /// All reference markers inside this resource's properties.
    pub fn references(&self) -> Result<Vec<Reference>, DeclError> {
        collect_references(&self.properties)
    }

    /// Deterministic hash over everything that defines this resource.
    ///
    /// References are hashed as markers, so a dependent's hash changes
    /// only when its own declaration changes, not when the referenced
    /// output does.
    pub fn spec_hash(&self) -> SpecHash {
        let mut depends: Vec<&str> = self.depends_on.iter().map(|d| d.as_str()).collect();
        depends.sort_unstable();
        SpecHash::from_json(&serde_json::json!({
            "kind": self.kind,
            "properties": self.properties,
            "depends_on": depends,
            "resolve_conflicts": self.resolve_conflicts,
        }))
    }
}

/// The full desired-state input of a run.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Stack name this declaration belongs to.
    pub stack: String,

    resources: BTreeMap<ResourceName, ResourceDecl>,
}

impl Declaration {
    /// Build a declaration, rejecting duplicate resource names.
    pub fn new(stack: impl Into<String>, decls: Vec<ResourceDecl>) -> Result<Self, DeclError> {
        let mut resources = BTreeMap::new();
        for decl in decls {
            let name = decl.name.clone();
            if resources.insert(name.clone(), decl).is_some() {
                return Err(DeclError::DuplicateResource(name.to_string()));
            }
        }
        Ok(Self {
            stack: stack.into(),
            resources,
        })
    }

    /// Look up a resource by name.
    pub fn get(&self, name: &ResourceName) -> Option<&ResourceDecl> {
        self.resources.get(name)
    }

    /// Iterate resources in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDecl> {
        self.resources.values()
    }

    /// All resource names, in order.
    pub fn names(&self) -> impl Iterator<Item = &ResourceName> {
        self.resources.keys()
    }

    /// Number of declared resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// True when the declaration is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// True when the declaration contains `name`.
    pub fn contains(&self, name: &ResourceName) -> bool {
        self.resources.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str) -> ResourceDecl {
        ResourceDecl {
            name: ResourceName::parse(name).unwrap(),
            kind: "iam-role".to_string(),
            properties: serde_json::json!({}),
            depends_on: vec![],
            resolve_conflicts: ResolveConflicts::default(),
            timeout_secs: None,
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Declaration::new("s", vec![decl("a"), decl("a")]).unwrap_err();
        assert!(matches!(err, DeclError::DuplicateResource(_)));
    }

    #[test]
    fn test_iteration_is_name_ordered() {
        let d = Declaration::new("s", vec![decl("b"), decl("a"), decl("c")]).unwrap();
        let names: Vec<_> = d.names().map(|n| n.as_str().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_spec_hash_ignores_depends_on_order() {
        let mut a = decl("a");
        a.depends_on = vec![
            ResourceName::parse("x").unwrap(),
            ResourceName::parse("y").unwrap(),
        ];
        let mut b = decl("a");
        b.depends_on = vec![
            ResourceName::parse("y").unwrap(),
            ResourceName::parse("x").unwrap(),
        ];
        assert_eq!(a.spec_hash(), b.spec_hash());
    }

    #[test]
    fn test_spec_hash_changes_with_properties() {
        let mut a = decl("a");
        a.properties = serde_json::json!({"v": 1});
        let mut b = decl("a");
        b.properties = serde_json::json!({"v": 2});
        assert_ne!(a.spec_hash(), b.spec_hash());
    }
}
