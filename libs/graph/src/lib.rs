//! Dependency graph construction for stratus declarations.
//!
//! Nodes are declared resources; edges are the union of:
//!
//! - explicit `depends_on` entries, and
//! - data references inferred from `${resource.output}` markers.
//!
//! # Invariants
//!
//! - The graph is acyclic; a cycle is a configuration error detected
//!   before any provisioning begins.
//! - Every edge target names a declared resource (`UnknownReference`
//!   otherwise).
//! - All iteration is name-ordered, so traversal order, reported
//!   cycles, and topological order are stable across runs.

use std::collections::{BTreeMap, BTreeSet};

use stratus_decl::{DeclError, Declaration};
use stratus_id::ResourceName;
use thiserror::Error;

/// Errors from graph construction.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The declaration contains a dependency cycle.
    ///
    /// The cycle path is reported in order, first node repeated last.
    #[error("cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<ResourceName> },

    /// An edge points at a resource that is not declared.
    #[error("resource '{from}' depends on unknown resource '{to}'")]
    UnknownReference {
        from: ResourceName,
        to: ResourceName,
    },

    /// A property value carried a malformed reference marker.
    #[error(transparent)]
    Decl(#[from] DeclError),
}

fn format_cycle(cycle: &[ResourceName]) -> String {
    cycle
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// The dependency graph of one declaration.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// node -> the nodes it depends on.
    dependencies: BTreeMap<ResourceName, BTreeSet<ResourceName>>,
    /// node -> the nodes that depend on it.
    dependents: BTreeMap<ResourceName, BTreeSet<ResourceName>>,
}

impl DependencyGraph {
    /// Build the graph from a declaration.
    ///
    /// Fails with [`GraphError::UnknownReference`] when an edge names
    /// an undeclared resource and [`GraphError::CyclicDependency`]
    /// when the edge set contains a cycle. Both are detected here,
    /// before any provider is invoked.
    pub fn build(decl: &Declaration) -> Result<Self, GraphError> {
        let mut dependencies: BTreeMap<ResourceName, BTreeSet<ResourceName>> = BTreeMap::new();
        let mut dependents: BTreeMap<ResourceName, BTreeSet<ResourceName>> = BTreeMap::new();

        for name in decl.names() {
            dependencies.entry(name.clone()).or_default();
            dependents.entry(name.clone()).or_default();
        }

        for resource in decl.iter() {
            let mut targets = BTreeSet::new();
            for dep in &resource.depends_on {
                targets.insert(dep.clone());
            }
            for reference in resource.references()? {
                targets.insert(reference.resource);
            }

            for target in targets {
                if target == resource.name {
                    return Err(GraphError::CyclicDependency {
                        cycle: vec![resource.name.clone(), resource.name.clone()],
                    });
                }
                if !decl.contains(&target) {
                    return Err(GraphError::UnknownReference {
                        from: resource.name.clone(),
                        to: target,
                    });
                }
                dependents
                    .get_mut(&target)
                    .unwrap()
                    .insert(resource.name.clone());
                dependencies
                    .get_mut(&resource.name)
                    .unwrap()
                    .insert(target);
            }
        }

        let graph = Self {
            dependencies,
            dependents,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// DFS with recursion-stack coloring; reports the first cycle
    /// found in name order.
    fn check_acyclic(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: BTreeMap<&ResourceName, Color> =
            self.dependencies.keys().map(|n| (n, Color::White)).collect();

        for start in self.dependencies.keys() {
            if color[start] != Color::White {
                continue;
            }
            // Iterative DFS keeps deep graphs off the call stack.
            let mut stack: Vec<&ResourceName> = vec![start];
            let mut path: Vec<&ResourceName> = Vec::new();
            while let Some(&node) = stack.last() {
                if color[node] == Color::White {
                    color.insert(node, Color::Gray);
                    path.push(node);
                    for next in self.dependencies[node].iter().rev() {
                        match color[&next] {
                            Color::Gray => {
                                let pos = path.iter().position(|n| *n == next).unwrap_or(0);
                                let mut cycle: Vec<ResourceName> =
                                    path[pos..].iter().map(|n| (*n).clone()).collect();
                                cycle.push(next.clone());
                                return Err(GraphError::CyclicDependency { cycle });
                            }
                            Color::White => stack.push(next),
                            Color::Black => {}
                        }
                    }
                } else {
                    stack.pop();
                    if color[node] == Color::Gray {
                        color.insert(node, Color::Black);
                        path.pop();
                    }
                }
            }
        }
        Ok(())
    }

    /// The direct dependencies of `name`.
    pub fn dependencies(&self, name: &ResourceName) -> &BTreeSet<ResourceName> {
        static EMPTY: std::sync::OnceLock<BTreeSet<ResourceName>> = std::sync::OnceLock::new();
        self.dependencies
            .get(name)
            .unwrap_or_else(|| EMPTY.get_or_init(BTreeSet::new))
    }

    /// The direct dependents of `name`.
    pub fn dependents(&self, name: &ResourceName) -> &BTreeSet<ResourceName> {
        static EMPTY: std::sync::OnceLock<BTreeSet<ResourceName>> = std::sync::OnceLock::new();
        self.dependents
            .get(name)
            .unwrap_or_else(|| EMPTY.get_or_init(BTreeSet::new))
    }

    /// Every node reachable from `name` via dependent edges.
    ///
    /// Used to mark the blast radius of a failed node.
    pub fn transitive_dependents(&self, name: &ResourceName) -> BTreeSet<ResourceName> {
        let mut out = BTreeSet::new();
        let mut queue: Vec<&ResourceName> = self.dependents(name).iter().collect();
        while let Some(node) = queue.pop() {
            if out.insert(node.clone()) {
                queue.extend(self.dependents(node).iter());
            }
        }
        out
    }

    /// Nodes with no dependencies, in name order.
    pub fn roots(&self) -> Vec<ResourceName> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Deterministic topological order (Kahn's algorithm with a
    /// name-ordered ready set).
    pub fn topo_order(&self) -> Vec<ResourceName> {
        let mut indegree: BTreeMap<&ResourceName, usize> = self
            .dependencies
            .iter()
            .map(|(n, deps)| (n, deps.len()))
            .collect();
        let mut ready: BTreeSet<&ResourceName> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();

        let mut order = Vec::with_capacity(indegree.len());
        while let Some(node) = ready.pop_first() {
            order.push(node.clone());
            for dependent in self.dependents(node) {
                let d = indegree.get_mut(dependent).unwrap();
                *d -= 1;
                if *d == 0 {
                    ready.insert(dependent);
                }
            }
        }
        order
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// True when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// All node names in order.
    pub fn names(&self) -> impl Iterator<Item = &ResourceName> {
        self.dependencies.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_decl::{ResolveConflicts, ResourceDecl};

    fn name(s: &str) -> ResourceName {
        ResourceName::parse(s).unwrap()
    }

    fn decl(n: &str, depends_on: &[&str], properties: serde_json::Value) -> ResourceDecl {
        ResourceDecl {
            name: name(n),
            kind: "iam-role".to_string(),
            properties,
            depends_on: depends_on.iter().map(|d| name(d)).collect(),
            resolve_conflicts: ResolveConflicts::default(),
            timeout_secs: None,
        }
    }

    fn declaration(decls: Vec<ResourceDecl>) -> Declaration {
        Declaration::new("test", decls).unwrap()
    }

    #[test]
    fn test_edges_are_union_of_explicit_and_references() {
        let d = declaration(vec![
            decl("roleA", &[], serde_json::json!({})),
            decl("clusterB", &["roleA"], serde_json::json!({})),
            decl(
                "addonC",
                &["clusterB"],
                serde_json::json!({"endpoint": "${clusterB.endpoint_url}", "role": "${roleA.arn}"}),
            ),
        ]);
        let g = DependencyGraph::build(&d).unwrap();

        let deps: Vec<_> = g
            .dependencies(&name("addonC"))
            .iter()
            .map(|n| n.as_str().to_string())
            .collect();
        assert_eq!(deps, vec!["clusterB", "roleA"]);
        assert!(g.dependents(&name("roleA")).contains(&name("clusterB")));
        assert!(g.dependents(&name("roleA")).contains(&name("addonC")));
    }

    #[test]
    fn test_unknown_explicit_dependency() {
        let d = declaration(vec![decl("a", &["ghost"], serde_json::json!({}))]);
        let err = DependencyGraph::build(&d).unwrap_err();
        match err {
            GraphError::UnknownReference { from, to } => {
                assert_eq!(from.as_str(), "a");
                assert_eq!(to.as_str(), "ghost");
            }
            other => panic!("expected UnknownReference, got {other}"),
        }
    }

    #[test]
    fn test_unknown_data_reference() {
        let d = declaration(vec![decl(
            "a",
            &[],
            serde_json::json!({"p": "${ghost.arn}"}),
        )]);
        assert!(matches!(
            DependencyGraph::build(&d).unwrap_err(),
            GraphError::UnknownReference { .. }
        ));
    }

    #[test]
    fn test_cycle_detected_and_named() {
        let d = declaration(vec![
            decl("a", &["c"], serde_json::json!({})),
            decl("b", &["a"], serde_json::json!({})),
            decl("c", &["b"], serde_json::json!({})),
        ]);
        let err = DependencyGraph::build(&d).unwrap_err();
        match err {
            GraphError::CyclicDependency { cycle } => {
                assert!(cycle.len() >= 3);
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("expected CyclicDependency, got {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let d = declaration(vec![decl("a", &["a"], serde_json::json!({}))]);
        assert!(matches!(
            DependencyGraph::build(&d).unwrap_err(),
            GraphError::CyclicDependency { .. }
        ));
    }

    #[test]
    fn test_reference_cycle_detected() {
        let d = declaration(vec![
            decl("a", &[], serde_json::json!({"p": "${b.out}"})),
            decl("b", &[], serde_json::json!({"p": "${a.out}"})),
        ]);
        assert!(matches!(
            DependencyGraph::build(&d).unwrap_err(),
            GraphError::CyclicDependency { .. }
        ));
    }

    #[test]
    fn test_topo_order_is_deterministic_and_valid() {
        let d = declaration(vec![
            decl("z", &[], serde_json::json!({})),
            decl("m", &["z"], serde_json::json!({})),
            decl("a", &["z"], serde_json::json!({})),
            decl("end", &["a", "m"], serde_json::json!({})),
        ]);
        let g = DependencyGraph::build(&d).unwrap();
        let order: Vec<_> = g
            .topo_order()
            .iter()
            .map(|n| n.as_str().to_string())
            .collect();
        // z first, then a/m in name order, end last.
        assert_eq!(order, vec!["z", "a", "m", "end"]);
    }

    #[test]
    fn test_transitive_dependents() {
        let d = declaration(vec![
            decl("roleA", &[], serde_json::json!({})),
            decl("clusterB", &["roleA"], serde_json::json!({})),
            decl("addonC", &["clusterB"], serde_json::json!({})),
            decl("island", &[], serde_json::json!({})),
        ]);
        let g = DependencyGraph::build(&d).unwrap();
        let blast = g.transitive_dependents(&name("roleA"));
        assert!(blast.contains(&name("clusterB")));
        assert!(blast.contains(&name("addonC")));
        assert!(!blast.contains(&name("island")));
    }

    #[test]
    fn test_roots() {
        let d = declaration(vec![
            decl("b", &["a"], serde_json::json!({})),
            decl("a", &[], serde_json::json!({})),
            decl("c", &[], serde_json::json!({})),
        ]);
        let g = DependencyGraph::build(&d).unwrap();
        let roots: Vec<_> = g.roots().iter().map(|n| n.as_str().to_string()).collect();
        assert_eq!(roots, vec!["a", "c"]);
    }
}
