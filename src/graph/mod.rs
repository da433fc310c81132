//! Resource Graph (C8): dependency graph construction and topological
//! sort with cycle detection.
//!
//! No direct teacher analog — grounded in the generic two-mark DFS
//! algorithm the spec describes directly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::backend::StateBackend;
use crate::error::{Result, StateError};
use crate::model::Resource;

/// Where a node's `dependencies` edges come from when building a
/// graph: the resource's own embedded `dependencies` list, or C4's
/// separate `resource_dependencies` table. The spec leaves the choice
/// to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencySource {
    EmbeddedList,
    DependencyTable,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub r#type: String,
    pub name: String,
    pub state: String,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

pub struct ResourceGraph {
    backend: Arc<StateBackend>,
}

impl ResourceGraph {
    pub fn new(backend: Arc<StateBackend>) -> Self {
        Self { backend }
    }

    /// Builds the dependency/dependent graph for a stack. First pass
    /// creates one node per resource and fills in `dependencies` from
    /// `source`; second pass fills in `dependents` as the reverse
    /// mapping. Dependencies pointing outside the stack are kept (they
    /// just won't resolve to a node) so orphan detection elsewhere can
    /// still see them.
    pub fn build_graph(
        &self,
        stack_id: &str,
        source: DependencySource,
    ) -> Result<HashMap<String, GraphNode>> {
        let resources = self.backend.repository().list_resources(stack_id)?;
        let mut nodes: HashMap<String, GraphNode> = resources
            .iter()
            .map(|r| {
                (
                    r.id.clone(),
                    GraphNode {
                        id: r.id.clone(),
                        r#type: r.r#type.clone(),
                        name: r.name.clone(),
                        state: r.state.clone(),
                        dependencies: Vec::new(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for resource in &resources {
            let deps = match source {
                DependencySource::EmbeddedList => resource.dependencies.clone(),
                DependencySource::DependencyTable => self
                    .backend
                    .list_dependencies(&resource.id)?
                    .into_iter()
                    .map(|(depends_on_id, _)| depends_on_id)
                    .collect(),
            };
            if let Some(node) = nodes.get_mut(&resource.id) {
                node.dependencies = deps;
            }
        }

        let edges: Vec<(String, String)> = nodes
            .values()
            .flat_map(|n| n.dependencies.iter().map(move |d| (n.id.clone(), d.clone())))
            .collect();
        for (from, to) in edges {
            if let Some(target) = nodes.get_mut(&to) {
                target.dependents.push(from);
            }
        }

        Ok(nodes)
    }

    /// Returns the stack's resources in dependency-first order: a
    /// resource always appears after every resource it depends on.
    /// Depth-first search with permanent/temporary visit marks; a DFS
    /// re-entering a temporarily-marked node means a cycle, reported as
    /// `CircularDependency{node}`.
    pub fn topological_sort(&self, stack_id: &str) -> Result<Vec<Resource>> {
        let resources = self.backend.repository().list_resources(stack_id)?;
        let graph = self.build_graph(stack_id, DependencySource::EmbeddedList)?;
        let by_id: HashMap<String, Resource> =
            resources.into_iter().map(|r| (r.id.clone(), r)).collect();

        let mut permanent = HashSet::new();
        let mut temporary = HashSet::new();
        let mut order = Vec::new();

        let mut ids: Vec<&String> = graph.keys().collect();
        ids.sort();
        for id in ids {
            visit(id, &graph, &mut permanent, &mut temporary, &mut order)?;
        }

        Ok(order.into_iter().filter_map(|id| by_id.get(&id).cloned()).collect())
    }
}

fn visit(
    id: &str,
    graph: &HashMap<String, GraphNode>,
    permanent: &mut HashSet<String>,
    temporary: &mut HashSet<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    if permanent.contains(id) {
        return Ok(());
    }
    if temporary.contains(id) {
        return Err(StateError::CircularDependency { node: id.to_string() });
    }

    temporary.insert(id.to_string());
    if let Some(node) = graph.get(id) {
        for dep in &node.dependencies {
            if graph.contains_key(dep) {
                visit(dep, graph, permanent, temporary, order)?;
            }
        }
    }
    temporary.remove(id);
    permanent.insert(id.to_string());
    order.push(id.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StackRepository;
    use crate::store::Store;

    fn graph_with(edges: &[(&str, &[&str])]) -> ResourceGraph {
        let repo = Arc::new(StackRepository::new(Arc::new(Store::open_in_memory().unwrap())));
        repo.create_stack(&crate::model::Stack::new("s1", "alpha")).unwrap();
        for (id, _) in edges {
            repo.create_resource(&Resource::new(*id, "s1", "t", *id)).unwrap();
        }
        for (id, deps) in edges {
            let mut resource = repo.get_resource(id).unwrap().unwrap();
            resource.dependencies = deps.iter().map(|s| s.to_string()).collect();
            repo.update_resource(&resource).unwrap();
        }
        ResourceGraph::new(Arc::new(StateBackend::new(repo)))
    }

    #[test]
    fn builds_dependents_as_reverse_of_dependencies() {
        let graph = graph_with(&[("a", &["b"]), ("b", &[])]);
        let built = graph.build_graph("s1", DependencySource::EmbeddedList).unwrap();
        assert_eq!(built["a"].dependencies, vec!["b".to_string()]);
        assert_eq!(built["b"].dependents, vec!["a".to_string()]);
    }

    #[test]
    fn sorts_dependencies_before_dependents() {
        let graph = graph_with(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]);
        let order: Vec<String> = graph.topological_sort("s1").unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(order, vec!["c".to_string(), "b".to_string(), "a".to_string()]);
    }

    #[test]
    fn cycle_is_reported_as_circular_dependency() {
        let graph = graph_with(&[("a", &["b"]), ("b", &["a"])]);
        let err = graph.topological_sort("s1").unwrap_err();
        assert!(matches!(err, StateError::CircularDependency { .. }));
    }
}
