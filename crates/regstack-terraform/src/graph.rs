//! Resource dependency graph.
//!
//! Edges come from references between declarations: a provider that reads
//! `google_iam_workload_identity_pool.x.workload_identity_pool_id` depends
//! on that pool.

use std::collections::{BTreeSet, HashMap};

use crate::error::{TerraformError, TerraformResult};

/// A declared node and the addresses it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub address: String,
    pub dependencies: BTreeSet<String>,
}

/// Dependency graph over engine addresses, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or merge dependencies into an existing one.
    pub fn add_node<I, S>(&mut self, address: impl Into<String>, dependencies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let address = address.into();
        let dependencies = dependencies.into_iter().map(Into::into);

        match self.nodes.iter_mut().find(|n| n.address == address) {
            Some(node) => node.dependencies.extend(dependencies),
            None => self.nodes.push(GraphNode {
                address,
                dependencies: dependencies.collect(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, address: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.address == address)
    }

    /// Addresses that depend directly on `address`.
    pub fn dependents(&self, address: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.dependencies.contains(address))
            .map(|n| n.address.as_str())
            .collect()
    }

    /// Check that every dependency is declared and that there are no cycles.
    pub fn validate(&self) -> TerraformResult<()> {
        for node in &self.nodes {
            if let Some(missing) = node
                .dependencies
                .iter()
                .find(|dep| self.node(dep).is_none())
            {
                return Err(TerraformError::MissingDependency {
                    node: node.address.clone(),
                    dependency: missing.clone(),
                });
            }
        }
        self.detect_cycle()
    }

    /// Detect cycles using DFS.
    fn detect_cycle(&self) -> TerraformResult<()> {
        let node_map = self.node_map();
        let mut visited = HashMap::new();
        let mut rec_stack = HashMap::new();

        for node in &self.nodes {
            if !visited.contains_key(node.address.as_str()) {
                if let Some(cycle) =
                    dfs_detect_cycle(&node.address, &node_map, &mut visited, &mut rec_stack)
                {
                    return Err(TerraformError::CycleDetected(cycle));
                }
            }
        }
        Ok(())
    }

    /// Addresses ordered so that every node follows its dependencies.
    ///
    /// Ties keep declaration order.
    pub fn topological_order(&self) -> TerraformResult<Vec<String>> {
        self.validate()?;

        let node_map = self.node_map();
        let mut visited = HashMap::new();
        let mut result = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            topo_visit(&node.address, &node_map, &mut visited, &mut result);
        }

        Ok(result)
    }

    fn node_map(&self) -> HashMap<&str, &GraphNode> {
        self.nodes.iter().map(|n| (n.address.as_str(), n)).collect()
    }
}

fn dfs_detect_cycle<'a>(
    node: &'a str,
    node_map: &HashMap<&'a str, &'a GraphNode>,
    visited: &mut HashMap<&'a str, bool>,
    rec_stack: &mut HashMap<&'a str, bool>,
) -> Option<String> {
    visited.insert(node, true);
    rec_stack.insert(node, true);

    if let Some(&graph_node) = node_map.get(node) {
        for dep in &graph_node.dependencies {
            let dep_str: &'a str = dep.as_str();
            if !visited.contains_key(dep_str) {
                if let Some(cycle) = dfs_detect_cycle(dep_str, node_map, visited, rec_stack) {
                    return Some(cycle);
                }
            } else if rec_stack.get(dep_str).copied().unwrap_or(false) {
                return Some(format!("{} -> {}", node, dep));
            }
        }
    }

    rec_stack.insert(node, false);
    None
}

fn topo_visit(
    address: &str,
    node_map: &HashMap<&str, &GraphNode>,
    visited: &mut HashMap<String, bool>,
    result: &mut Vec<String>,
) {
    if visited.get(address).copied().unwrap_or(false) {
        return;
    }

    visited.insert(address.to_string(), true);

    if let Some(node) = node_map.get(address) {
        for dep in &node.dependencies {
            topo_visit(dep, node_map, visited, result);
        }
    }

    result.push(address.to_string());
}
