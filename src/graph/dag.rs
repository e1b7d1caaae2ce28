//! Directed acyclic graph over stage identities
//!
//! Thin wrapper around a petgraph `DiGraph` that keeps insertion order
//! so topological sorts and traversals are stable across runs. Callers
//! must not rely on any particular order among nodes that share no path;
//! the stability here exists for reproducible diagnostics, not as API.

use crate::error::{DocforgeError, DocforgeResult};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct Dag<T>
where
    T: Clone + Eq + Hash + Display,
{
    graph: DiGraph<T, ()>,
    index: HashMap<T, NodeIndex>,
    order: Vec<NodeIndex>,
}

impl<T> Default for Dag<T>
where
    T: Clone + Eq + Hash + Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Dag<T>
where
    T: Clone + Eq + Hash + Display,
{
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Add a node, returning its index. Adding an existing node is a
    /// no-op that returns the original index.
    pub fn add(&mut self, value: T) -> NodeIndex {
        if let Some(&idx) = self.index.get(&value) {
            return idx;
        }
        let idx = self.graph.add_node(value.clone());
        self.index.insert(value, idx);
        self.order.push(idx);
        idx
    }

    /// Add a directed edge `from -> to`. Indices must come from [`add`].
    pub fn link(&mut self, from: NodeIndex, to: NodeIndex) {
        self.graph.add_edge(from, to, ());
    }

    pub fn contains(&self, value: &T) -> bool {
        self.index.contains_key(value)
    }

    /// Position of each node in insertion order, used as the stable
    /// tie-break wherever multiple nodes are equally eligible.
    fn positions(&self) -> HashMap<NodeIndex, usize> {
        self.order
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (idx, pos))
            .collect()
    }

    /// Kahn's algorithm with insertion-order tie-breaking.
    ///
    /// Returns the node values in a valid execution order, or a cycle
    /// error naming one of the nodes still blocked when the sort stalls.
    pub fn toposort(&self) -> DocforgeResult<Vec<T>> {
        let positions = self.positions();

        let mut in_degree: HashMap<NodeIndex, usize> =
            self.graph.node_indices().map(|idx| (idx, 0)).collect();
        for edge in self.graph.edge_references() {
            *in_degree.entry(edge.target()).or_insert(0) += 1;
        }

        let mut queue: VecDeque<NodeIndex> = self
            .order
            .iter()
            .filter(|idx| in_degree.get(idx).copied().unwrap_or(0) == 0)
            .copied()
            .collect();

        let mut sorted = Vec::with_capacity(self.graph.node_count());
        while let Some(idx) = queue.pop_front() {
            if let Some(value) = self.graph.node_weight(idx) {
                sorted.push(value.clone());
            }

            let mut next: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();
            next.sort_by_key(|n| positions.get(n).copied().unwrap_or(usize::MAX));

            for neighbor in next {
                if let Some(deg) = in_degree.get_mut(&neighbor) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        if sorted.len() != self.graph.node_count() {
            let blocked = self
                .order
                .iter()
                .find(|idx| in_degree.get(idx).copied().unwrap_or(0) > 0)
                .and_then(|&idx| self.graph.node_weight(idx))
                .map_or_else(|| "unknown".to_string(), ToString::to_string);
            return Err(DocforgeError::StageCycle { stage: blocked });
        }

        Ok(sorted)
    }

    /// Every node reachable by following edges out of `value`, in a
    /// stable order. Used to propagate an upstream failure to the whole
    /// dependent subtree.
    pub fn transitive_dependents(&self, value: &T) -> Vec<T> {
        let Some(&start) = self.index.get(value) else {
            return Vec::new();
        };

        let positions = self.positions();
        let mut seen: HashMap<NodeIndex, ()> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        while let Some(idx) = queue.pop_front() {
            for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if seen.insert(neighbor, ()).is_none() {
                    queue.push_back(neighbor);
                }
            }
        }

        let mut result: Vec<NodeIndex> = seen.into_keys().collect();
        result.sort_by_key(|n| positions.get(n).copied().unwrap_or(usize::MAX));
        result
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx).cloned())
            .collect()
    }
}
