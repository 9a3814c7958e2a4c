use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// A directed link. `a -> b` and `b -> a` are independent edges.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Edge {
    /// Messages sent over this edge so far.
    pub messages: u64,
    /// Messages sent over this edge that have not arrived yet.
    pub in_flight: u64,
}

/// Edges added and removed by one connectivity pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityUpdate {
    pub connections: usize,
    pub disconnections: usize,
}

impl ConnectivityUpdate {
    pub fn total(&self) -> usize {
        self.connections + self.disconnections
    }
}

/// Directed connectivity graph keyed by `(from, to)`.
#[derive(Debug, Default, Clone)]
pub struct TopologyGraph {
    edges: BTreeMap<(NodeId, NodeId), Edge>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the edge already existed. Self-loops are rejected.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        if from == to || self.edges.contains_key(&(from, to)) {
            return false;
        }
        self.edges.insert((from, to), Edge::default());
        true
    }

    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Option<Edge> {
        self.edges.remove(&(from, to))
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.contains_key(&(from, to))
    }

    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&Edge> {
        self.edges.get(&(from, to))
    }

    pub fn edge_mut(&mut self, from: NodeId, to: NodeId) -> Option<&mut Edge> {
        self.edges.get_mut(&(from, to))
    }

    /// Outgoing neighbors of `id`, ascending.
    pub fn out_neighbors(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .range((id, NodeId::MIN)..=(id, NodeId::MAX))
            .map(|(&(_, to), _)| to)
            .collect()
    }

    /// Drop every edge touching `id`, returning the removed `(from, to)` keys.
    pub fn remove_node(&mut self, id: NodeId) -> Vec<(NodeId, NodeId)> {
        let removed: Vec<_> = self
            .edges
            .keys()
            .filter(|(from, to)| *from == id || *to == id)
            .copied()
            .collect();
        for key in &removed {
            self.edges.remove(key);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId, &Edge)> {
        self.edges.iter().map(|(&(from, to), edge)| (from, to, edge))
    }
}
