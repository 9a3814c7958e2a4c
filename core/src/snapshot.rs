use serde::{Deserialize, Serialize};

use crate::engine::Simulation;
use crate::node::{Color, NodeId};
use crate::position::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeId,
    pub kind: String,
    pub position: Position,
    pub color: Color,
    pub size: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub from: NodeId,
    pub to: NodeId,
    pub messages: u64,
    pub in_flight: u64,
}

/// Read-only copy of the observable simulation state, cheap to hand across
/// threads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: u64,
    pub is_running: bool,
    pub is_even_round: bool,
    pub messages_this_round: u64,
    pub messages_over_all: u64,
    pub packets_in_flight: usize,
    pub pending_events: usize,
    pub round_log: Vec<String>,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

impl Simulation {
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state();
        Snapshot {
            time: state.current_time,
            is_running: state.is_running,
            is_even_round: state.is_even_round,
            messages_this_round: state.number_of_messages_in_this_round,
            messages_over_all: state.number_of_messages_over_all,
            packets_in_flight: self.packets_in_flight(),
            pending_events: self.pending_events(),
            round_log: state.round_log.clone(),
            nodes: self
                .nodes()
                .map(|node| NodeView {
                    id: node.id(),
                    kind: node.kind().to_string(),
                    position: node.position(),
                    color: node.color(),
                    size: node.size(),
                    intensity: node.intensity(),
                })
                .collect(),
            edges: self
                .graph()
                .iter()
                .map(|(from, to, edge)| EdgeView {
                    from,
                    to,
                    messages: edge.messages,
                    in_flight: edge.in_flight,
                })
                .collect(),
        }
    }
}
