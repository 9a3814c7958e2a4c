use std::collections::BTreeMap;

use crate::message::{PacketArena, PacketHandle};
use crate::models::ModelEnv;
use crate::node::{Node, NodeId};

/// Handles of every tracked packet still in transit.
///
/// Multicast copies of one broadcast are tracked once as active (the copy
/// arriving last) and the rest as passive. Both lists are tested for
/// interference.
#[derive(Debug, Default)]
pub struct PacketsInTheAir {
    active: Vec<PacketHandle>,
    passive: Vec<PacketHandle>,
}

impl PacketsInTheAir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handle: PacketHandle, passive: bool) {
        if passive {
            self.passive.push(handle);
        } else {
            self.active.push(handle);
        }
    }

    pub fn upgrade_to_active(&mut self, handle: PacketHandle) {
        if let Some(i) = self.passive.iter().position(|h| *h == handle) {
            self.passive.swap_remove(i);
            self.active.push(handle);
        }
    }

    pub fn remove(&mut self, handle: PacketHandle) -> bool {
        if let Some(i) = self.active.iter().position(|h| *h == handle) {
            self.active.swap_remove(i);
            return true;
        }
        if let Some(i) = self.passive.iter().position(|h| *h == handle) {
            self.passive.swap_remove(i);
            return true;
        }
        false
    }

    pub fn contains(&self, handle: PacketHandle) -> bool {
        self.active.contains(&handle) || self.passive.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.passive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn passive_len(&self) -> usize {
        self.passive.len()
    }

    pub fn handles(&self) -> impl Iterator<Item = PacketHandle> + '_ {
        self.active.iter().chain(self.passive.iter()).copied()
    }

    /// Ask each positive packet's destination interference model whether it
    /// is disturbed and deny the ones that are. Returns how many were denied.
    pub fn test_interference(
        &self,
        arena: &mut PacketArena,
        nodes: &BTreeMap<NodeId, Node>,
        env: &mut ModelEnv<'_>,
    ) -> usize {
        let mut denied = 0;
        for handle in self.handles() {
            let Some(packet) = arena.get(handle) else {
                continue;
            };
            if !packet.positive_delivery() {
                continue;
            }
            let disturbed = nodes
                .get(&packet.destination())
                .map(|node| node.models.interference.is_disturbed(packet, env))
                .unwrap_or(false);
            if disturbed {
                if let Some(packet) = arena.get_mut(handle) {
                    packet.deny_delivery();
                    denied += 1;
                }
            }
        }
        denied
    }

    /// Deny every tracked packet travelling over `from -> to`, which is
    /// about to disappear from the graph.
    pub fn deny_from_edge(&self, arena: &mut PacketArena, from: NodeId, to: NodeId) -> usize {
        let mut denied = 0;
        for handle in self.handles() {
            let Some(packet) = arena.get_mut(handle) else {
                continue;
            };
            if packet.origin() != from || packet.destination() != to {
                continue;
            }
            packet.on_edge = false;
            if packet.positive_delivery() {
                packet.deny_delivery();
                denied += 1;
            }
        }
        denied
    }

    /// Drop handles whose packet no longer exists.
    pub fn retain_live(&mut self, arena: &PacketArena) {
        self.active.retain(|h| arena.contains(*h));
        self.passive.retain(|h| arena.contains(*h));
    }
}
