use rand::rngs::StdRng;

use crate::config::{NodeGroup, SimConfig};
use crate::engine::{Simulation, Tracking};
use crate::error::{SimError, SimResult};
use crate::global::GlobalState;
use crate::message::{Message, PacketKind};
use crate::node::{Color, Node, NodeId, NodeModels};
use crate::position::Position;
use crate::timer::{absolute_fire_time, relative_fire_time};
use crate::traits::{NodeBehavior, Timer};

/// Handle passed to every hook and timer.
///
/// Bound to a node for node hooks and node timers, and to no node for the
/// custom global and global timers. Node-scoped operations on an unbound
/// context fail with [`SimError::MissingTimerOwner`].
pub struct Context<'a> {
    sim: &'a mut Simulation,
    node: Option<NodeId>,
}

impl<'a> Context<'a> {
    pub(crate) fn for_node(sim: &'a mut Simulation, id: NodeId) -> Self {
        Self { sim, node: Some(id) }
    }

    pub(crate) fn global(sim: &'a mut Simulation) -> Self {
        Self { sim, node: None }
    }

    pub fn node_id(&self) -> SimResult<NodeId> {
        self.node.ok_or(SimError::MissingTimerOwner)
    }

    pub fn owner(&self) -> Option<NodeId> {
        self.node
    }

    pub fn current_time(&self) -> u64 {
        self.sim.state.current_time
    }

    pub fn state(&self) -> &GlobalState {
        &self.sim.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.sim.config
    }

    /// Read-only view of the whole simulation.
    pub fn simulation(&self) -> &Simulation {
        &*self.sim
    }

    /// The node this context is bound to.
    pub fn node(&self) -> SimResult<&Node> {
        let id = self.node_id()?;
        self.sim.nodes.get(&id).ok_or(SimError::NodeNotFound(id))
    }

    fn node_mut(&mut self) -> SimResult<&mut Node> {
        let id = self.node_id()?;
        self.sim.nodes.get_mut(&id).ok_or(SimError::NodeNotFound(id))
    }

    pub fn position(&self) -> SimResult<Position> {
        self.node().map(Node::position)
    }

    /// Outgoing neighbors of the bound node.
    pub fn neighbors(&self) -> SimResult<Vec<NodeId>> {
        Ok(self.sim.graph.out_neighbors(self.node_id()?))
    }

    pub fn send(&mut self, message: &dyn Message, destination: NodeId) -> SimResult<()> {
        let intensity = self.node()?.intensity();
        self.send_with_intensity(message, destination, intensity)
    }

    pub fn send_with_intensity(
        &mut self,
        message: &dyn Message,
        destination: NodeId,
        intensity: f64,
    ) -> SimResult<()> {
        let origin = self.node_id()?;
        self.sim
            .send_packet(
                origin,
                destination,
                message.clone_message(),
                PacketKind::Unicast,
                intensity,
                Tracking::Active,
            )
            .map(|_| ())
    }

    pub fn broadcast(&mut self, message: &dyn Message) -> SimResult<()> {
        let intensity = self.node()?.intensity();
        self.broadcast_with_intensity(message, intensity)
    }

    pub fn broadcast_with_intensity(&mut self, message: &dyn Message, intensity: f64) -> SimResult<()> {
        let origin = self.node_id()?;
        self.sim.broadcast_from(origin, message, intensity)
    }

    /// Deliver to any node regardless of topology, reliability and
    /// interference.
    pub fn send_direct(&mut self, message: &dyn Message, destination: NodeId) -> SimResult<()> {
        let origin = self.node_id()?;
        let intensity = self.node()?.intensity();
        self.sim
            .send_packet(
                origin,
                destination,
                message.clone_message(),
                PacketKind::Unicast,
                intensity,
                Tracking::Untracked,
            )
            .map(|_| ())
    }

    /// Start a timer owned by the bound node, firing `delay` ticks from now.
    pub fn start_timer(&mut self, timer: impl Timer + 'static, delay: i64) -> SimResult<()> {
        let owner = self.node_id()?;
        let at = relative_fire_time(self.sim.state.current_time, delay)?;
        self.sim.schedule_timer(Some(owner), Box::new(timer), at)
    }

    pub fn start_timer_at(&mut self, timer: impl Timer + 'static, at: u64) -> SimResult<()> {
        let owner = self.node_id()?;
        let at = absolute_fire_time(self.sim.state.current_time, at)?;
        self.sim.schedule_timer(Some(owner), Box::new(timer), at)
    }

    pub fn start_global_timer(&mut self, timer: impl Timer + 'static, delay: i64) -> SimResult<()> {
        self.sim.start_global_timer(timer, delay)
    }

    pub fn set_color(&mut self, color: Color) -> SimResult<()> {
        self.node_mut()?.set_color(color);
        Ok(())
    }

    pub fn set_size(&mut self, size: f64) -> SimResult<()> {
        self.node_mut()?.set_size(size);
        Ok(())
    }

    pub fn set_intensity(&mut self, intensity: f64) -> SimResult<()> {
        self.node_mut()?.set_intensity(intensity);
        Ok(())
    }

    /// Append a line to this round's log.
    pub fn log(&mut self, line: impl Into<String>) {
        self.sim.state.round_log.push(line.into());
    }

    /// The simulation's single random source.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.sim.rng
    }

    pub fn request_stop(&mut self) {
        self.sim.request_stop();
    }

    pub fn add_node(
        &mut self,
        behavior: Box<dyn NodeBehavior>,
        models: NodeModels,
        position: Position,
    ) -> SimResult<NodeId> {
        self.sim.add_node(behavior, models, position)
    }

    pub fn add_nodes(&mut self, group: &NodeGroup) -> SimResult<Vec<NodeId>> {
        self.sim.add_nodes(group)
    }

    pub fn remove_node(&mut self, id: NodeId) -> SimResult<()> {
        self.sim.remove_node(id)
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> SimResult<bool> {
        self.sim.add_edge(from, to)
    }

    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> SimResult<()> {
        self.sim.remove_edge(from, to)
    }

    pub fn set_position(&mut self, id: NodeId, position: Position) -> SimResult<()> {
        self.sim.set_position(id, position)
    }
}
