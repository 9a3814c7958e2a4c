use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::analytics::MessageStats;
use crate::config::{NodeGroup, SimConfig};
use crate::context::Context;
use crate::error::{SimError, SimResult};
use crate::event::{EventKind, EventQueue};
use crate::global::{DefaultCustomGlobal, GlobalState};
use crate::in_air::PacketsInTheAir;
use crate::message::{Message, Packet, PacketArena, PacketHandle, PacketKind};
use crate::models::{MessageTransmissionModel, ModelEnv, ModelRegistry, BUILTIN_NAMESPACE};
use crate::node::{Node, NodeId, NodeModels};
use crate::position::Position;
use crate::timer::{absolute_fire_time, relative_fire_time, PendingTimer};
use crate::topology::{ConnectivityUpdate, TopologyGraph};
use crate::traits::{CustomGlobal, NodeBehavior, Timer};

/// How a sent packet is registered with the in-air buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tracking {
    Active,
    Passive,
    /// Direct sends bypass the topology and are never interfered with.
    Untracked,
}

/// A membership change the custom global has yet to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Added(NodeId),
    Removed(NodeId),
}

/// Owns every node, packet and timer of one simulation.
pub struct Simulation {
    pub(crate) project: String,
    pub(crate) config: SimConfig,
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) state: GlobalState,
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    next_node_id: NodeId,
    pub(crate) graph: TopologyGraph,
    pub(crate) packets: PacketArena,
    pub(crate) in_air: PacketsInTheAir,
    pub(crate) events: EventQueue,
    pub(crate) global_timers: Vec<PendingTimer>,
    pub(crate) custom: Option<Box<dyn CustomGlobal>>,
    /// Changes made while the custom global was out of its slot.
    membership: Vec<Membership>,
    transmission: Arc<dyn MessageTransmissionModel>,
    pub(crate) rng: StdRng,
    pub(crate) stats: MessageStats,
    next_packet_id: u64,
    next_timer_seq: u64,
    pub(crate) connectivity_evaluated: bool,
    pub(crate) empty_queue_notified: bool,
    pub(crate) stop_requested: bool,
    exited: bool,
    trace: Option<Box<dyn Write + Send>>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("project", &self.project)
            .field("time", &self.state.current_time)
            .field("running", &self.state.is_running)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.graph.len())
            .field("packets", &self.packets.len())
            .field("events", &self.events.len())
            .finish()
    }
}

impl Simulation {
    /// An empty simulation whose custom global never terminates.
    ///
    /// Node groups listed in `config` are ignored; use [`Simulation::init`]
    /// to build a project from its configuration.
    pub fn new(config: SimConfig, registry: Arc<ModelRegistry>) -> SimResult<Self> {
        config.validate(BUILTIN_NAMESPACE)?;
        Self::assemble(
            BUILTIN_NAMESPACE,
            config,
            registry,
            Box::new(DefaultCustomGlobal),
        )
    }

    /// Resolve the project's custom global, add the configured node groups
    /// and run `pre_run`. Nothing survives a failed call.
    pub fn init(project: &str, registry: Arc<ModelRegistry>, config: SimConfig) -> SimResult<Self> {
        info!("Initializing project '{}'", project);
        config.validate(project)?;
        let mut custom = registry.create_custom_global(project)?;
        custom.check_project_requirements(&config)?;

        let mut sim = Self::assemble(project, config, registry, custom)?;
        let groups = sim.config.nodes.clone();
        for group in &groups {
            sim.add_nodes(group)?;
        }
        for node in sim.nodes.values() {
            if let Some(behavior) = node.behavior() {
                behavior.check_requirements()?;
            }
        }
        if sim.config.asynchronous && sim.config.connectivity_enabled {
            sim.reevaluate_connections();
        }
        sim.with_custom(|custom, ctx| custom.pre_run(ctx))?;

        info!(
            "Project '{}' ready: {} nodes, {} edges, {} mode",
            project,
            sim.nodes.len(),
            sim.graph.len(),
            if sim.config.asynchronous { "asynchronous" } else { "synchronous" }
        );
        Ok(sim)
    }

    fn assemble(
        project: &str,
        config: SimConfig,
        registry: Arc<ModelRegistry>,
        custom: Box<dyn CustomGlobal>,
    ) -> SimResult<Self> {
        let transmission = registry.transmission(&config.message_transmission_model, project)?;
        Ok(Self {
            project: project.to_string(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            registry,
            state: GlobalState::default(),
            nodes: BTreeMap::new(),
            next_node_id: 1,
            graph: TopologyGraph::new(),
            packets: PacketArena::new(),
            in_air: PacketsInTheAir::new(),
            events: EventQueue::new(),
            global_timers: Vec::new(),
            custom: Some(custom),
            membership: Vec::new(),
            transmission,
            stats: MessageStats::default(),
            next_packet_id: 0,
            next_timer_seq: 0,
            connectivity_evaluated: false,
            empty_queue_notified: false,
            stop_requested: false,
            exited: false,
            trace: None,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    pub fn current_time(&self) -> u64 {
        self.state.current_time
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn stats(&self) -> &MessageStats {
        &self.stats
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.graph.has_edge(from, to)
    }

    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.out_neighbors(id)
    }

    pub fn in_air(&self) -> &PacketsInTheAir {
        &self.in_air
    }

    /// Packets sent but not yet delivered, nacked or dropped.
    pub fn packets_in_flight(&self) -> usize {
        self.packets.len()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn custom_global(&self) -> Option<&dyn CustomGlobal> {
        self.custom.as_deref()
    }

    pub fn custom_global_as<T: CustomGlobal + 'static>(&self) -> Option<&T> {
        self.custom.as_deref()?.as_any().downcast_ref::<T>()
    }

    /// Ask the scheduler to stop at the next round or event boundary.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Mobility trace sink, written as `time,x,y,id` lines when `save_trace`
    /// is enabled.
    pub fn set_trace_writer(&mut self, writer: impl Write + Send + 'static) {
        self.trace = Some(Box::new(writer));
    }

    pub(crate) fn trace_position(&mut self, id: NodeId, position: Position) {
        if !self.config.save_trace {
            return;
        }
        let Some(writer) = self.trace.as_mut() else {
            return;
        };
        let line = writeln!(
            writer,
            "{},{},{},{}",
            self.state.current_time, position.x, position.y, id
        );
        if let Err(e) = line {
            warn!("Disabling mobility trace after write error: {}", e);
            self.trace = None;
        }
    }

    /// Notify the custom global that the application is shutting down.
    /// Only the first call has an effect.
    pub fn exit(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        if let Some(writer) = self.trace.as_mut() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush mobility trace: {}", e);
            }
        }
        if let Some(custom) = self.custom.as_mut() {
            custom.on_exit();
        }
    }

    // Hook dispatch. Behaviors are taken out of their node for the duration
    // of the call so the hook can mutate the simulation through a context.

    pub(crate) fn with_behavior(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn NodeBehavior, &mut Context<'_>) -> SimResult<()>,
    ) -> SimResult<()> {
        let Some(mut behavior) = self.nodes.get_mut(&id).and_then(|n| n.behavior.take()) else {
            return Ok(());
        };
        let result = f(&mut *behavior, &mut Context::for_node(self, id));
        if let Some(node) = self.nodes.get_mut(&id) {
            node.behavior = Some(behavior);
        }
        result
    }

    pub(crate) fn with_custom(
        &mut self,
        f: impl FnOnce(&mut dyn CustomGlobal, &mut Context<'_>) -> SimResult<()>,
    ) -> SimResult<()> {
        let Some(mut custom) = self.custom.take() else {
            return Ok(());
        };
        let result = f(&mut *custom, &mut Context::global(self));
        for change in std::mem::take(&mut self.membership) {
            match change {
                Membership::Added(id) => custom.node_added(id),
                Membership::Removed(id) => custom.node_removed(id),
            }
        }
        self.custom = Some(custom);
        result
    }

    fn notify_membership(&mut self, change: Membership) {
        let Some(custom) = self.custom.as_mut() else {
            self.membership.push(change);
            return;
        };
        match change {
            Membership::Added(id) => custom.node_added(id),
            Membership::Removed(id) => custom.node_removed(id),
        }
    }

    pub(crate) fn has_terminated(&self) -> bool {
        self.custom
            .as_deref()
            .map_or(false, |custom| custom.has_terminated(&self.state))
    }

    // Node management.

    /// Add one node and run its `init` hook. Ids are handed out in increasing
    /// order starting at 1 and never reused.
    pub fn add_node(
        &mut self,
        behavior: Box<dyn NodeBehavior>,
        models: NodeModels,
        position: Position,
    ) -> SimResult<NodeId> {
        self.spawn(behavior, models, position, None)
    }

    fn spawn(
        &mut self,
        behavior: Box<dyn NodeBehavior>,
        models: NodeModels,
        position: Position,
        kind: Option<&str>,
    ) -> SimResult<NodeId> {
        let id = self.next_node_id;
        self.next_node_id += 1;
        let mut node = Node::new(id, behavior, models, position);
        if let Some(kind) = kind {
            node.kind = kind.to_string();
        }
        self.nodes.insert(id, node);
        self.connectivity_evaluated = false;

        if let Err(e) = self.with_behavior(id, |behavior, ctx| behavior.init(ctx)) {
            self.purge_node(id);
            return Err(e);
        }
        self.notify_membership(Membership::Added(id));
        debug!("Added node {} at {}", id, position);
        Ok(id)
    }

    /// Bulk-create a node group. Either every node is added or none is.
    pub fn add_nodes(&mut self, group: &NodeGroup) -> SimResult<Vec<NodeId>> {
        let registry = Arc::clone(&self.registry);
        let project = self.project.clone();
        let models = NodeModels {
            mobility: registry.mobility(&group.mobility, &project)?,
            connectivity: registry.connectivity(&group.connectivity, &project)?,
            interference: registry.interference(&group.interference, &project)?,
            reliability: registry.reliability(&group.reliability, &project)?,
        };
        let distribution = registry.distribution(&group.distribution, &project)?;
        distribution.check_dimensions(&self.config.dimensions)?;
        if !registry.has_node_kind(&group.node_kind, &project) {
            return Err(SimError::UnknownNodeKind(group.node_kind.clone()));
        }

        let mut added = Vec::with_capacity(group.count);
        for index in 0..group.count {
            let position = {
                let mut env = ModelEnv {
                    time: self.state.current_time,
                    dimensions: &self.config.dimensions,
                    rng: &mut self.rng,
                };
                distribution.get_position(index, group.count, &mut env)
            };
            let spawned = registry
                .create_node(&group.node_kind, &project)
                .and_then(|behavior| {
                    self.spawn(behavior, models.clone(), position, Some(&group.node_kind))
                });
            match spawned {
                Ok(id) => added.push(id),
                Err(e) => {
                    warn!(
                        "Rolling back {} nodes of kind '{}': {}",
                        added.len(),
                        group.node_kind,
                        e
                    );
                    for id in added {
                        // Just added, so the lookup cannot fail.
                        let _ = self.remove_node(id);
                    }
                    return Err(e);
                }
            }
        }
        info!("Added {} nodes of kind '{}'", added.len(), group.node_kind);
        Ok(added)
    }

    /// Remove a node together with its edges, timers and every packet it
    /// sent or is due to receive.
    pub fn remove_node(&mut self, id: NodeId) -> SimResult<()> {
        self.purge_node(id).ok_or(SimError::NodeNotFound(id))?;
        self.notify_membership(Membership::Removed(id));
        debug!("Removed node {}", id);
        Ok(())
    }

    pub fn remove_all_nodes(&mut self) {
        for id in self.node_ids() {
            let _ = self.remove_node(id);
        }
    }

    fn purge_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;

        let doomed: Vec<PacketHandle> = self
            .packets
            .iter()
            .filter(|(_, p)| p.origin() == id || p.destination() == id)
            .map(|(handle, _)| handle)
            .collect();
        for handle in doomed {
            self.packets.remove(handle);
        }
        self.in_air.retain_live(&self.packets);

        let packets = &self.packets;
        for other in self.nodes.values_mut() {
            other.inbound.retain(|h| packets.contains(*h));
            other.nack_even.retain(|p| p.destination() != id);
            other.nack_odd.retain(|p| p.destination() != id);
        }
        self.events.retain(|event| match &event.kind {
            EventKind::Timer { owner, .. } => *owner != Some(id),
            EventKind::Packet(handle) => packets.contains(*handle),
        });

        for (from, _) in self.graph.remove_node(id) {
            if let Some(neighbor) = self.nodes.get_mut(&from) {
                neighbor.neighborhood_changed = true;
            }
        }
        Some(node)
    }

    /// Move a node and run its `on_position_updated` hook. A node moving
    /// itself from one of its own hooks is not notified again.
    pub fn set_position(&mut self, id: NodeId, position: Position) -> SimResult<()> {
        let node = self.nodes.get_mut(&id).ok_or(SimError::NodeNotFound(id))?;
        node.position = position;
        self.with_behavior(id, |behavior, ctx| behavior.on_position_updated(ctx, position))
    }

    // Topology.

    /// Returns `false` if the edge already existed.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> SimResult<bool> {
        self.require_node(to)?;
        let node = self.nodes.get_mut(&from).ok_or(SimError::NodeNotFound(from))?;
        let added = self.graph.add_edge(from, to);
        if added {
            node.neighborhood_changed = true;
        }
        Ok(added)
    }

    pub fn add_bidirectional_edge(&mut self, a: NodeId, b: NodeId) -> SimResult<()> {
        self.add_edge(a, b)?;
        self.add_edge(b, a)?;
        Ok(())
    }

    /// Remove `from -> to`, denying delivery of every packet still in the air
    /// on it.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> SimResult<()> {
        self.graph
            .remove_edge(from, to)
            .ok_or(SimError::EdgeNotFound { from, to })?;
        self.in_air.deny_from_edge(&mut self.packets, from, to);
        if let Some(node) = self.nodes.get_mut(&from) {
            node.neighborhood_changed = true;
        }
        Ok(())
    }

    pub fn remove_bidirectional_edge(&mut self, a: NodeId, b: NodeId) -> SimResult<()> {
        for (from, to) in [(a, b), (b, a)] {
            if !self.graph.has_edge(from, to) {
                return Err(SimError::EdgeNotFound { from, to });
            }
        }
        self.remove_edge(a, b)?;
        self.remove_edge(b, a)
    }

    /// Ask every ordered pair of nodes whether they are connected and patch
    /// the graph accordingly.
    pub fn reevaluate_connections(&mut self) -> ConnectivityUpdate {
        let ids = self.node_ids();
        let mut changed = BTreeSet::new();
        let mut update = ConnectivityUpdate::default();
        for &from in &ids {
            for &to in &ids {
                if from == to {
                    continue;
                }
                let (Some(a), Some(b)) = (self.nodes.get(&from), self.nodes.get(&to)) else {
                    continue;
                };
                let mut env = ModelEnv {
                    time: self.state.current_time,
                    dimensions: &self.config.dimensions,
                    rng: &mut self.rng,
                };
                let connected = a.models.connectivity.is_connected(a, b, &mut env);
                match (connected, self.graph.has_edge(from, to)) {
                    (true, false) => {
                        self.graph.add_edge(from, to);
                        update.connections += 1;
                    }
                    (false, true) => {
                        self.graph.remove_edge(from, to);
                        self.in_air.deny_from_edge(&mut self.packets, from, to);
                        update.disconnections += 1;
                    }
                    _ => continue,
                }
                changed.insert(from);
            }
        }
        for id in changed {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.neighborhood_changed = true;
            }
        }
        self.connectivity_evaluated = true;
        update
    }

    fn require_node(&self, id: NodeId) -> SimResult<()> {
        if self.nodes.contains_key(&id) {
            Ok(())
        } else {
            Err(SimError::NodeNotFound(id))
        }
    }

    // Messaging.

    pub(crate) fn send_packet(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        message: Box<dyn Message>,
        kind: PacketKind,
        intensity: f64,
        tracking: Tracking,
    ) -> SimResult<PacketHandle> {
        if !self.state.is_running {
            return Err(SimError::NotRunning);
        }
        let now = self.state.current_time;
        let from = self.nodes.get(&origin).ok_or(SimError::NodeNotFound(origin))?;
        let to = self
            .nodes
            .get(&destination)
            .ok_or(SimError::NodeNotFound(destination))?;

        let mut env = ModelEnv {
            time: now,
            dimensions: &self.config.dimensions,
            rng: &mut self.rng,
        };
        let transit = self
            .transmission
            .time_to_reach(message.as_ref(), from, to, &mut env);
        let id = self.next_packet_id;
        self.next_packet_id += 1;
        let mut packet = Packet::new(
            id,
            message,
            origin,
            destination,
            kind,
            now,
            now.saturating_add(transit),
            intensity.clamp(0.0, 1.0),
        );

        if tracking != Tracking::Untracked {
            if self.graph.has_edge(origin, destination) {
                if !to.models.reliability.reaches_destination(&packet, &mut env) {
                    packet.deny_delivery();
                }
                if let Some(edge) = self.graph.edge_mut(origin, destination) {
                    edge.messages += 1;
                    edge.in_flight += 1;
                    packet.on_edge = true;
                }
            } else {
                packet.deny_delivery();
            }
        }

        let arriving = packet.arriving_time();
        let handle = self.packets.insert(packet);
        match tracking {
            Tracking::Active => self.in_air.add(handle, false),
            Tracking::Passive => self.in_air.add(handle, true),
            Tracking::Untracked => {}
        }
        if self.config.asynchronous {
            self.schedule(arriving, EventKind::Packet(handle));
        } else if let Some(node) = self.nodes.get_mut(&destination) {
            node.inbound.push(handle);
        }
        self.state.number_of_messages_in_this_round += 1;
        Ok(handle)
    }

    /// One multicast packet per outgoing neighbor. Without neighbors a single
    /// undeliverable packet addressed to the sender is created instead.
    pub(crate) fn broadcast_from(
        &mut self,
        origin: NodeId,
        message: &dyn Message,
        intensity: f64,
    ) -> SimResult<()> {
        if !self.state.is_running {
            return Err(SimError::NotRunning);
        }
        self.require_node(origin)?;
        let neighbors = self.graph.out_neighbors(origin);
        if neighbors.is_empty() {
            self.send_packet(
                origin,
                origin,
                message.clone_message(),
                PacketKind::Multicast,
                intensity,
                Tracking::Active,
            )?;
            return Ok(());
        }

        let mut latest: Option<(u64, PacketHandle)> = None;
        for neighbor in neighbors {
            let handle = self.send_packet(
                origin,
                neighbor,
                message.clone_message(),
                PacketKind::Multicast,
                intensity,
                Tracking::Passive,
            )?;
            let arriving = self.packets.get(handle).map_or(0, |p| p.arriving_time());
            if latest.map_or(true, |(time, _)| arriving >= time) {
                latest = Some((arriving, handle));
            }
        }
        if let Some((_, handle)) = latest {
            self.in_air.upgrade_to_active(handle);
        }
        Ok(())
    }

    /// Take a packet that left the air off its edge's in-flight count.
    pub(crate) fn release_from_edge(&mut self, packet: &mut Packet) {
        if !std::mem::take(&mut packet.on_edge) {
            return;
        }
        if let Some(edge) = self.graph.edge_mut(packet.origin(), packet.destination()) {
            edge.in_flight = edge.in_flight.saturating_sub(1);
        }
    }

    /// Route a packet that left the air undelivered: nack it back to its
    /// sender or drop it.
    pub(crate) fn reject(&mut self, packet: Packet) {
        if self.config.nack_messages_enabled && packet.kind() == PacketKind::Unicast {
            if let Some(origin) = self.nodes.get_mut(&packet.origin()) {
                if self.state.is_even_round {
                    origin.nack_odd.push(packet);
                } else {
                    origin.nack_even.push(packet);
                }
                self.stats.record_nack();
                return;
            }
        }
        self.stats.record_drop();
    }

    // Timers and events.

    pub(crate) fn schedule(&mut self, time: u64, kind: EventKind) {
        self.events.push(time, kind);
        self.empty_queue_notified = false;
    }

    pub(crate) fn schedule_timer(
        &mut self,
        owner: Option<NodeId>,
        timer: Box<dyn Timer>,
        fire_time: u64,
    ) -> SimResult<()> {
        if let Some(id) = owner {
            self.require_node(id)?;
        }
        if self.config.asynchronous {
            self.schedule(fire_time, EventKind::Timer { owner, timer });
            return Ok(());
        }
        let pending = PendingTimer {
            fire_time,
            seq: self.next_timer_seq,
            timer,
        };
        self.next_timer_seq += 1;
        match owner {
            Some(id) => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.timers.push(pending);
                }
            }
            None => self.global_timers.push(pending),
        }
        Ok(())
    }

    /// Start a timer owned by `node` that fires `delay` ticks from now.
    pub fn start_timer_relative(
        &mut self,
        node: NodeId,
        timer: impl Timer + 'static,
        delay: i64,
    ) -> SimResult<()> {
        let at = relative_fire_time(self.state.current_time, delay)?;
        self.schedule_timer(Some(node), Box::new(timer), at)
    }

    pub fn start_timer_absolute(
        &mut self,
        node: NodeId,
        timer: impl Timer + 'static,
        at: u64,
    ) -> SimResult<()> {
        let at = absolute_fire_time(self.state.current_time, at)?;
        self.schedule_timer(Some(node), Box::new(timer), at)
    }

    /// Start a timer owned by no node. Its context cannot send messages.
    pub fn start_global_timer(&mut self, timer: impl Timer + 'static, delay: i64) -> SimResult<()> {
        let at = relative_fire_time(self.state.current_time, delay)?;
        self.schedule_timer(None, Box::new(timer), at)
    }
}
