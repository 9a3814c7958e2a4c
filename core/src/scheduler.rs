use log::{debug, info, trace};

use crate::analytics::RunSummary;
use crate::context::Context;
use crate::engine::Simulation;
use crate::error::{SimError, SimResult};
use crate::event::EventKind;
use crate::inbox::{Inbox, NackBox};
use crate::message::{Packet, PacketHandle, PacketKind};
use crate::models::ModelEnv;
use crate::node::NodeId;
use crate::timer::take_due;

/// What happened during one scheduler step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// The custom global reported termination after this round.
    Terminated,
    /// A stop was requested from a hook.
    Stopped,
    /// Asynchronous mode: no event left, even after the empty-queue hook.
    QueueEmpty,
}

impl Simulation {
    /// Mark the simulation running. In asynchronous mode the first run also
    /// evaluates connectivity for every pair of nodes.
    pub fn begin_run(&mut self) {
        self.state.is_running = true;
        self.stop_requested = false;
        if self.config.asynchronous && self.config.connectivity_enabled && !self.connectivity_evaluated {
            let update = self.reevaluate_connections();
            debug!(
                "Initial connectivity evaluation: {} connections, {} disconnections",
                update.connections, update.disconnections
            );
        }
    }

    pub fn end_run(&mut self) {
        self.state.is_running = false;
    }

    /// Execute one round (synchronous) or one event (asynchronous).
    pub fn step(&mut self) -> SimResult<StepOutcome> {
        if !self.state.is_running {
            return Err(SimError::NotRunning);
        }
        if self.config.asynchronous {
            self.step_event()
        } else {
            self.step_round()
        }
    }

    /// Run up to `steps` rounds or events. The simulation is left stopped
    /// even when a hook fails.
    pub fn run(&mut self, steps: u64) -> SimResult<RunSummary> {
        self.begin_run();
        let mut done = 0;
        let mut terminated = false;
        while done < steps && !self.stop_requested {
            let outcome = match self.step() {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.end_run();
                    return Err(e);
                }
            };
            match outcome {
                StepOutcome::Continue => done += 1,
                StepOutcome::Stopped => {
                    done += 1;
                    break;
                }
                StepOutcome::Terminated => {
                    done += 1;
                    terminated = true;
                    break;
                }
                StepOutcome::QueueEmpty => break,
            }
        }
        self.end_run();
        info!("Run finished after {} steps at T={}", done, self.state.current_time);
        Ok(self.summary(done, terminated))
    }

    pub fn summary(&self, steps: u64, terminated: bool) -> RunSummary {
        RunSummary {
            steps,
            current_time: self.state.current_time,
            messages_over_all: self.state.number_of_messages_over_all,
            delivered: self.stats.delivered(),
            nacked: self.stats.nacked(),
            dropped: self.stats.dropped(),
            transit_p50: self.stats.transit_percentile(50.0),
            transit_p99: self.stats.transit_percentile(99.0),
            terminated,
        }
    }

    fn step_round(&mut self) -> SimResult<StepOutcome> {
        self.state.begin_round();
        let now = self.state.current_time;
        trace!("Round {} begins", now);

        self.with_custom(|custom, ctx| custom.pre_round(ctx))?;
        for mut pending in take_due(&mut self.global_timers, now) {
            pending.timer.fire(&mut Context::global(self))?;
        }

        self.move_nodes()?;
        if self.config.connectivity_enabled {
            let update = self.reevaluate_connections();
            if update.total() > 0 {
                trace!(
                    "Round {}: {} connections, {} disconnections",
                    now,
                    update.connections,
                    update.disconnections
                );
            }
        }
        if self.config.interference_enabled {
            self.test_interference();
        }
        for id in self.node_ids() {
            if self.nodes.contains_key(&id) {
                self.step_node(id)?;
            }
        }

        self.with_custom(|custom, ctx| custom.post_round(ctx))?;
        self.state.end_round();
        self.stats
            .record_round(now, self.state.number_of_messages_in_this_round);
        trace!(
            "Round {} done: {} messages",
            now,
            self.state.number_of_messages_in_this_round
        );

        if self.has_terminated() {
            info!("Custom global terminated the simulation at round {}", now);
            return Ok(StepOutcome::Terminated);
        }
        if self.stop_requested {
            return Ok(StepOutcome::Stopped);
        }
        Ok(StepOutcome::Continue)
    }

    fn move_nodes(&mut self) -> SimResult<()> {
        for id in self.node_ids() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let mut env = ModelEnv {
                time: self.state.current_time,
                dimensions: &self.config.dimensions,
                rng: &mut self.rng,
            };
            let next = node.models.mobility.get_next_position(node, &mut env);
            self.trace_position(id, next);
            self.set_position(id, next)?;
        }
        Ok(())
    }

    fn test_interference(&mut self) -> usize {
        let mut env = ModelEnv {
            time: self.state.current_time,
            dimensions: &self.config.dimensions,
            rng: &mut self.rng,
        };
        self.in_air
            .test_interference(&mut self.packets, &self.nodes, &mut env)
    }

    fn step_node(&mut self, id: NodeId) -> SimResult<()> {
        let now = self.state.current_time;
        let arrived = self.flush_arrivals(id);

        self.with_behavior(id, |behavior, ctx| behavior.pre_step(ctx))?;

        let changed = self
            .nodes
            .get_mut(&id)
            .map_or(false, |node| std::mem::take(&mut node.neighborhood_changed));
        if changed {
            self.with_behavior(id, |behavior, ctx| behavior.on_neighborhood_change(ctx))?;
        }

        let due = match self.nodes.get_mut(&id) {
            Some(node) => take_due(&mut node.timers, now),
            None => return Ok(()),
        };
        for mut pending in due {
            if !self.nodes.contains_key(&id) {
                return Ok(());
            }
            pending.timer.fire(&mut Context::for_node(self, id))?;
        }

        let even = self.state.is_even_round;
        let nacks = match self.nodes.get_mut(&id) {
            Some(node) if even => std::mem::take(&mut node.nack_even),
            Some(node) => std::mem::take(&mut node.nack_odd),
            None => return Ok(()),
        };
        let nacks = NackBox::new(nacks);
        self.with_behavior(id, |behavior, ctx| behavior.handle_nack_messages(ctx, &nacks))?;

        let inbox = Inbox::new(arrived);
        self.with_behavior(id, |behavior, ctx| behavior.handle_messages(ctx, &inbox))?;
        self.with_behavior(id, |behavior, ctx| behavior.post_step(ctx))
    }

    /// Take every packet due at this node out of the air. Positive ones are
    /// returned for the inbox; the rest are nacked or dropped.
    fn flush_arrivals(&mut self, id: NodeId) -> Vec<Packet> {
        let now = self.state.current_time;
        let Some(node) = self.nodes.get_mut(&id) else {
            return Vec::new();
        };
        let inbound = std::mem::take(&mut node.inbound);

        let mut arrived = Vec::new();
        let mut pending: Vec<PacketHandle> = Vec::new();
        for handle in inbound {
            match self.packets.get(handle) {
                None => continue,
                Some(packet) if packet.arriving_time() > now => {
                    pending.push(handle);
                    continue;
                }
                Some(_) => {}
            }
            let Some(mut packet) = self.packets.remove(handle) else {
                continue;
            };
            self.in_air.remove(handle);
            self.release_from_edge(&mut packet);
            if packet.positive_delivery() {
                self.stats.record_delivery(packet.transit_time());
                arrived.push(packet);
            } else {
                self.reject(packet);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            pending.append(&mut node.inbound);
            node.inbound = pending;
        }
        arrived
    }

    fn step_event(&mut self) -> SimResult<StepOutcome> {
        self.state.number_of_messages_in_this_round = 0;
        self.state.round_log.clear();
        let outcome = self.process_next_event();
        self.state.number_of_messages_over_all += self.state.number_of_messages_in_this_round;
        let outcome = outcome?;

        if outcome == StepOutcome::Continue {
            self.state.events_processed += 1;
            self.stats.record_round(
                self.state.current_time,
                self.state.number_of_messages_in_this_round,
            );
            if self.stop_requested {
                return Ok(StepOutcome::Stopped);
            }
        }
        Ok(outcome)
    }

    fn process_next_event(&mut self) -> SimResult<StepOutcome> {
        if self.events.is_empty() {
            if !self.empty_queue_notified {
                self.empty_queue_notified = true;
                debug!("Event queue empty at T={}", self.state.current_time);
                self.with_custom(|custom, ctx| custom.handle_empty_event_queue(ctx))?;
            }
            if self.events.is_empty() {
                return Ok(StepOutcome::QueueEmpty);
            }
        }
        let Some(event) = self.events.pop() else {
            return Ok(StepOutcome::QueueEmpty);
        };
        self.state.current_time = self.state.current_time.max(event.time);
        trace!("T={} {:?}", event.time, event.kind);

        match event.kind {
            EventKind::Timer {
                owner: Some(id),
                mut timer,
            } => {
                if self.nodes.contains_key(&id) {
                    timer.fire(&mut Context::for_node(self, id))?;
                } else {
                    debug!("Skipping timer of removed node {}", id);
                }
            }
            EventKind::Timer { owner: None, mut timer } => {
                timer.fire(&mut Context::global(self))?;
            }
            EventKind::Packet(handle) => self.deliver_packet(handle)?,
        }
        Ok(StepOutcome::Continue)
    }

    fn deliver_packet(&mut self, handle: PacketHandle) -> SimResult<()> {
        // Direct sends never enter the air and are not interfered with.
        if self.config.interference_enabled && self.in_air.contains(handle) {
            let disturbed = match self.packets.get(handle) {
                Some(packet) if packet.positive_delivery() => {
                    let mut env = ModelEnv {
                        time: self.state.current_time,
                        dimensions: &self.config.dimensions,
                        rng: &mut self.rng,
                    };
                    self.nodes
                        .get(&packet.destination())
                        .map_or(false, |node| node.models.interference.is_disturbed(packet, &mut env))
                }
                _ => false,
            };
            if disturbed {
                if let Some(packet) = self.packets.get_mut(handle) {
                    packet.deny_delivery();
                }
            }
        }

        self.in_air.remove(handle);
        let Some(mut packet) = self.packets.remove(handle) else {
            debug!("Skipping stale packet event");
            return Ok(());
        };
        self.release_from_edge(&mut packet);
        let (origin, destination) = (packet.origin(), packet.destination());

        if packet.positive_delivery() && self.nodes.contains_key(&destination) {
            self.stats.record_delivery(packet.transit_time());
            let inbox = Inbox::single(packet);
            return self.with_behavior(destination, |behavior, ctx| behavior.handle_messages(ctx, &inbox));
        }
        if !packet.positive_delivery()
            && self.config.nack_messages_enabled
            && packet.kind() == PacketKind::Unicast
            && self.nodes.contains_key(&origin)
        {
            self.stats.record_nack();
            let nacks = NackBox::single(packet);
            return self.with_behavior(origin, |behavior, ctx| behavior.handle_nack_messages(ctx, &nacks));
        }
        self.stats.record_drop();
        Ok(())
    }
}
