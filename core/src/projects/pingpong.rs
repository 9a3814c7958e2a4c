//! Two kinds of nodes bouncing a counter back and forth.
//!
//! A `ping` node broadcasts [`Ping`] every `interval` rounds; each `pong`
//! node that hears it answers with a unicast [`Pong`] carrying the same
//! sequence number.

use serde_json::json;

use crate::config::{ModelRef, NodeGroup, SimConfig};
use crate::context::Context;
use crate::error::SimResult;
use crate::global::GlobalState;
use crate::inbox::{Inbox, NackBox};
use crate::models::ModelRegistry;
use crate::node::{Color, NodeId};
use crate::traits::{CustomGlobal, NodeBehavior};

pub const PROJECT: &str = "pingpong";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pong {
    pub seq: u64,
}

#[derive(Debug)]
pub struct PingNode {
    pub interval: i64,
    /// `(responder, seq)` for every pong received.
    pub pongs: Vec<(NodeId, u64)>,
    pub nacks: u64,
}

impl Default for PingNode {
    fn default() -> Self {
        Self {
            interval: 5,
            pongs: Vec::new(),
            nacks: 0,
        }
    }
}

fn send_ping(ctx: &mut Context<'_>) -> SimResult<()> {
    let seq = ctx.current_time();
    ctx.broadcast(&Ping { seq })?;
    ctx.set_color(Color::RED)
}

impl NodeBehavior for PingNode {
    fn kind(&self) -> &str {
        "ping"
    }

    fn init(&mut self, ctx: &mut Context<'_>) -> SimResult<()> {
        ctx.start_timer(send_ping, 1)
    }

    fn handle_nack_messages(&mut self, _ctx: &mut Context<'_>, nacks: &NackBox) -> SimResult<()> {
        self.nacks += nacks.len() as u64;
        Ok(())
    }

    fn handle_messages(&mut self, ctx: &mut Context<'_>, inbox: &Inbox) -> SimResult<()> {
        let me = ctx.node_id()?;
        let mut rearm = false;
        for (packet, pong) in inbox.payloads::<Pong>() {
            // Only the first reply to a ping schedules the next one.
            rearm |= self.pongs.last().map_or(true, |&(_, seq)| seq != pong.seq);
            self.pongs.push((packet.origin(), pong.seq));
            ctx.log(format!("node {me} got pong #{} from {}", pong.seq, packet.origin()));
        }
        if rearm {
            ctx.set_color(Color::GREEN)?;
            ctx.start_timer(send_ping, self.interval)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PongNode {
    pub answered: u64,
}

impl NodeBehavior for PongNode {
    fn kind(&self) -> &str {
        "pong"
    }

    fn handle_messages(&mut self, ctx: &mut Context<'_>, inbox: &Inbox) -> SimResult<()> {
        for (packet, ping) in inbox.payloads::<Ping>() {
            ctx.send(&Pong { seq: ping.seq }, packet.origin())?;
            self.answered += 1;
        }
        if !inbox.is_empty() {
            ctx.set_color(Color::BLUE)?;
        }
        Ok(())
    }
}

/// Terminates at round `max_rounds`, if set.
#[derive(Debug, Default)]
pub struct PingPongGlobal {
    pub max_rounds: Option<u64>,
}

impl CustomGlobal for PingPongGlobal {
    fn has_terminated(&self, state: &GlobalState) -> bool {
        self.max_rounds.map_or(false, |max| state.current_time >= max)
    }
}

pub fn register(registry: &mut ModelRegistry) {
    registry.register_node_kind(PROJECT, "ping", || Box::<PingNode>::default());
    registry.register_node_kind(PROJECT, "pong", || Box::<PongNode>::default());
    registry.register_project(PROJECT, || Box::<PingPongGlobal>::default());
}

/// One ping node and three pong nodes on a line, all within radio range.
pub fn default_config() -> SimConfig {
    let radio = ModelRef::with_parameters("udg", json!({ "radius": 30.0 }));
    let mut config = SimConfig {
        simulation_name: "Ping Pong".to_string(),
        rounds: 100,
        ..SimConfig::default()
    };
    config.dimensions.x = [0.0, 100.0];
    config.dimensions.y = [0.0, 100.0];
    config.nodes = vec![
        NodeGroup::new(1, "ping")
            .with_connectivity(radio.clone())
            .with_distribution(ModelRef::new("line")),
        NodeGroup::new(3, "pong")
            .with_connectivity(radio)
            .with_distribution(ModelRef::new("line")),
    ];
    config
}
