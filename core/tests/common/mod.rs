#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use mobsinet_core::*;
use rand::Rng;
use serde_json::json;

pub const PROJECT: &str = "probe";

#[derive(Debug, Clone, PartialEq)]
pub struct Note(pub String);

/// One packet as seen by the node that handled it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub time: u64,
    pub from: NodeId,
    pub to: NodeId,
    pub text: String,
    pub sent: u64,
    pub kind: PacketKind,
}

impl Delivery {
    fn of(packet: &Packet, note: &Note, time: u64) -> Self {
        Self {
            time,
            from: packet.origin(),
            to: packet.destination(),
            text: note.0.clone(),
            sent: packet.sending_time(),
            kind: packet.kind(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Journal {
    pub deliveries: Vec<Delivery>,
    pub nacks: Vec<Delivery>,
    pub neighborhood_changes: Vec<(u64, NodeId)>,
    pub timers: Vec<(u64, Option<NodeId>, String)>,
    pub positions: Vec<(u64, NodeId, Position)>,
}

pub type SharedJournal = Arc<Mutex<Journal>>;

/// Records everything it receives. Optionally echoes notes back to their
/// sender and chats randomly with other nodes.
pub struct Probe {
    journal: SharedJournal,
    echo: bool,
    chatter: f64,
}

impl Probe {
    pub fn new(journal: &SharedJournal) -> Self {
        Self {
            journal: Arc::clone(journal),
            echo: false,
            chatter: 0.0,
        }
    }

    pub fn echo(journal: &SharedJournal) -> Self {
        Self {
            echo: true,
            ..Self::new(journal)
        }
    }

    pub fn chatter(journal: &SharedJournal, probability: f64) -> Self {
        Self {
            chatter: probability,
            ..Self::new(journal)
        }
    }
}

impl NodeBehavior for Probe {
    fn kind(&self) -> &str {
        "probe"
    }

    fn on_neighborhood_change(&mut self, ctx: &mut Context<'_>) -> SimResult<()> {
        let id = ctx.node_id()?;
        self.journal
            .lock()
            .unwrap()
            .neighborhood_changes
            .push((ctx.current_time(), id));
        Ok(())
    }

    fn on_position_updated(&mut self, ctx: &mut Context<'_>, position: Position) -> SimResult<()> {
        let id = ctx.node_id()?;
        self.journal
            .lock()
            .unwrap()
            .positions
            .push((ctx.current_time(), id, position));
        Ok(())
    }

    fn handle_nack_messages(&mut self, ctx: &mut Context<'_>, nacks: &NackBox) -> SimResult<()> {
        let mut journal = self.journal.lock().unwrap();
        for (packet, note) in nacks.payloads::<Note>() {
            journal.nacks.push(Delivery::of(packet, note, ctx.current_time()));
        }
        Ok(())
    }

    fn handle_messages(&mut self, ctx: &mut Context<'_>, inbox: &Inbox) -> SimResult<()> {
        let now = ctx.current_time();
        let mut replies = Vec::new();
        {
            let mut journal = self.journal.lock().unwrap();
            for (packet, note) in inbox.payloads::<Note>() {
                journal.deliveries.push(Delivery::of(packet, note, now));
                if self.echo && !note.0.starts_with("re:") {
                    replies.push((packet.origin(), Note(format!("re:{}", note.0))));
                }
            }
        }
        for (to, reply) in replies {
            ctx.send(&reply, to)?;
        }
        Ok(())
    }

    fn post_step(&mut self, ctx: &mut Context<'_>) -> SimResult<()> {
        if self.chatter <= 0.0 {
            return Ok(());
        }
        let me = ctx.node_id()?;
        let now = ctx.current_time();
        if ctx.rng().gen_bool(self.chatter) {
            ctx.broadcast(&Note(format!("{me}:{now}:b")))?;
        }
        let others: Vec<NodeId> = ctx
            .simulation()
            .node_ids()
            .into_iter()
            .filter(|id| *id != me)
            .collect();
        if !others.is_empty() && ctx.rng().gen_bool(self.chatter) {
            let to = others[ctx.rng().gen_range(0..others.len())];
            ctx.send(&Note(format!("{me}:{now}:u")), to)?;
        }
        Ok(())
    }
}

/// Sends (or broadcasts, without a target) a note when it fires.
pub struct SendNote {
    pub to: Option<NodeId>,
    pub text: String,
}

impl Timer for SendNote {
    fn fire(&mut self, ctx: &mut Context<'_>) -> SimResult<()> {
        let note = Note(self.text.clone());
        match self.to {
            Some(to) => ctx.send(&note, to),
            None => ctx.broadcast(&note),
        }
    }
}

/// Appends its label to the journal when it fires.
pub struct Mark {
    pub journal: SharedJournal,
    pub label: String,
}

impl Timer for Mark {
    fn fire(&mut self, ctx: &mut Context<'_>) -> SimResult<()> {
        self.journal.lock().unwrap().timers.push((
            ctx.current_time(),
            ctx.owner(),
            self.label.clone(),
        ));
        Ok(())
    }
}

/// Registry with the builtins plus the `probe` project: node kinds `probe`,
/// `echo` and `chatter`, and a custom global that never terminates.
pub fn probe_registry(journal: &SharedJournal) -> ModelRegistry {
    let mut registry = ModelRegistry::with_builtins();
    let j = Arc::clone(journal);
    registry.register_node_kind(PROJECT, "probe", move || Box::new(Probe::new(&j)));
    let j = Arc::clone(journal);
    registry.register_node_kind(PROJECT, "echo", move || Box::new(Probe::echo(&j)));
    let j = Arc::clone(journal);
    registry.register_node_kind(PROJECT, "chatter", move || {
        Box::new(Probe::chatter(&j, 0.3))
    });
    registry.register_project(PROJECT, || Box::new(DefaultCustomGlobal));
    registry
}

pub fn transit(time: u64) -> ModelRef {
    ModelRef::with_parameters("constant_time", json!({ "time": time }))
}

pub struct TestHarness {
    pub sim: Simulation,
    pub journal: SharedJournal,
}

impl TestHarness {
    pub fn base_config() -> SimConfig {
        SimConfig {
            rounds: 100,
            ..SimConfig::default()
        }
    }

    pub fn new() -> Self {
        Self::with_config(Self::base_config())
    }

    pub fn asynchronous() -> Self {
        Self::with_config(SimConfig {
            asynchronous: true,
            ..Self::base_config()
        })
    }

    pub fn with_transit(time: u64) -> Self {
        Self::with_config(SimConfig {
            message_transmission_model: transit(time),
            ..Self::base_config()
        })
    }

    pub fn with_config(config: SimConfig) -> Self {
        let journal = SharedJournal::default();
        let registry = Arc::new(probe_registry(&journal));
        let sim = Simulation::new(config, registry).expect("test config is valid");
        Self { sim, journal }
    }

    /// Build through `init`, adding the node groups listed in `config`.
    pub fn init(config: SimConfig) -> Self {
        let journal = SharedJournal::default();
        let registry = Arc::new(probe_registry(&journal));
        let sim = Simulation::init(PROJECT, registry, config).expect("init succeeds");
        Self { sim, journal }
    }

    pub fn add(&mut self, behavior: Box<dyn NodeBehavior>, x: f64, y: f64, models: NodeModels) -> NodeId {
        self.sim
            .add_node(behavior, models, Position::planar(x, y))
            .expect("node is added")
    }

    pub fn add_probe(&mut self, x: f64, y: f64, radius: f64) -> NodeId {
        let probe = Probe::new(&self.journal);
        self.add(Box::new(probe), x, y, NodeModels::stationary(radius).unwrap())
    }

    pub fn add_echo(&mut self, x: f64, y: f64, radius: f64) -> NodeId {
        let probe = Probe::echo(&self.journal);
        self.add(Box::new(probe), x, y, NodeModels::stationary(radius).unwrap())
    }

    pub fn send_at(&mut self, from: NodeId, to: NodeId, text: &str, at: u64) {
        let timer = SendNote {
            to: Some(to),
            text: text.to_string(),
        };
        self.sim
            .start_timer_absolute(from, timer, at)
            .expect("timer starts");
    }

    pub fn broadcast_at(&mut self, from: NodeId, text: &str, at: u64) {
        let timer = SendNote {
            to: None,
            text: text.to_string(),
        };
        self.sim
            .start_timer_absolute(from, timer, at)
            .expect("timer starts");
    }

    pub fn mark_at(&mut self, owner: NodeId, label: &str, at: u64) {
        let timer = Mark {
            journal: Arc::clone(&self.journal),
            label: label.to_string(),
        };
        self.sim
            .start_timer_absolute(owner, timer, at)
            .expect("timer starts");
    }

    pub fn run(&mut self, steps: u64) -> RunSummary {
        self.sim.run(steps).expect("run succeeds")
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.journal.lock().unwrap().deliveries.clone()
    }

    pub fn received_by(&self, id: NodeId) -> Vec<Delivery> {
        self.deliveries().into_iter().filter(|d| d.to == id).collect()
    }

    /// Nacks handled by `id`, i.e. failed packets it sent.
    pub fn nacks_of(&self, id: NodeId) -> Vec<Delivery> {
        let journal = self.journal.lock().unwrap();
        journal.nacks.iter().filter(|d| d.from == id).cloned().collect()
    }

    pub fn timers(&self) -> Vec<(u64, Option<NodeId>, String)> {
        self.journal.lock().unwrap().timers.clone()
    }

    /// Positions reported to `id` through `on_position_updated`, in order.
    pub fn track_of(&self, id: NodeId) -> Vec<Position> {
        let journal = self.journal.lock().unwrap();
        journal
            .positions
            .iter()
            .filter(|(_, node, _)| *node == id)
            .map(|(_, _, position)| *position)
            .collect()
    }
}
