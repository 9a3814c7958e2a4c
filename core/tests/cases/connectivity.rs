use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use mobsinet_core::models::{ConnectivityModel, Model, ModelEnv};
use mobsinet_core::*;

use crate::common::{Probe, TestHarness};

/// Counts how often it is asked.
struct Counting {
    calls: Arc<AtomicUsize>,
}

impl Model for Counting {
    fn name(&self) -> &str {
        "counting"
    }
}

impl ConnectivityModel for Counting {
    fn is_connected(&self, _from: &Node, _to: &Node, _env: &mut ModelEnv<'_>) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Connects everything while the switch is on.
struct Switch {
    on: Arc<AtomicBool>,
}

impl Model for Switch {
    fn name(&self) -> &str {
        "switch"
    }
}

impl ConnectivityModel for Switch {
    fn is_connected(&self, _from: &Node, _to: &Node, _env: &mut ModelEnv<'_>) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

#[test]
fn test_edges_follow_the_senders_radius() {
    let mut h = TestHarness::new();
    let a = h.add_probe(10.0, 10.0, 10.0);
    let b = h.add_probe(15.0, 10.0, 3.0);
    h.send_at(a, b, "long reach", 1);
    h.send_at(b, a, "short reach", 1);

    h.run(5);

    assert!(h.sim.has_edge(a, b));
    assert!(!h.sim.has_edge(b, a));
    assert_eq!(h.sim.neighbors(a), vec![b]);
    assert!(h.sim.neighbors(b).is_empty());

    let at_b = h.received_by(b);
    assert_eq!(at_b.len(), 1);
    assert_eq!(at_b[0].text, "long reach");
    assert_eq!(at_b[0].time, 2);

    assert!(h.received_by(a).is_empty());
    let nacks = h.nacks_of(b);
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].text, "short reach");
    assert_eq!(nacks[0].time, 3);
}

#[test]
fn test_every_ordered_pair_is_evaluated_each_round() {
    let calls = Arc::new(AtomicUsize::new(0));
    let model: Arc<dyn ConnectivityModel> = Arc::new(Counting {
        calls: Arc::clone(&calls),
    });

    let mut h = TestHarness::new();
    for i in 0..5 {
        let models = NodeModels::stationary(1.0).unwrap().with_connectivity(Arc::clone(&model));
        let probe = Probe::new(&h.journal);
        h.add(Box::new(probe), i as f64 * 10.0, 0.0, models);
    }

    h.run(3);

    assert_eq!(calls.load(Ordering::SeqCst), 3 * 20);
    assert_eq!(h.sim.graph().len(), 20);
}

#[test]
fn test_disabled_connectivity_keeps_manual_edges() {
    let mut h = TestHarness::with_config(SimConfig {
        connectivity_enabled: false,
        ..TestHarness::base_config()
    });
    let a = h.add_probe(0.0, 0.0, 1.0);
    let b = h.add_probe(90.0, 0.0, 1.0);
    h.sim.add_edge(a, b).unwrap();
    h.send_at(a, b, "wired", 1);

    h.run(3);

    assert!(h.sim.has_edge(a, b));
    assert_eq!(h.received_by(b).len(), 1);
}

#[test]
fn test_lost_link_turns_packet_in_flight_into_nack() {
    let on = Arc::new(AtomicBool::new(true));
    let model: Arc<dyn ConnectivityModel> = Arc::new(Switch { on: Arc::clone(&on) });

    let mut h = TestHarness::with_transit(5);
    let add = |h: &mut TestHarness, x: f64| {
        let models = NodeModels::stationary(1.0).unwrap().with_connectivity(Arc::clone(&model));
        let probe = Probe::new(&h.journal);
        h.add(Box::new(probe), x, 0.0, models)
    };
    let a = add(&mut h, 0.0);
    let b = add(&mut h, 5.0);
    h.send_at(a, b, "doomed", 1);

    h.run(2);
    assert!(h.sim.has_edge(a, b));
    on.store(false, Ordering::SeqCst);

    h.run(6);

    assert!(!h.sim.has_edge(a, b));
    assert!(h.received_by(b).is_empty());
    let nacks = h.nacks_of(a);
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].text, "doomed");
    assert_eq!(nacks[0].sent, 1);
    assert_eq!(nacks[0].time, 7);

    let changes = h.journal.lock().unwrap().neighborhood_changes.clone();
    assert!(changes.contains(&(1, a)));
    assert!(changes.contains(&(3, a)));
}

#[test]
fn test_reevaluation_counts_connections_and_disconnections() {
    let mut h = TestHarness::new();
    let a = h.add_probe(0.0, 0.0, 10.0);
    let b = h.add_probe(5.0, 0.0, 10.0);
    h.add_probe(50.0, 0.0, 10.0);

    let first = h.sim.reevaluate_connections();
    assert_eq!(
        first,
        ConnectivityUpdate {
            connections: 2,
            disconnections: 0
        }
    );

    // b leaves a behind and joins c.
    h.sim.set_position(b, Position::planar(42.0, 0.0)).unwrap();
    let second = h.sim.reevaluate_connections();
    assert_eq!(second.connections, 2);
    assert_eq!(second.disconnections, 2);
    assert_eq!(second.total(), 4);
    assert!(!h.sim.has_edge(a, b));

    assert_eq!(h.sim.reevaluate_connections(), ConnectivityUpdate::default());
}
