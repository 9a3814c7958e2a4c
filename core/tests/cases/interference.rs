use std::sync::Arc;

use mobsinet_core::models::interference::{RandomDrop, RandomDropConfig};
use mobsinet_core::models::{InterferenceModel, Model, ModelEnv};
use mobsinet_core::*;

use crate::common::{Probe, TestHarness};

/// Disturbs every packet it is asked about at one instant only.
struct DisturbAt(u64);

impl Model for DisturbAt {
    fn name(&self) -> &str {
        "disturb_at"
    }
}

impl InterferenceModel for DisturbAt {
    fn is_disturbed(&self, _packet: &Packet, env: &mut ModelEnv<'_>) -> bool {
        env.time == self.0
    }
}

fn always_drop() -> Arc<dyn InterferenceModel> {
    Arc::new(RandomDrop {
        config: RandomDropConfig { probability: 1.0 },
    })
}

fn add_with_interference(h: &mut TestHarness, x: f64, model: Arc<dyn InterferenceModel>) -> NodeId {
    let models = NodeModels::stationary(10.0).unwrap().with_interference(model);
    let probe = Probe::new(&h.journal);
    h.add(Box::new(probe), x, 0.0, models)
}

#[test]
fn test_interference_at_destination_nacks_the_packet() {
    let mut h = TestHarness::new();
    let a = h.add_probe(0.0, 0.0, 10.0);
    let b = add_with_interference(&mut h, 5.0, always_drop());
    h.send_at(a, b, "noisy", 1);

    h.run(4);

    assert!(h.received_by(b).is_empty());
    let nacks = h.nacks_of(a);
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].time, 3);
}

#[test]
fn test_only_the_destination_model_is_consulted() {
    let mut h = TestHarness::new();
    let a = add_with_interference(&mut h, 0.0, always_drop());
    let b = h.add_probe(5.0, 0.0, 10.0);
    h.send_at(a, b, "clean", 1);

    h.run(3);

    assert_eq!(h.received_by(b).len(), 1);
    assert!(h.nacks_of(a).is_empty());
}

#[test]
fn test_denial_during_transit_is_permanent() {
    let mut h = TestHarness::with_transit(5);
    let a = h.add_probe(0.0, 0.0, 10.0);
    let b = add_with_interference(&mut h, 5.0, Arc::new(DisturbAt(3)));
    h.send_at(a, b, "hit once", 1);

    h.run(8);

    assert!(h.received_by(b).is_empty());
    let nacks = h.nacks_of(a);
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].time, 7);
}

#[test]
fn test_undisturbed_slow_packet_arrives() {
    let mut h = TestHarness::with_transit(5);
    let a = h.add_probe(0.0, 0.0, 10.0);
    let b = add_with_interference(&mut h, 5.0, Arc::new(DisturbAt(100)));
    h.send_at(a, b, "lucky", 1);

    h.run(8);

    let at_b = h.received_by(b);
    assert_eq!(at_b.len(), 1);
    assert_eq!(at_b[0].time, 6);
    assert_eq!(at_b[0].sent, 1);
}

#[test]
fn test_disabled_interference_is_never_tested() {
    let mut h = TestHarness::with_config(SimConfig {
        interference_enabled: false,
        ..TestHarness::base_config()
    });
    let a = h.add_probe(0.0, 0.0, 10.0);
    let b = add_with_interference(&mut h, 5.0, always_drop());
    h.send_at(a, b, "quiet", 1);

    h.run(3);

    assert_eq!(h.received_by(b).len(), 1);
}

#[test]
fn test_asynchronous_delivery_tests_interference_on_arrival() {
    let mut h = TestHarness::asynchronous();
    let a = h.add_probe(0.0, 0.0, 10.0);
    let b = add_with_interference(&mut h, 5.0, always_drop());
    h.send_at(a, b, "noisy", 1);

    h.run(10);

    assert!(h.received_by(b).is_empty());
    let nacks = h.nacks_of(a);
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].time, 2);
    assert_eq!(h.sim.stats().nacked(), 1);
}
