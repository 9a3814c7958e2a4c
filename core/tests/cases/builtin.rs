use std::sync::Arc;

use mobsinet_core::models::MobilityModel;
use mobsinet_core::*;
use serde_json::json;

use crate::common::{Note, Probe, TestHarness, PROJECT};

const EPSILON: f64 = 1e-9;

fn mobility(name: &str, parameters: serde_json::Value) -> Arc<dyn MobilityModel> {
    ModelRegistry::with_builtins()
        .mobility(&ModelRef::with_parameters(name, parameters), PROJECT)
        .unwrap()
}

fn add_mobile(h: &mut TestHarness, x: f64, y: f64, model: &Arc<dyn MobilityModel>) -> NodeId {
    let models = NodeModels::stationary(5.0)
        .unwrap()
        .with_mobility(Arc::clone(model));
    let probe = Probe::new(&h.journal);
    h.add(Box::new(probe), x, y, models)
}

fn steps(track: &[Position]) -> Vec<f64> {
    track
        .windows(2)
        .map(|pair| pair[0].euclidean_distance(&pair[1]))
        .collect()
}

#[test]
fn test_random_waypoint_walks_then_waits() {
    let model = mobility(
        "random_waypoint",
        json!({ "speed_range": [2.0, 2.0], "waiting_time_range": [3.0, 3.0] }),
    );
    let mut h = TestHarness::new();
    let a = add_mobile(&mut h, 50.0, 50.0, &model);

    h.run(100);

    let track = h.track_of(a);
    assert_eq!(track.len(), 100);
    let dims = h.sim.config().dimensions;
    assert!(track.iter().all(|p| dims.contains(p)));
    assert!(steps(&track).iter().all(|&d| d <= 2.0 + EPSILON));

    // Arrival at the first waypoint is followed by exactly three idle rounds.
    let arrival = track
        .windows(2)
        .position(|pair| pair[0] == pair[1])
        .expect("reaches a waypoint within 100 rounds");
    assert!(track[arrival..=arrival + 3].iter().all(|p| *p == track[arrival]));
    assert_ne!(track[arrival + 4], track[arrival]);
}

#[test]
fn test_shared_mobility_model_keeps_one_leg_per_node() {
    let model = mobility(
        "random_waypoint",
        json!({ "speed_range": [1.5, 3.0], "waiting_time_range": [0, 2] }),
    );
    let mut h = TestHarness::new();
    let a = add_mobile(&mut h, 10.0, 10.0, &model);
    let b = add_mobile(&mut h, 90.0, 90.0, &model);

    h.run(60);

    for id in [a, b] {
        let track = h.track_of(id);
        assert!(steps(&track).iter().all(|&d| d <= 3.0 + EPSILON), "node {id}");
    }
}

#[test]
fn test_random_direction_bounces_off_the_border() {
    let model = mobility(
        "random_direction",
        json!({
            "speed_range": [1.0, 1.0],
            "waiting_time_range": [0.0, 0.0],
            "move_time_range": [30.0, 30.0]
        }),
    );
    let mut h = TestHarness::with_config(SimConfig {
        dimensions: Dimensions {
            x: [0.0, 10.0],
            y: [0.0, 10.0],
            z: [0.0, 0.0],
        },
        ..TestHarness::base_config()
    });
    let a = add_mobile(&mut h, 5.0, 5.0, &model);

    h.run(200);

    let track = h.track_of(a);
    let dims = h.sim.config().dimensions;
    assert!(track.iter().all(|p| dims.contains(p) && p.z == 0.0));
    assert!(steps(&track).iter().all(|&d| d <= 1.0 + EPSILON));
    let moving = steps(&track).iter().filter(|&&d| d > EPSILON).count();
    assert!(moving > 150, "moved in only {moving} rounds");
}

#[test]
fn test_circular_distribution_places_nodes_on_a_circle() {
    let mut h = TestHarness::new();
    let circle = |rotation: &str| {
        ModelRef::with_parameters(
            "circular",
            json!({ "radius": 10.0, "midpoint": [40.0, 60.0], "rotation_direction": rotation }),
        )
    };

    let ids = h
        .sim
        .add_nodes(&NodeGroup::new(4, "probe:probe").with_distribution(circle("anti-clockwise")))
        .unwrap();
    let placed: Vec<Position> = ids.iter().map(|id| h.sim.node(*id).unwrap().position()).collect();
    let expected = [(50.0, 60.0), (40.0, 70.0), (30.0, 60.0), (40.0, 50.0)];
    for (position, (x, y)) in placed.iter().zip(expected) {
        assert!((position.x - x).abs() < EPSILON && (position.y - y).abs() < EPSILON);
    }

    let ids = h
        .sim
        .add_nodes(&NodeGroup::new(4, "probe:probe").with_distribution(circle("clockwise")))
        .unwrap();
    let second = h.sim.node(ids[1]).unwrap().position();
    assert!((second.x - 40.0).abs() < EPSILON && (second.y - 50.0).abs() < EPSILON);
}

#[test]
fn test_circle_must_fit_the_area() {
    let mut h = TestHarness::new();
    let group = NodeGroup::new(3, "probe:probe").with_distribution(ModelRef::with_parameters(
        "circular",
        json!({ "radius": 60.0 }),
    ));

    let err = h.sim.add_nodes(&group).unwrap_err();

    assert!(matches!(
        err,
        SimError::InvalidParameter { ref model, .. } if model == "circular"
    ));
    assert_eq!(h.sim.node_count(), 0);
}

#[test]
fn test_inert_nodes_are_available_to_every_project() {
    let mut h = TestHarness::new();

    let ids = h.sim.add_nodes(&NodeGroup::new(2, "inert")).unwrap();
    h.sim.add_nodes(&NodeGroup::new(1, "default:inert")).unwrap();

    assert_eq!(ids, vec![1, 2]);
    for node in h.sim.nodes() {
        assert_eq!(node.size(), 3.0);
        assert!(node.behavior_as::<InertNode>().is_some());
    }
}

#[test]
fn test_message_timer_sends_or_broadcasts() {
    let mut h = TestHarness::new();
    let a = h.add_probe(0.0, 0.0, 10.0);
    let b = h.add_probe(5.0, 0.0, 10.0);
    let c = h.add_probe(0.0, 5.0, 10.0);
    let to_b = MessageTimer::unicast(Note("direct".to_string()), b);
    assert_eq!(to_b.receiver(), Some(b));
    h.sim.start_timer_relative(a, to_b, 1).unwrap();
    h.sim
        .start_timer_relative(a, MessageTimer::broadcast(Note("all".to_string())), 2)
        .unwrap();

    h.run(3);

    let at_b = h.received_by(b);
    assert_eq!(at_b.len(), 2);
    assert_eq!((at_b[0].text.as_str(), at_b[0].kind), ("direct", PacketKind::Unicast));
    assert_eq!((at_b[1].text.as_str(), at_b[1].kind), ("all", PacketKind::Multicast));
    let at_c = h.received_by(c);
    assert_eq!(at_c.len(), 1);
    assert_eq!(at_c[0].time, 3);
}

#[test]
fn test_message_timer_carries_empty_messages() {
    let mut h = TestHarness::new();
    let a = h.add_probe(0.0, 0.0, 10.0);
    let b = h.add_probe(5.0, 0.0, 10.0);
    h.sim
        .start_timer_relative(a, MessageTimer::unicast(NoContent, b), 1)
        .unwrap();

    h.run(2);

    assert_eq!(h.sim.stats().delivered(), 1);
    assert!(h.deliveries().is_empty());
}
