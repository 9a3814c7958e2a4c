use mobsinet_core::models::{ConnectivityModel, Model, ModelEnv};
use mobsinet_core::projects;
use mobsinet_core::*;
use serde_json::json;

use crate::common::PROJECT;

/// Shadows the builtin `udg` inside one project.
#[derive(Debug, Default)]
struct Shadow;

impl Model for Shadow {
    fn name(&self) -> &str {
        "shadow"
    }
}

impl ConnectivityModel for Shadow {
    fn is_connected(&self, _from: &Node, _to: &Node, _env: &mut ModelEnv<'_>) -> bool {
        false
    }
}

fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::with_builtins();
    registry.register_connectivity::<Shadow>(PROJECT, "udg");
    projects::register_all(&mut registry);
    registry
}

#[test]
fn test_bare_name_prefers_active_project() {
    let registry = registry();

    let local = registry.connectivity(&ModelRef::new("udg"), PROJECT).unwrap();
    assert_eq!(local.name(), "shadow");

    let builtin = registry.connectivity(&ModelRef::new("udg"), "pingpong").unwrap();
    assert_eq!(builtin.name(), "udg");
}

#[test]
fn test_qualified_name_is_exact() {
    let registry = registry();

    let builtin = registry
        .connectivity(&ModelRef::new("default:udg"), PROJECT)
        .unwrap();
    assert_eq!(builtin.name(), "udg");

    let foreign = registry
        .connectivity(&ModelRef::new("probe:udg"), "pingpong")
        .unwrap();
    assert_eq!(foreign.name(), "shadow");

    // A qualified name never falls back to the builtins.
    let err = registry
        .mobility(&ModelRef::new("pingpong:no_mobility"), PROJECT)
        .err()
        .expect("qualified lookup fails");
    assert!(matches!(err, SimError::UnknownModel { kind: "mobility", .. }));
}

#[test]
fn test_unknown_model_names_its_kind() {
    let err = registry()
        .reliability(&ModelRef::new("carrier_pigeon"), PROJECT)
        .err()
        .expect("unknown model is rejected");
    assert_eq!(
        err,
        SimError::UnknownModel {
            kind: "reliability",
            name: "carrier_pigeon".to_string()
        }
    );

    let err = registry()
        .transmission(&ModelRef::new("smoke_signal"), PROJECT)
        .err()
        .expect("unknown model is rejected");
    assert!(matches!(err, SimError::UnknownModel { kind: "transmission", .. }));
}

#[test]
fn test_stationary_models_validate_radius() {
    for radius in [-1.0, 0.0, f64::NAN] {
        assert!(matches!(
            NodeModels::stationary(radius),
            Err(SimError::InvalidParameter { ref parameter, .. }) if parameter == "radius"
        ));
    }
    let models = NodeModels::stationary(7.5).unwrap();
    assert_eq!(models.connectivity.name(), "udg");
}

#[test]
fn test_parameters_are_validated_before_use() {
    let registry = registry();

    let negative = ModelRef::with_parameters("udg", json!({ "radius": -1.0 }));
    let err = registry
        .connectivity(&negative, "pingpong")
        .err()
        .expect("negative radius is rejected");
    assert!(matches!(
        err,
        SimError::InvalidParameter { ref model, ref parameter, .. }
            if model == "udg" && parameter == "radius"
    ));

    let mistyped = ModelRef::with_parameters("random_walk", json!({ "speed": "fast" }));
    assert!(matches!(
        registry.mobility(&mistyped, PROJECT),
        Err(SimError::InvalidParameter { .. })
    ));

    let inverted = ModelRef::with_parameters("random_time", json!({ "min": 5, "max": 2 }));
    assert!(registry.transmission(&inverted, PROJECT).is_err());

    let waypoint = ModelRef::with_parameters(
        "random_waypoint",
        json!({ "speed_range": [4.0, 2.0], "waiting_time_range": [0, 1] }),
    );
    assert!(registry.mobility(&waypoint, PROJECT).is_err());
    let standstill = ModelRef::with_parameters("random_waypoint", json!({ "speed_range": [0, 3] }));
    assert!(registry.mobility(&standstill, PROJECT).is_err());

    let direction = ModelRef::with_parameters(
        "random_direction",
        json!({ "move_time_range": [-1.0, 5.0] }),
    );
    assert!(registry.mobility(&direction, PROJECT).is_err());

    let circle = ModelRef::with_parameters("circular", json!({ "rotation_direction": "sideways" }));
    assert!(registry.distribution(&circle, PROJECT).is_err());

    let qudg = ModelRef::with_parameters(
        "qudg",
        json!({ "r_min": 20.0, "r_max": 10.0, "probability": 0.5 }),
    );
    assert!(registry.connectivity(&qudg, PROJECT).is_err());

    let drop = ModelRef::with_parameters("random_drop", json!({ "probability": 1.5 }));
    assert!(registry.interference(&drop, PROJECT).is_err());

    let lossy = ModelRef::with_parameters("lossy_delivery", json!({ "drop_rate": 0.25 }));
    assert_eq!(registry.reliability(&lossy, PROJECT).unwrap().name(), "lossy_delivery");
}

#[test]
fn test_missing_parameters_use_defaults() {
    let registry = registry();
    let grid = registry.distribution(&ModelRef::new("grid"), PROJECT).unwrap();
    assert_eq!(grid.name(), "grid");
    let random = registry
        .transmission(&ModelRef::new("random_time"), PROJECT)
        .unwrap();
    assert_eq!(random.name(), "random_time");
}

#[test]
fn test_node_kinds_and_projects() {
    let registry = registry();

    assert!(registry.has_node_kind("ping", "pingpong"));
    assert!(registry.has_node_kind("pingpong:pong", PROJECT));
    assert!(!registry.has_node_kind("ping", PROJECT));
    assert!(registry.has_node_kind("inert", "pingpong"));
    assert!(registry.has_node_kind("default:inert", PROJECT));
    assert_eq!(registry.create_node("pingpong:ping", PROJECT).unwrap().kind(), "ping");
    assert!(matches!(
        registry.create_node("relay", "pingpong"),
        Err(SimError::UnknownNodeKind(kind)) if kind == "relay"
    ));

    assert!(registry.projects().any(|p| p == "pingpong"));
    assert!(registry.create_custom_global("pingpong").is_ok());
    assert!(matches!(
        registry.create_custom_global(PROJECT),
        Err(SimError::MissingCustomGlobal { .. })
    ));
}

#[test]
fn test_catalog_lists_every_model() {
    let catalog = registry().catalog();

    assert_eq!(catalog.len(), 6);
    assert_eq!(
        catalog["connectivity"],
        ["default:no_connectivity", "default:qudg", "default:udg", "probe:udg"]
    );
    assert_eq!(
        catalog["mobility"],
        [
            "default:no_mobility",
            "default:random_direction",
            "default:random_walk",
            "default:random_waypoint"
        ]
    );
    assert_eq!(
        catalog["distribution"],
        ["default:circular", "default:grid", "default:line", "default:random"]
    );
    assert!(catalog["transmission"].contains(&"default:constant_time".to_string()));
    assert!(catalog["reliability"].contains(&"default:lossy_delivery".to_string()));
    assert!(catalog["interference"].contains(&"default:random_drop".to_string()));
}
