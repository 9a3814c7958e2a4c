use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::connectivity::{NoConnectivity, Qudg, Udg};
use super::distribution::{
    CircularDistribution, GridDistribution, LineDistribution, RandomDistribution,
};
use super::interference::{NoInterference, RandomDrop};
use super::mobility::{NoMobility, RandomDirection, RandomWalk, RandomWaypoint};
use super::reliability::{LossyDelivery, ReliableDelivery};
use super::transmission::{ConstantTime, RandomTime};
use super::{
    ConnectivityModel, DistributionModel, InterferenceModel, MessageTransmissionModel,
    MobilityModel, Model, ReliabilityModel,
};
use crate::builtin::InertNode;
use crate::config::ModelRef;
use crate::error::{SimError, SimResult};
use crate::traits::{CustomGlobal, NodeBehavior};

/// Namespace of the models shipped with the engine.
pub const BUILTIN_NAMESPACE: &str = "default";

type Key = (String, String);
type ModelFactory<T> = Arc<dyn Fn(&Value) -> SimResult<Arc<T>> + Send + Sync>;
type NodeFactory = Arc<dyn Fn() -> Box<dyn NodeBehavior> + Send + Sync>;
type GlobalFactory = Arc<dyn Fn() -> Box<dyn CustomGlobal> + Send + Sync>;

/// `"project:name"` is looked up verbatim; a bare name is tried in the active
/// project first and then in the builtin namespace.
fn lookup<'a, V>(entries: &'a BTreeMap<Key, V>, name: &str, project: &str) -> Option<&'a V> {
    if let Some((namespace, local)) = name.split_once(':') {
        return entries.get(&(namespace.to_string(), local.to_string()));
    }
    entries
        .get(&(project.to_string(), name.to_string()))
        .or_else(|| entries.get(&(BUILTIN_NAMESPACE.to_string(), name.to_string())))
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// Create a model from its defaults, then validate and apply parameters.
fn build<M: Model + Default>(parameters: &Value) -> SimResult<M> {
    let mut model = M::default();
    model.check_parameters(parameters)?;
    model.set_parameters(parameters)?;
    Ok(model)
}

struct Catalog<T: ?Sized> {
    kind: &'static str,
    entries: BTreeMap<Key, ModelFactory<T>>,
}

impl<T: ?Sized> Catalog<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    fn insert<F>(&mut self, namespace: &str, name: &str, factory: F)
    where
        F: Fn(&Value) -> SimResult<Arc<T>> + Send + Sync + 'static,
    {
        self.entries.insert(key(namespace, name), Arc::new(factory));
    }

    fn resolve(&self, model: &ModelRef, project: &str) -> SimResult<Arc<T>> {
        let factory =
            lookup(&self.entries, &model.name, project).ok_or_else(|| SimError::UnknownModel {
                kind: self.kind,
                name: model.name.clone(),
            })?;
        factory(&model.parameters)
    }

    fn names(&self) -> Vec<String> {
        self.entries
            .keys()
            .map(|(namespace, name)| format!("{namespace}:{name}"))
            .collect()
    }
}

/// Name-keyed catalog of models, node kinds and per-project custom globals.
///
/// Populated once before `init` and shared read-only afterwards.
pub struct ModelRegistry {
    mobility: Catalog<dyn MobilityModel>,
    connectivity: Catalog<dyn ConnectivityModel>,
    interference: Catalog<dyn InterferenceModel>,
    reliability: Catalog<dyn ReliabilityModel>,
    transmission: Catalog<dyn MessageTransmissionModel>,
    distribution: Catalog<dyn DistributionModel>,
    node_kinds: BTreeMap<Key, NodeFactory>,
    projects: BTreeMap<String, GlobalFactory>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

macro_rules! model_kind {
    ($register:ident, $resolve:ident, $field:ident, $trait:ident) => {
        pub fn $register<M>(&mut self, namespace: &str, name: &str)
        where
            M: $trait + Default + 'static,
        {
            self.$field.insert(namespace, name, |parameters: &Value| {
                let model: Arc<dyn $trait> = Arc::new(build::<M>(parameters)?);
                Ok(model)
            });
        }

        pub fn $resolve(&self, model: &ModelRef, project: &str) -> SimResult<Arc<dyn $trait>> {
            self.$field.resolve(model, project)
        }
    };
}

impl ModelRegistry {
    /// An empty registry. Most callers want [`ModelRegistry::with_builtins`].
    pub fn new() -> Self {
        Self {
            mobility: Catalog::new("mobility"),
            connectivity: Catalog::new("connectivity"),
            interference: Catalog::new("interference"),
            reliability: Catalog::new("reliability"),
            transmission: Catalog::new("transmission"),
            distribution: Catalog::new("distribution"),
            node_kinds: BTreeMap::new(),
            projects: BTreeMap::new(),
        }
    }

    model_kind!(register_mobility, mobility, mobility, MobilityModel);
    model_kind!(register_connectivity, connectivity, connectivity, ConnectivityModel);
    model_kind!(register_interference, interference, interference, InterferenceModel);
    model_kind!(register_reliability, reliability, reliability, ReliabilityModel);
    model_kind!(register_transmission, transmission, transmission, MessageTransmissionModel);
    model_kind!(register_distribution, distribution, distribution, DistributionModel);

    pub fn register_node_kind<F>(&mut self, namespace: &str, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn NodeBehavior> + Send + Sync + 'static,
    {
        self.node_kinds.insert(key(namespace, name), Arc::new(factory));
    }

    pub fn create_node(&self, kind: &str, project: &str) -> SimResult<Box<dyn NodeBehavior>> {
        lookup(&self.node_kinds, kind, project)
            .map(|factory| factory())
            .ok_or_else(|| SimError::UnknownNodeKind(kind.to_string()))
    }

    pub fn has_node_kind(&self, kind: &str, project: &str) -> bool {
        lookup(&self.node_kinds, kind, project).is_some()
    }

    /// Register the custom global a project is initialized with.
    pub fn register_project<F>(&mut self, project: &str, factory: F)
    where
        F: Fn() -> Box<dyn CustomGlobal> + Send + Sync + 'static,
    {
        self.projects.insert(project.to_string(), Arc::new(factory));
    }

    pub fn create_custom_global(&self, project: &str) -> SimResult<Box<dyn CustomGlobal>> {
        self.projects
            .get(project)
            .map(|factory| factory())
            .ok_or_else(|| SimError::MissingCustomGlobal {
                project: project.to_string(),
            })
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    /// Every registered model as `kind -> ["namespace:name", ...]`.
    pub fn catalog(&self) -> BTreeMap<&'static str, Vec<String>> {
        BTreeMap::from([
            (self.mobility.kind, self.mobility.names()),
            (self.connectivity.kind, self.connectivity.names()),
            (self.interference.kind, self.interference.names()),
            (self.reliability.kind, self.reliability.names()),
            (self.transmission.kind, self.transmission.names()),
            (self.distribution.kind, self.distribution.names()),
        ])
    }
}

macro_rules! register_builtins {
    ($($register:ident { $($name:literal => $type:ty),* $(,)? })*) => {
        impl ModelRegistry {
            /// A registry holding every model and node kind shipped with the
            /// engine.
            pub fn with_builtins() -> Self {
                let mut registry = Self::new();
                $($(registry.$register::<$type>(BUILTIN_NAMESPACE, $name);)*)*
                registry.register_node_kind(BUILTIN_NAMESPACE, "inert", || Box::new(InertNode));
                registry
            }
        }
    };
}

register_builtins!(
    register_mobility {
        "no_mobility" => NoMobility,
        "random_walk" => RandomWalk,
        "random_waypoint" => RandomWaypoint,
        "random_direction" => RandomDirection,
    }
    register_connectivity {
        "udg" => Udg,
        "qudg" => Qudg,
        "no_connectivity" => NoConnectivity,
    }
    register_interference {
        "no_interference" => NoInterference,
        "random_drop" => RandomDrop,
    }
    register_reliability {
        "reliable_delivery" => ReliableDelivery,
        "lossy_delivery" => LossyDelivery,
    }
    register_transmission {
        "constant_time" => ConstantTime,
        "random_time" => RandomTime,
    }
    register_distribution {
        "random" => RandomDistribution,
        "line" => LineDistribution,
        "grid" => GridDistribution,
        "circular" => CircularDistribution,
    }
);
