//! Pluggable behavior contracts.
//!
//! Six independent trait hierarchies, one per model kind. Instances are shared
//! (`Arc`) between every node of a batch, so all domain methods take `&self`;
//! randomness and the clock come in through [`ModelEnv`].

use rand::rngs::StdRng;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{SimError, SimResult};
use crate::message::{Message, Packet};
use crate::node::Node;
use crate::position::{Dimensions, Position};

pub mod connectivity;
pub mod distribution;
pub mod interference;
pub mod mobility;
pub mod registry;
pub mod reliability;
pub mod transmission;

pub use registry::{ModelRegistry, BUILTIN_NAMESPACE};

/// What a model may observe of the simulation while it decides.
pub struct ModelEnv<'a> {
    pub time: u64,
    pub dimensions: &'a Dimensions,
    pub rng: &'a mut StdRng,
}

pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    /// Validate raw parameters without applying them.
    fn check_parameters(&self, _parameters: &Value) -> SimResult<()> {
        Ok(())
    }

    fn set_parameters(&mut self, _parameters: &Value) -> SimResult<()> {
        Ok(())
    }
}

pub trait MobilityModel: Model {
    fn get_next_position(&self, node: &Node, env: &mut ModelEnv<'_>) -> Position;
}

/// Directed: `is_connected(a, b)` says nothing about `b -> a`.
pub trait ConnectivityModel: Model {
    fn is_connected(&self, from: &Node, to: &Node, env: &mut ModelEnv<'_>) -> bool;
}

pub trait InterferenceModel: Model {
    fn is_disturbed(&self, packet: &Packet, env: &mut ModelEnv<'_>) -> bool;
}

pub trait ReliabilityModel: Model {
    fn reaches_destination(&self, packet: &Packet, env: &mut ModelEnv<'_>) -> bool;
}

pub trait MessageTransmissionModel: Model {
    fn time_to_reach(
        &self,
        message: &dyn Message,
        origin: &Node,
        destination: &Node,
        env: &mut ModelEnv<'_>,
    ) -> u64;
}

pub trait DistributionModel: Model {
    /// Reject a deployment area the distribution cannot place nodes in.
    fn check_dimensions(&self, _dimensions: &Dimensions) -> SimResult<()> {
        Ok(())
    }

    /// Position of the `index`-th node out of a batch of `count`.
    fn get_position(&self, index: usize, count: usize, env: &mut ModelEnv<'_>) -> Position;
}

/// Deserialize model parameters, treating `null` as "all defaults".
pub(crate) fn parse_parameters<T>(model: &str, parameters: &Value) -> SimResult<T>
where
    T: DeserializeOwned + Default,
{
    if parameters.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(parameters.clone())
        .map_err(|e| SimError::invalid_parameter(model, "parameters", e.to_string()))
}

pub(crate) fn require(model: &str, parameter: &str, ok: bool, reason: &str) -> SimResult<()> {
    if ok {
        Ok(())
    } else {
        Err(SimError::invalid_parameter(model, parameter, reason))
    }
}
