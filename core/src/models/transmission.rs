use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_parameters, require, MessageTransmissionModel, Model, ModelEnv};
use crate::error::SimResult;
use crate::message::Message;
use crate::node::Node;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstantTimeConfig {
    pub time: u64,
}

impl Default for ConstantTimeConfig {
    fn default() -> Self {
        Self { time: 1 }
    }
}

/// Every message takes exactly `time` ticks.
#[derive(Debug, Default)]
pub struct ConstantTime {
    pub config: ConstantTimeConfig,
}

impl ConstantTime {
    pub fn new(time: u64) -> Self {
        Self {
            config: ConstantTimeConfig { time },
        }
    }
}

impl Model for ConstantTime {
    fn name(&self) -> &str {
        "constant_time"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        parse_parameters::<ConstantTimeConfig>("constant_time", parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = parse_parameters("constant_time", parameters)?;
        Ok(())
    }
}

impl MessageTransmissionModel for ConstantTime {
    fn time_to_reach(
        &self,
        _message: &dyn Message,
        _origin: &Node,
        _destination: &Node,
        _env: &mut ModelEnv<'_>,
    ) -> u64 {
        self.config.time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomTimeConfig {
    pub min: u64,
    pub max: u64,
}

impl Default for RandomTimeConfig {
    fn default() -> Self {
        Self { min: 1, max: 5 }
    }
}

/// Uniform transit time in `[min, max]`.
#[derive(Debug, Default)]
pub struct RandomTime {
    pub config: RandomTimeConfig,
}

impl RandomTime {
    fn parse(parameters: &Value) -> SimResult<RandomTimeConfig> {
        let config: RandomTimeConfig = parse_parameters("random_time", parameters)?;
        require(
            "random_time",
            "max",
            config.max >= config.min,
            "must be at least min",
        )?;
        Ok(config)
    }
}

impl Model for RandomTime {
    fn name(&self) -> &str {
        "random_time"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        Self::parse(parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = Self::parse(parameters)?;
        Ok(())
    }
}

impl MessageTransmissionModel for RandomTime {
    fn time_to_reach(
        &self,
        _message: &dyn Message,
        _origin: &Node,
        _destination: &Node,
        env: &mut ModelEnv<'_>,
    ) -> u64 {
        env.rng.gen_range(self.config.min..=self.config.max)
    }
}
