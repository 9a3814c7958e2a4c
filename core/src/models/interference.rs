use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_parameters, require, InterferenceModel, Model, ModelEnv};
use crate::error::SimResult;
use crate::message::Packet;

#[derive(Debug, Default)]
pub struct NoInterference;

impl Model for NoInterference {
    fn name(&self) -> &str {
        "no_interference"
    }
}

impl InterferenceModel for NoInterference {
    fn is_disturbed(&self, _packet: &Packet, _env: &mut ModelEnv<'_>) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomDropConfig {
    /// Per-test chance that a packet is disturbed.
    pub probability: f64,
}

/// Disturbs each tracked packet independently with a fixed probability,
/// once per interference test.
#[derive(Debug, Default)]
pub struct RandomDrop {
    pub config: RandomDropConfig,
}

impl RandomDrop {
    fn parse(parameters: &Value) -> SimResult<RandomDropConfig> {
        let config: RandomDropConfig = parse_parameters("random_drop", parameters)?;
        require(
            "random_drop",
            "probability",
            (0.0..=1.0).contains(&config.probability),
            "must lie in [0, 1]",
        )?;
        Ok(config)
    }
}

impl Model for RandomDrop {
    fn name(&self) -> &str {
        "random_drop"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        Self::parse(parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = Self::parse(parameters)?;
        Ok(())
    }
}

impl InterferenceModel for RandomDrop {
    fn is_disturbed(&self, _packet: &Packet, env: &mut ModelEnv<'_>) -> bool {
        env.rng.gen_bool(self.config.probability)
    }
}
