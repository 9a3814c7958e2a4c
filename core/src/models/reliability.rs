use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_parameters, require, Model, ModelEnv, ReliabilityModel};
use crate::error::SimResult;
use crate::message::Packet;

#[derive(Debug, Default)]
pub struct ReliableDelivery;

impl Model for ReliableDelivery {
    fn name(&self) -> &str {
        "reliable_delivery"
    }
}

impl ReliabilityModel for ReliableDelivery {
    fn reaches_destination(&self, _packet: &Packet, _env: &mut ModelEnv<'_>) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LossyDeliveryConfig {
    pub drop_rate: f64,
}

#[derive(Debug, Default)]
pub struct LossyDelivery {
    pub config: LossyDeliveryConfig,
}

impl LossyDelivery {
    fn parse(parameters: &Value) -> SimResult<LossyDeliveryConfig> {
        let config: LossyDeliveryConfig = parse_parameters("lossy_delivery", parameters)?;
        require(
            "lossy_delivery",
            "drop_rate",
            (0.0..=1.0).contains(&config.drop_rate),
            "must lie in [0, 1]",
        )?;
        Ok(config)
    }
}

impl Model for LossyDelivery {
    fn name(&self) -> &str {
        "lossy_delivery"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        Self::parse(parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = Self::parse(parameters)?;
        Ok(())
    }
}

impl ReliabilityModel for LossyDelivery {
    fn reaches_destination(&self, _packet: &Packet, env: &mut ModelEnv<'_>) -> bool {
        !env.rng.gen_bool(self.config.drop_rate)
    }
}
