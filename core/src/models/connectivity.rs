use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_parameters, require, ConnectivityModel, Model, ModelEnv};
use crate::error::SimResult;
use crate::node::Node;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UdgConfig {
    pub radius: f64,
}

impl Default for UdgConfig {
    fn default() -> Self {
        Self { radius: 10.0 }
    }
}

/// Unit disk graph: connected iff the distance is at most `radius`.
#[derive(Debug, Default)]
pub struct Udg {
    pub config: UdgConfig,
}

impl Udg {
    pub fn with_radius(radius: f64) -> SimResult<Self> {
        let config = UdgConfig { radius };
        Self::validate(&config)?;
        Ok(Self { config })
    }

    fn validate(config: &UdgConfig) -> SimResult<()> {
        require(
            "udg",
            "radius",
            config.radius.is_finite() && config.radius > 0.0,
            "must be a positive number",
        )
    }

    fn parse(parameters: &Value) -> SimResult<UdgConfig> {
        let config: UdgConfig = parse_parameters("udg", parameters)?;
        Self::validate(&config)?;
        Ok(config)
    }
}

impl Model for Udg {
    fn name(&self) -> &str {
        "udg"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        Self::parse(parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = Self::parse(parameters)?;
        Ok(())
    }
}

impl ConnectivityModel for Udg {
    fn is_connected(&self, from: &Node, to: &Node, _env: &mut ModelEnv<'_>) -> bool {
        from.position().euclidean_distance(&to.position()) <= self.config.radius
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QudgConfig {
    pub r_min: f64,
    pub r_max: f64,
    /// Chance of a link between `r_min` and `r_max`.
    pub probability: f64,
}

impl Default for QudgConfig {
    fn default() -> Self {
        Self {
            r_min: 5.0,
            r_max: 10.0,
            probability: 0.5,
        }
    }
}

/// Quasi unit disk graph.
#[derive(Debug, Default)]
pub struct Qudg {
    pub config: QudgConfig,
}

impl Qudg {
    fn parse(parameters: &Value) -> SimResult<QudgConfig> {
        let config: QudgConfig = parse_parameters("qudg", parameters)?;
        require(
            "qudg",
            "r_min",
            config.r_min.is_finite() && config.r_min >= 0.0,
            "must be a non-negative number",
        )?;
        require(
            "qudg",
            "r_max",
            config.r_max.is_finite() && config.r_max >= config.r_min,
            "must be at least r_min",
        )?;
        require(
            "qudg",
            "probability",
            (0.0..=1.0).contains(&config.probability),
            "must lie in [0, 1]",
        )?;
        Ok(config)
    }
}

impl Model for Qudg {
    fn name(&self) -> &str {
        "qudg"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        Self::parse(parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = Self::parse(parameters)?;
        Ok(())
    }
}

impl ConnectivityModel for Qudg {
    fn is_connected(&self, from: &Node, to: &Node, env: &mut ModelEnv<'_>) -> bool {
        let distance = from.position().euclidean_distance(&to.position());
        if distance <= self.config.r_min {
            true
        } else if distance > self.config.r_max {
            false
        } else {
            env.rng.gen_bool(self.config.probability)
        }
    }
}

#[derive(Debug, Default)]
pub struct NoConnectivity;

impl Model for NoConnectivity {
    fn name(&self) -> &str {
        "no_connectivity"
    }
}

impl ConnectivityModel for NoConnectivity {
    fn is_connected(&self, _from: &Node, _to: &Node, _env: &mut ModelEnv<'_>) -> bool {
        false
    }
}
