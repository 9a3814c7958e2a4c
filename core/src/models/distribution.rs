use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_parameters, require, DistributionModel, Model, ModelEnv};
use crate::error::SimResult;
use crate::position::{Dimensions, Position};

/// Uniformly random inside the deployment area.
#[derive(Debug, Default)]
pub struct RandomDistribution;

impl Model for RandomDistribution {
    fn name(&self) -> &str {
        "random"
    }
}

impl DistributionModel for RandomDistribution {
    fn get_position(&self, _index: usize, _count: usize, env: &mut ModelEnv<'_>) -> Position {
        env.dimensions.random_point(&mut *env.rng)
    }
}

/// Evenly spaced along the x axis at mid-height.
#[derive(Debug, Default)]
pub struct LineDistribution;

impl Model for LineDistribution {
    fn name(&self) -> &str {
        "line"
    }
}

impl DistributionModel for LineDistribution {
    fn get_position(&self, index: usize, count: usize, env: &mut ModelEnv<'_>) -> Position {
        let dims = env.dimensions;
        let center = dims.center();
        let width = dims.x[1] - dims.x[0];
        let step = width / (count as f64 + 1.0);
        Position::new(dims.x[0] + step * (index as f64 + 1.0), center.y, center.z)
    }
}

/// Row-major square grid filling the x/y area.
#[derive(Debug, Default)]
pub struct GridDistribution;

impl Model for GridDistribution {
    fn name(&self) -> &str {
        "grid"
    }
}

impl DistributionModel for GridDistribution {
    fn get_position(&self, index: usize, count: usize, env: &mut ModelEnv<'_>) -> Position {
        let dims = env.dimensions;
        let side = (count as f64).sqrt().ceil().max(1.0) as usize;
        let (row, col) = (index / side, index % side);
        let dx = (dims.x[1] - dims.x[0]) / (side as f64 + 1.0);
        let dy = (dims.y[1] - dims.y[0]) / (side as f64 + 1.0);
        Position::new(
            dims.x[0] + dx * (col as f64 + 1.0),
            dims.y[0] + dy * (row as f64 + 1.0),
            dims.center().z,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rotation {
    #[default]
    AntiClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircularConfig {
    pub radius: f64,
    /// Center of the circle on the x/y plane; the middle of the area if unset.
    pub midpoint: Option<[f64; 2]>,
    pub rotation_direction: Rotation,
}

impl Default for CircularConfig {
    fn default() -> Self {
        Self {
            radius: 25.0,
            midpoint: None,
            rotation_direction: Rotation::AntiClockwise,
        }
    }
}

/// Evenly spaced on a circle, starting on the positive x side of the
/// midpoint.
#[derive(Debug, Default)]
pub struct CircularDistribution {
    pub config: CircularConfig,
}

impl CircularDistribution {
    fn parse(parameters: &Value) -> SimResult<CircularConfig> {
        let config: CircularConfig = parse_parameters("circular", parameters)?;
        require(
            "circular",
            "radius",
            config.radius.is_finite() && config.radius >= 0.0,
            "must be a non-negative number",
        )?;
        if let Some([x, y]) = config.midpoint {
            require(
                "circular",
                "midpoint",
                x.is_finite() && y.is_finite(),
                "must be finite coordinates",
            )?;
        }
        Ok(config)
    }

    fn midpoint(&self, dimensions: &Dimensions) -> [f64; 2] {
        self.config.midpoint.unwrap_or_else(|| {
            let center = dimensions.center();
            [center.x, center.y]
        })
    }
}

impl Model for CircularDistribution {
    fn name(&self) -> &str {
        "circular"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        Self::parse(parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = Self::parse(parameters)?;
        Ok(())
    }
}

impl DistributionModel for CircularDistribution {
    fn check_dimensions(&self, dimensions: &Dimensions) -> SimResult<()> {
        let [x, y] = self.midpoint(dimensions);
        let r = self.config.radius;
        require(
            "circular",
            "radius",
            x - r >= dimensions.x[0]
                && x + r <= dimensions.x[1]
                && y - r >= dimensions.y[0]
                && y + r <= dimensions.y[1],
            "circle does not fit in the deployment area",
        )
    }

    fn get_position(&self, index: usize, count: usize, env: &mut ModelEnv<'_>) -> Position {
        let [x, y] = self.midpoint(env.dimensions);
        let angle = 2.0 * PI * index as f64 / count.max(1) as f64;
        let sin = match self.config.rotation_direction {
            Rotation::AntiClockwise => angle.sin(),
            Rotation::Clockwise => -angle.sin(),
        };
        Position::new(
            x + self.config.radius * angle.cos(),
            y + self.config.radius * sin,
            env.dimensions.center().z,
        )
    }
}
