use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::{Mutex, MutexGuard};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_parameters, require, MobilityModel, Model, ModelEnv};
use crate::error::SimResult;
use crate::node::{Node, NodeId};
use crate::position::Position;

#[derive(Debug, Default)]
pub struct NoMobility;

impl Model for NoMobility {
    fn name(&self) -> &str {
        "no_mobility"
    }
}

impl MobilityModel for NoMobility {
    fn get_next_position(&self, node: &Node, _env: &mut ModelEnv<'_>) -> Position {
        node.position()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomWalkConfig {
    /// Distance travelled per round.
    pub speed: f64,
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

/// Each round the node steps `speed` units in a uniformly random direction
/// on the x/y plane and is clamped to the deployment area.
#[derive(Debug, Default)]
pub struct RandomWalk {
    pub config: RandomWalkConfig,
}

impl RandomWalk {
    fn parse(parameters: &Value) -> SimResult<RandomWalkConfig> {
        let config: RandomWalkConfig = parse_parameters("random_walk", parameters)?;
        require(
            "random_walk",
            "speed",
            config.speed.is_finite() && config.speed >= 0.0,
            "must be a non-negative number",
        )?;
        Ok(config)
    }
}

impl Model for RandomWalk {
    fn name(&self) -> &str {
        "random_walk"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        Self::parse(parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = Self::parse(parameters)?;
        Ok(())
    }
}

impl MobilityModel for RandomWalk {
    fn get_next_position(&self, node: &Node, env: &mut ModelEnv<'_>) -> Position {
        let current = node.position();
        let angle = env.rng.gen_range(0.0..2.0 * PI);
        let next = Position {
            x: current.x + self.config.speed * angle.cos(),
            y: current.y + self.config.speed * angle.sin(),
            z: current.z,
        };
        env.dimensions.clamp(next)
    }
}

/// Uniform draw from a closed `[min, max]` range.
fn sample(rng: &mut impl Rng, [min, max]: [f64; 2]) -> f64 {
    if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    }
}

fn check_range(model: &str, parameter: &str, [min, max]: [f64; 2]) -> SimResult<()> {
    require(
        model,
        parameter,
        min.is_finite() && max.is_finite() && min >= 0.0 && min <= max,
        "must be a non-negative [min, max] range",
    )
}

/// Per-node movement state. Model instances are shared by a whole batch.
type Tracks<T> = Mutex<BTreeMap<NodeId, T>>;

fn tracks<T>(tracks: &Tracks<T>) -> MutexGuard<'_, BTreeMap<NodeId, T>> {
    tracks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomWaypointConfig {
    /// Distance per round, drawn anew for every leg.
    pub speed_range: [f64; 2],
    /// Rounds spent at a waypoint before heading to the next one.
    pub waiting_time_range: [f64; 2],
}

impl Default for RandomWaypointConfig {
    fn default() -> Self {
        Self {
            speed_range: [1.0, 5.0],
            waiting_time_range: [0.0, 5.0],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Leg {
    destination: Position,
    step: Position,
    remaining_moves: u64,
    remaining_wait: u64,
}

/// Travels in a straight line to a random point of the area, waits there and
/// picks the next point.
#[derive(Debug, Default)]
pub struct RandomWaypoint {
    pub config: RandomWaypointConfig,
    legs: Tracks<Leg>,
}

impl RandomWaypoint {
    fn parse(parameters: &Value) -> SimResult<RandomWaypointConfig> {
        let config: RandomWaypointConfig = parse_parameters("random_waypoint", parameters)?;
        check_range("random_waypoint", "speed_range", config.speed_range)?;
        require(
            "random_waypoint",
            "speed_range",
            config.speed_range[0] > 0.0,
            "minimum speed must be positive",
        )?;
        check_range("random_waypoint", "waiting_time_range", config.waiting_time_range)?;
        Ok(config)
    }
}

impl Model for RandomWaypoint {
    fn name(&self) -> &str {
        "random_waypoint"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        Self::parse(parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = Self::parse(parameters)?;
        Ok(())
    }
}

impl MobilityModel for RandomWaypoint {
    fn get_next_position(&self, node: &Node, env: &mut ModelEnv<'_>) -> Position {
        let current = node.position();
        let mut legs = tracks(&self.legs);
        let leg = legs.entry(node.id()).or_default();

        if leg.remaining_wait > 0 {
            leg.remaining_wait -= 1;
            return current;
        }
        if leg.remaining_moves == 0 {
            let speed = sample(&mut *env.rng, self.config.speed_range);
            let destination = env.dimensions.random_point(&mut *env.rng);
            let rounds = current.euclidean_distance(&destination) / speed;
            leg.destination = destination;
            leg.remaining_moves = rounds.ceil() as u64;
            if rounds > 0.0 {
                leg.step = Position::new(
                    (destination.x - current.x) / rounds,
                    (destination.y - current.y) / rounds,
                    (destination.z - current.z) / rounds,
                );
            }
        }
        if leg.remaining_moves <= 1 {
            leg.remaining_moves = 0;
            leg.remaining_wait = sample(&mut *env.rng, self.config.waiting_time_range).ceil() as u64;
            return leg.destination;
        }
        leg.remaining_moves -= 1;
        Position::new(
            current.x + leg.step.x,
            current.y + leg.step.y,
            current.z + leg.step.z,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomDirectionConfig {
    pub speed_range: [f64; 2],
    pub waiting_time_range: [f64; 2],
    /// Rounds spent moving in one direction.
    pub move_time_range: [f64; 2],
}

impl Default for RandomDirectionConfig {
    fn default() -> Self {
        Self {
            speed_range: [1.0, 5.0],
            waiting_time_range: [0.0, 5.0],
            move_time_range: [5.0, 20.0],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Heading {
    step: Position,
    remaining_moves: u64,
    remaining_wait: u64,
}

/// Moves in a random direction for a random time, bouncing off the borders
/// of the area, then pauses.
///
/// A node's first call starts it at a random point of a wait/move cycle, so
/// a freshly deployed batch does not move in lockstep.
#[derive(Debug, Default)]
pub struct RandomDirection {
    pub config: RandomDirectionConfig,
    headings: Tracks<Heading>,
}

impl RandomDirection {
    fn parse(parameters: &Value) -> SimResult<RandomDirectionConfig> {
        let config: RandomDirectionConfig = parse_parameters("random_direction", parameters)?;
        check_range("random_direction", "speed_range", config.speed_range)?;
        check_range("random_direction", "waiting_time_range", config.waiting_time_range)?;
        check_range("random_direction", "move_time_range", config.move_time_range)?;
        Ok(config)
    }

    fn start_move(&self, heading: &mut Heading, move_time: f64, env: &mut ModelEnv<'_>) {
        let speed = sample(&mut *env.rng, self.config.speed_range);
        let angle_xy = env.rng.gen_range(0.0..2.0 * PI);
        let angle_z = if env.dimensions.z[1] > env.dimensions.z[0] {
            PI * (0.5 - env.rng.gen::<f64>())
        } else {
            0.0
        };
        heading.step = Position::new(
            speed * angle_xy.cos() * angle_z.cos(),
            speed * angle_xy.sin() * angle_z.cos(),
            speed * angle_z.sin(),
        );
        heading.remaining_moves = move_time.ceil() as u64;
    }

    fn first_heading(&self, env: &mut ModelEnv<'_>) -> Heading {
        let wait = sample(&mut *env.rng, self.config.waiting_time_range);
        let moving = sample(&mut *env.rng, self.config.move_time_range);
        let offset = env.rng.gen::<f64>() * (wait + moving);
        let mut heading = Heading::default();
        if offset < wait {
            heading.remaining_wait = (wait - offset).ceil() as u64;
        } else {
            self.start_move(&mut heading, wait + moving - offset, env);
        }
        heading
    }
}

/// Mirror `value` back into `[lo, hi]`. Returns whether the direction of
/// travel along this axis flipped.
fn reflect(mut value: f64, [lo, hi]: [f64; 2]) -> (f64, bool) {
    if hi <= lo || !value.is_finite() {
        return (value.clamp(lo, hi.max(lo)), false);
    }
    let mut flipped = false;
    loop {
        if value < lo {
            value = 2.0 * lo - value;
        } else if value > hi {
            value = 2.0 * hi - value;
        } else {
            return (value, flipped);
        }
        flipped = !flipped;
    }
}

impl Model for RandomDirection {
    fn name(&self) -> &str {
        "random_direction"
    }

    fn check_parameters(&self, parameters: &Value) -> SimResult<()> {
        Self::parse(parameters).map(|_| ())
    }

    fn set_parameters(&mut self, parameters: &Value) -> SimResult<()> {
        self.config = Self::parse(parameters)?;
        Ok(())
    }
}

impl MobilityModel for RandomDirection {
    fn get_next_position(&self, node: &Node, env: &mut ModelEnv<'_>) -> Position {
        let current = node.position();
        let mut headings = tracks(&self.headings);
        let heading = match headings.entry(node.id()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.first_heading(env)),
        };

        if heading.remaining_wait > 0 {
            heading.remaining_wait -= 1;
            return current;
        }
        if heading.remaining_moves == 0 {
            let move_time = sample(&mut *env.rng, self.config.move_time_range);
            self.start_move(heading, move_time, env);
        }

        let dims = env.dimensions;
        let (x, flip_x) = reflect(current.x + heading.step.x, dims.x);
        let (y, flip_y) = reflect(current.y + heading.step.y, dims.y);
        let (z, flip_z) = reflect(current.z + heading.step.z, dims.z);
        if flip_x {
            heading.step.x = -heading.step.x;
        }
        if flip_y {
            heading.step.y = -heading.step.y;
        }
        if flip_z {
            heading.step.z = -heading.step.z;
        }

        if heading.remaining_moves <= 1 {
            heading.remaining_moves = 0;
            heading.remaining_wait =
                sample(&mut *env.rng, self.config.waiting_time_range).ceil() as u64;
        } else {
            heading.remaining_moves -= 1;
        }
        Position::new(x, y, z)
    }
}
