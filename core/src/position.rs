use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A point in the simulated area. `Copy`, so assigning it to another node never aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn euclidean_distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn coordinates(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// Closed `[min, max]` interval per axis describing the deployment area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub x: [f64; 2],
    pub y: [f64; 2],
    #[serde(default)]
    pub z: [f64; 2],
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            x: [0.0, 100.0],
            y: [0.0, 100.0],
            z: [0.0, 0.0],
        }
    }
}

impl Dimensions {
    pub fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|[lo, hi]| lo.is_finite() && hi.is_finite() && lo <= hi)
    }

    pub fn clamp(&self, p: Position) -> Position {
        Position {
            x: p.x.clamp(self.x[0], self.x[1]),
            y: p.y.clamp(self.y[0], self.y[1]),
            z: p.z.clamp(self.z[0], self.z[1]),
        }
    }

    pub fn contains(&self, p: &Position) -> bool {
        p.x >= self.x[0]
            && p.x <= self.x[1]
            && p.y >= self.y[0]
            && p.y <= self.y[1]
            && p.z >= self.z[0]
            && p.z <= self.z[1]
    }

    pub fn center(&self) -> Position {
        Position {
            x: (self.x[0] + self.x[1]) / 2.0,
            y: (self.y[0] + self.y[1]) / 2.0,
            z: (self.z[0] + self.z[1]) / 2.0,
        }
    }

    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        Position {
            x: sample_axis(rng, self.x),
            y: sample_axis(rng, self.y),
            z: sample_axis(rng, self.z),
        }
    }
}

fn sample_axis<R: Rng + ?Sized>(rng: &mut R, [lo, hi]: [f64; 2]) -> f64 {
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}
