use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::message::{Packet, PacketHandle};
use crate::models::connectivity::Udg;
use crate::models::interference::NoInterference;
use crate::models::mobility::NoMobility;
use crate::models::reliability::ReliableDelivery;
use crate::models::{ConnectivityModel, InterferenceModel, MobilityModel, ReliabilityModel};
use crate::position::Position;
use crate::timer::PendingTimer;
use crate::traits::NodeBehavior;

pub type NodeId = u32;

/// Display color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(220, 50, 47);
    pub const GREEN: Color = Color::rgb(60, 180, 75);
    pub const BLUE: Color = Color::rgb(38, 139, 210);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("'{value}' is not a #rrggbb color"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// The four per-node models. Shared by every node of a batch.
#[derive(Clone)]
pub struct NodeModels {
    pub mobility: Arc<dyn MobilityModel>,
    pub connectivity: Arc<dyn ConnectivityModel>,
    pub interference: Arc<dyn InterferenceModel>,
    pub reliability: Arc<dyn ReliabilityModel>,
}

impl NodeModels {
    /// Stationary node with a unit-disk radio of the given radius, no
    /// interference and reliable delivery.
    pub fn stationary(radius: f64) -> SimResult<Self> {
        Ok(Self {
            mobility: Arc::new(NoMobility),
            connectivity: Arc::new(Udg::with_radius(radius)?),
            interference: Arc::new(NoInterference),
            reliability: Arc::new(ReliableDelivery),
        })
    }

    pub fn with_mobility(mut self, model: Arc<dyn MobilityModel>) -> Self {
        self.mobility = model;
        self
    }

    pub fn with_connectivity(mut self, model: Arc<dyn ConnectivityModel>) -> Self {
        self.connectivity = model;
        self
    }

    pub fn with_interference(mut self, model: Arc<dyn InterferenceModel>) -> Self {
        self.interference = model;
        self
    }

    pub fn with_reliability(mut self, model: Arc<dyn ReliabilityModel>) -> Self {
        self.reliability = model;
        self
    }
}

impl fmt::Debug for NodeModels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeModels")
            .field("mobility", &self.mobility.name())
            .field("connectivity", &self.connectivity.name())
            .field("interference", &self.interference.name())
            .field("reliability", &self.reliability.name())
            .finish()
    }
}

pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: String,
    pub(crate) position: Position,
    pub(crate) models: NodeModels,
    /// Taken out while one of its hooks runs.
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
    pub(crate) neighborhood_changed: bool,
    pub(crate) timers: Vec<PendingTimer>,
    /// Synchronous mode: packets addressed to this node, still in flight.
    pub(crate) inbound: Vec<PacketHandle>,
    pub(crate) nack_even: Vec<Packet>,
    pub(crate) nack_odd: Vec<Packet>,
    pub(crate) intensity: f64,
    pub(crate) size: f64,
    pub(crate) color: Color,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        behavior: Box<dyn NodeBehavior>,
        models: NodeModels,
        position: Position,
    ) -> Self {
        Self {
            id,
            kind: behavior.kind().to_string(),
            position,
            models,
            behavior: Some(behavior),
            neighborhood_changed: false,
            timers: Vec::new(),
            inbound: Vec::new(),
            nack_even: Vec::new(),
            nack_odd: Vec::new(),
            intensity: 1.0,
            size: 1.0,
            color: Color::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn models(&self) -> &NodeModels {
        &self.models
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Clamped to `[0, 1]`.
    pub fn set_intensity(&mut self, intensity: f64) {
        self.intensity = if intensity.is_nan() {
            0.0
        } else {
            intensity.clamp(0.0, 1.0)
        };
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn set_size(&mut self, size: f64) {
        self.size = size.max(0.0);
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn pending_nacks(&self) -> usize {
        self.nack_even.len() + self.nack_odd.len()
    }

    /// `None` while one of the node's own hooks is executing.
    pub fn behavior(&self) -> Option<&dyn NodeBehavior> {
        self.behavior.as_deref()
    }

    pub fn behavior_as<T: NodeBehavior + 'static>(&self) -> Option<&T> {
        self.behavior.as_deref()?.as_any().downcast_ref::<T>()
    }

    pub fn behavior_as_mut<T: NodeBehavior + 'static>(&mut self) -> Option<&mut T> {
        self.behavior.as_deref_mut()?.as_any_mut().downcast_mut::<T>()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("models", &self.models)
            .field("timers", &self.timers.len())
            .field("inbound", &self.inbound.len())
            .finish()
    }
}
