pub mod analytics;
pub mod builtin;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod global;
pub mod in_air;
pub mod inbox;
pub mod message;
pub mod models;
pub mod node;
pub mod position;
pub mod projects;
pub mod runtime;
pub mod scheduler;
pub mod snapshot;
mod timer;
pub mod topology;
pub mod traits;

pub use analytics::{MessageStats, RunSummary};
pub use builtin::{InertNode, MessageTimer, NoContent};
pub use config::{ModelRef, NodeGroup, SimConfig};
pub use context::Context;
pub use engine::Simulation;
pub use error::{SimError, SimResult};
pub use global::{DefaultCustomGlobal, GlobalState};
pub use inbox::{Inbox, NackBox};
pub use message::{Message, Packet, PacketHandle, PacketKind};
pub use models::{ModelEnv, ModelRegistry, BUILTIN_NAMESPACE};
pub use node::{Color, Node, NodeId, NodeModels};
pub use position::{Dimensions, Position};
pub use runtime::Runtime;
pub use scheduler::StepOutcome;
pub use snapshot::{EdgeView, NodeView, Snapshot};
pub use topology::{ConnectivityUpdate, Edge, TopologyGraph};
pub use traits::{AsAny, CustomGlobal, NodeBehavior, Timer};
