use thiserror::Error;

use crate::node::NodeId;

/// Every fallible engine operation returns this error.
///
/// Configuration variants abort `init`; invariant variants are programming
/// errors in project code and stop the running round; `NodeNotFound` and
/// `EdgeNotFound` are plain lookups that callers may recover from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("project '{project}' has no registered custom global")]
    MissingCustomGlobal { project: String },

    #[error("invalid configuration for project '{project}': {reason}")]
    InvalidConfig { project: String, reason: String },

    #[error("cannot read configuration '{path}': {reason}")]
    ConfigIo { path: String, reason: String },

    #[error("invalid parameter '{parameter}' for model '{model}': {reason}")]
    InvalidParameter {
        model: String,
        parameter: String,
        reason: String,
    },

    #[error("unknown {kind} model '{name}'")]
    UnknownModel { kind: &'static str, name: String },

    #[error("unknown node kind '{0}'")]
    UnknownNodeKind(String),

    #[error("messages can only be sent while the simulation is running")]
    NotRunning,

    #[error("simulation has not been initialized")]
    NotInitialized,

    #[error("timer delay must be positive, got {0}")]
    NonPositiveTimerDelay(i64),

    #[error("cannot start a timer at T={requested}, it must fire after the current time T={current}")]
    TimerInPast { requested: u64, current: u64 },

    #[error("operation requires an owning node but the timer is global")]
    MissingTimerOwner,

    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("edge {from} -> {to} not found")]
    EdgeNotFound { from: NodeId, to: NodeId },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub fn invalid_parameter(model: &str, parameter: &str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            model: model.to_string(),
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    /// Configuration errors are the ones that must prevent a run from starting.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SimError::MissingCustomGlobal { .. }
                | SimError::InvalidConfig { .. }
                | SimError::ConfigIo { .. }
                | SimError::InvalidParameter { .. }
                | SimError::UnknownModel { .. }
                | SimError::UnknownNodeKind(_)
        )
    }
}
