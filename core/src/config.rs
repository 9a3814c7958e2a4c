use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SimError, SimResult};
use crate::position::Dimensions;

/// A model selected by registry name plus its raw parameters.
///
/// `name` is either a bare model name or `"project:model"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
    #[serde(default)]
    pub parameters: Value,
}

impl ModelRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Value::Null,
        }
    }

    pub fn with_parameters(name: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            parameters,
        }
    }
}

/// The models and node kind used for one batch of bulk-constructed nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub count: usize,
    pub node_kind: String,
    #[serde(default = "NodeGroup::default_mobility")]
    pub mobility: ModelRef,
    #[serde(default = "NodeGroup::default_connectivity")]
    pub connectivity: ModelRef,
    #[serde(default = "NodeGroup::default_interference")]
    pub interference: ModelRef,
    #[serde(default = "NodeGroup::default_reliability")]
    pub reliability: ModelRef,
    #[serde(default = "NodeGroup::default_distribution")]
    pub distribution: ModelRef,
}

impl NodeGroup {
    pub fn new(count: usize, node_kind: &str) -> Self {
        Self {
            count,
            node_kind: node_kind.to_string(),
            mobility: Self::default_mobility(),
            connectivity: Self::default_connectivity(),
            interference: Self::default_interference(),
            reliability: Self::default_reliability(),
            distribution: Self::default_distribution(),
        }
    }

    pub fn with_mobility(mut self, model: ModelRef) -> Self {
        self.mobility = model;
        self
    }

    pub fn with_connectivity(mut self, model: ModelRef) -> Self {
        self.connectivity = model;
        self
    }

    pub fn with_interference(mut self, model: ModelRef) -> Self {
        self.interference = model;
        self
    }

    pub fn with_reliability(mut self, model: ModelRef) -> Self {
        self.reliability = model;
        self
    }

    pub fn with_distribution(mut self, model: ModelRef) -> Self {
        self.distribution = model;
        self
    }

    fn default_mobility() -> ModelRef {
        ModelRef::new("no_mobility")
    }
    fn default_connectivity() -> ModelRef {
        ModelRef::with_parameters("udg", serde_json::json!({ "radius": 10.0 }))
    }
    fn default_interference() -> ModelRef {
        ModelRef::new("no_interference")
    }
    fn default_reliability() -> ModelRef {
        ModelRef::new("reliable_delivery")
    }
    fn default_distribution() -> ModelRef {
        ModelRef::new("random")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub simulation_name: String,
    pub rounds: u64,
    /// Rounds (or events) per wall-clock second; 0 runs back-to-back.
    pub refresh_rate: f64,
    pub seed: u64,
    pub asynchronous: bool,
    pub connectivity_enabled: bool,
    pub interference_enabled: bool,
    pub nack_messages_enabled: bool,
    pub save_trace: bool,
    pub dimensions: Dimensions,
    pub message_transmission_model: ModelRef,
    pub nodes: Vec<NodeGroup>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            simulation_name: "Network Simulation".to_string(),
            rounds: 1000,
            refresh_rate: 0.0,
            seed: 0,
            asynchronous: false,
            connectivity_enabled: true,
            interference_enabled: true,
            nack_messages_enabled: true,
            save_trace: false,
            dimensions: Dimensions::default(),
            message_transmission_model: ModelRef::with_parameters(
                "constant_time",
                serde_json::json!({ "time": 1 }),
            ),
            nodes: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Load from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SimError::ConfigIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let parsed = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| e.to_string()),
            _ => toml::from_str(&content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| SimError::ConfigIo {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn from_toml_str(content: &str) -> SimResult<Self> {
        toml::from_str(content).map_err(|e| SimError::ConfigIo {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// `<projects_dir>/<project>/config.toml`
    pub fn project_file(projects_dir: &Path, project: &str) -> PathBuf {
        projects_dir.join(project).join("config.toml")
    }

    pub fn validate(&self, project: &str) -> SimResult<()> {
        let fail = |reason: &str| SimError::InvalidConfig {
            project: project.to_string(),
            reason: reason.to_string(),
        };
        if self.rounds == 0 {
            return Err(fail("rounds must be positive"));
        }
        if !self.refresh_rate.is_finite() || self.refresh_rate < 0.0 {
            return Err(fail("refresh_rate must be a non-negative number"));
        }
        if !self.dimensions.is_well_formed() {
            return Err(fail("every dimension range must satisfy min <= max"));
        }
        if let Some(group) = self.nodes.iter().find(|g| g.node_kind.is_empty()) {
            return Err(fail(&format!(
                "node group of {} nodes has an empty node_kind",
                group.count
            )));
        }
        Ok(())
    }
}
