//! Capability definition — a named, schema-described unit of executable
//! behaviour available to a planner.
//!
//! Capabilities are immutable once registered. Their execution backend is a
//! [`CapabilityHandler`] kept next to them in the
//! [`CapabilityRegistry`](super::registry::CapabilityRegistry).
//!
//! Example YAML:
//! ```yaml
//! name: "CountEvenDigits"
//! description: "Counts the even digits of a decimal expansion"
//! input_schema:
//!   - name: "digits"
//!     type: "string"
//!     description: "The digits to inspect"
//! output_schema:
//!   type: "number"
//!   description: "How many digits are even"
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utilities::errors::BoxError;

/// A capability the planner may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Unique name within a registry.
    pub name: String,

    /// What the capability does.
    pub description: String,

    /// Named input parameters, ordered by name.
    #[serde(default)]
    pub input_schema: Vec<ParameterSchema>,

    /// Shape of the result, if declared.
    #[serde(default)]
    pub output_schema: Option<OutputSchema>,
}

impl Capability {
    /// Create a capability with no declared inputs or output.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Vec::new(),
            output_schema: None,
        }
    }

    /// Add an input parameter.
    pub fn with_input(mut self, parameter: ParameterSchema) -> Self {
        self.input_schema.push(parameter);
        self.input_schema.sort_by(|a, b| a.name.cmp(&b.name));
        self
    }

    /// Declare the output shape.
    pub fn with_output(mut self, output: OutputSchema) -> Self {
        self.output_schema = Some(output);
        self
    }

    /// Parse a capability from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// A single named input parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,
    /// JSON type name ("string", "number", "object", ...).
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

impl ParameterSchema {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            description: description.into(),
        }
    }
}

/// The declared result of a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

impl OutputSchema {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
        }
    }
}

fn default_kind() -> String {
    "string".to_string()
}

/// Execution backend of a capability.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Execute the capability with JSON input.
    async fn invoke(&self, input: Value) -> Result<Value, BoxError>;
}
