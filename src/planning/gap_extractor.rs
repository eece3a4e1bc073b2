//! Extracting missing-capability requests from planner diagnostics.
//!
//! A planner that cannot satisfy a goal describes the helpers it would need
//! as a JSON array embedded in its diagnostic:
//!
//! ```text
//! Unable to create plan for goal with available functions.
//! Additional helpers may be required:
//! [
//!   {
//!     "Name": "CountEvenDigits",
//!     "Description": "Counts even digits in a string of digits",
//!     "Inputs": [{"Properties": {"digits": {"type": "string", "description": "..."}}}],
//!     "Outputs": {"type": "number", "description": "..."}
//!   }
//! ]
//! ```
//!
//! Extraction is pure: it never fails, and absence of a well-formed payload
//! is reported as `None`, which callers treat as a non-recoverable
//! diagnostic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::{Capability, OutputSchema, ParameterSchema};
use crate::utilities::json_blocks::find_object_arrays;

/// Markers identifying a planner that invented capabilities of its own.
const HALLUCINATION_MARKERS: &[&str] = &["hallucinatedhelpers", "hallucinat"];

/// A capability the planner needed but did not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityGapRequest {
    pub name: String,
    pub description: String,
    pub input_schema: Vec<ParameterSchema>,
    pub output_schema: Option<OutputSchema>,
}

impl CapabilityGapRequest {
    /// The capability this gap asks for.
    pub fn to_capability(&self) -> Capability {
        Capability {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
        }
    }
}

/// What a failure diagnostic says about recoverability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticClass {
    /// One or more well-formed gap requests: synthesize and retry.
    Gaps(Vec<CapabilityGapRequest>),
    /// The planner referenced capabilities that were never registered.
    Hallucinated,
    /// No usable gap payload.
    Malformed,
}

/// Parses planner diagnostics into gap requests.
#[derive(Debug, Clone, Default)]
pub struct GapExtractor;

impl GapExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the gap list, or `None` when the diagnostic carries no single
    /// well-formed payload.
    pub fn extract(&self, diagnostic: &str) -> Option<Vec<CapabilityGapRequest>> {
        extract_gaps(diagnostic)
    }

    /// Classify a failure diagnostic.
    pub fn classify(&self, diagnostic: &str) -> DiagnosticClass {
        if let Some(gaps) = self.extract(diagnostic) {
            return DiagnosticClass::Gaps(gaps);
        }
        let lowered = diagnostic.to_lowercase();
        if HALLUCINATION_MARKERS.iter().any(|m| lowered.contains(m)) {
            DiagnosticClass::Hallucinated
        } else {
            DiagnosticClass::Malformed
        }
    }
}

/// See [`GapExtractor::extract`].
pub fn extract_gaps(diagnostic: &str) -> Option<Vec<CapabilityGapRequest>> {
    let blocks = find_object_arrays(diagnostic);
    if blocks.len() != 1 {
        if blocks.len() > 1 {
            log::debug!("Diagnostic carries {} candidate payloads; ambiguous", blocks.len());
        }
        return None;
    }

    let raw: Vec<RawGap> = match serde_json::from_value(blocks[0].value.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            log::debug!("Gap payload does not match the expected shape: {}", e);
            return None;
        }
    };

    raw.into_iter().map(RawGap::into_request).collect()
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawGap {
    #[serde(alias = "Name")]
    name: Option<String>,
    #[serde(alias = "Description", default)]
    description: Option<String>,
    #[serde(
        alias = "Inputs",
        alias = "input_schema",
        alias = "inputSchema",
        default
    )]
    inputs: Option<RawInputs>,
    #[serde(
        alias = "Outputs",
        alias = "output",
        alias = "output_schema",
        alias = "outputSchema",
        default
    )]
    outputs: Option<RawProperty>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInputs {
    /// `[{"Properties": {"x": {...}}}]`
    PropertyBags(Vec<RawPropertyBag>),
    /// `[{"name": "x", "type": "...", "description": "..."}]`
    Parameters(Vec<RawParameter>),
    /// `{"x": {...}}`
    Map(BTreeMap<String, RawProperty>),
}

#[derive(Debug, Deserialize)]
struct RawPropertyBag {
    #[serde(alias = "Properties")]
    properties: BTreeMap<String, RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawParameter {
    #[serde(alias = "Name")]
    name: String,
    #[serde(rename = "type", alias = "Type", default)]
    kind: Option<String>,
    #[serde(alias = "Description", default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    #[serde(rename = "type", alias = "Type", default)]
    kind: Option<Value>,
    #[serde(alias = "Description", default)]
    description: Option<String>,
}

impl RawGap {
    fn into_request(self) -> Option<CapabilityGapRequest> {
        let name = self.name?.trim().to_string();
        if name.is_empty() {
            return None;
        }

        let mut params: BTreeMap<String, ParameterSchema> = BTreeMap::new();
        match self.inputs {
            None => {}
            Some(RawInputs::PropertyBags(bags)) => {
                for bag in bags {
                    for (pname, prop) in bag.properties {
                        params.insert(pname.clone(), prop.into_parameter(pname));
                    }
                }
            }
            Some(RawInputs::Parameters(list)) => {
                for p in list {
                    if p.name.trim().is_empty() {
                        return None;
                    }
                    let param = ParameterSchema::new(
                        p.name.trim(),
                        p.kind.unwrap_or_else(|| "string".to_string()),
                        p.description.unwrap_or_default(),
                    );
                    params.insert(param.name.clone(), param);
                }
            }
            Some(RawInputs::Map(map)) => {
                for (pname, prop) in map {
                    params.insert(pname.clone(), prop.into_parameter(pname));
                }
            }
        }

        Some(CapabilityGapRequest {
            name,
            description: self.description.unwrap_or_default().trim().to_string(),
            input_schema: params.into_values().collect(),
            output_schema: self.outputs.map(RawProperty::into_output),
        })
    }
}

impl RawProperty {
    fn kind_name(&self) -> String {
        match &self.kind {
            Some(Value::String(s)) => s.clone(),
            // JSON-schema style unions: ["string", "null"]
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("|"),
            _ => "string".to_string(),
        }
    }

    fn into_parameter(self, name: String) -> ParameterSchema {
        let kind = self.kind_name();
        ParameterSchema::new(name, kind, self.description.unwrap_or_default())
    }

    fn into_output(self) -> OutputSchema {
        let kind = self.kind_name();
        OutputSchema::new(kind, self.description.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_DIAGNOSTIC: &str = r#"Unable to create plan for goal with available functions.
Goal: Tell me in the 1000 first decimals of Pi, what is the ratio of even vs odd numbers?
Available Functions:
Planner output:
The following helpers are required:
```json
[
  {
    "Name": "GetPiDecimals",
    "Description": "Returns the first N decimals of Pi",
    "Inputs": [{"Properties": {"count": {"type": "integer", "description": "How many decimals"}}}],
    "Outputs": {"type": "string", "description": "The decimals"}
  },
  {
    "Name": "EvenOddRatio",
    "Description": "Computes the ratio of even to odd digits",
    "Inputs": [{"Properties": {"digits": {"type": "string", "description": "Digits"}}}],
    "Outputs": {"type": "number", "description": "The ratio"}
  }
]
```"#;

    #[test]
    fn test_reference_shape() {
        let gaps = extract_gaps(REFERENCE_DIAGNOSTIC).unwrap();
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].name, "GetPiDecimals");
        assert_eq!(gaps[0].input_schema[0].name, "count");
        assert_eq!(gaps[0].input_schema[0].kind, "integer");
        assert_eq!(gaps[1].output_schema.as_ref().unwrap().kind, "number");
        assert!(gaps.iter().all(|g| !g.name.is_empty()));
    }

    #[test]
    fn test_deterministic() {
        let first = extract_gaps(REFERENCE_DIAGNOSTIC);
        for _ in 0..5 {
            assert_eq!(extract_gaps(REFERENCE_DIAGNOSTIC), first);
        }
    }

    #[test]
    fn test_lowercase_parameter_list_shape() {
        let text = r#"missing: [{"name": "Fetch", "description": "d",
            "inputs": [{"name": "url", "type": "string"}, {"name": "a", "type": "number"}],
            "outputs": {"type": "string"}}]"#;
        let gaps = extract_gaps(text).unwrap();
        let names: Vec<_> = gaps[0].input_schema.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "url"]);
    }

    #[test]
    fn test_map_inputs_and_type_unions() {
        let text = r#"[{"name": "Lookup", "inputs": {"key": {"type": ["string", "null"]}}}]"#;
        let gaps = extract_gaps(text).unwrap();
        assert_eq!(gaps[0].input_schema[0].kind, "string|null");
        assert_eq!(gaps[0].description, "");
        assert_eq!(gaps[0].output_schema, None);
    }

    #[test]
    fn test_absent_payload() {
        assert_eq!(extract_gaps("The planner failed for unknown reasons."), None);
        assert_eq!(extract_gaps(""), None);
    }

    #[test]
    fn test_empty_array_is_absent() {
        assert_eq!(extract_gaps("helpers: []"), None);
    }

    #[test]
    fn test_malformed_payload() {
        assert_eq!(extract_gaps(r#"helpers: [{"Name": "Broken", }]"#), None);
        // Objects, but not gap-shaped.
        assert_eq!(extract_gaps(r#"[{"Name": 42}]"#), None);
        // Missing name.
        assert_eq!(extract_gaps(r#"[{"Description": "nameless"}]"#), None);
        // Blank name.
        assert_eq!(extract_gaps(r#"[{"Name": "   "}]"#), None);
    }

    #[test]
    fn test_malformed_payload_with_parameter_list() {
        let text = r#"Helpers required: [{"Name": "Fetch", "Inputs": [{"name": "url", "type": "string"}],}]"#;
        assert_eq!(extract_gaps(text), None);
    }

    #[test]
    fn test_multiple_blocks_are_ambiguous() {
        let text = r#"first [{"Name": "A"}] second [{"Name": "B"}]"#;
        assert_eq!(extract_gaps(text), None);
    }

    #[test]
    fn test_classify() {
        let extractor = GapExtractor::new();
        assert!(matches!(
            extractor.classify(REFERENCE_DIAGNOSTIC),
            DiagnosticClass::Gaps(ref g) if g.len() == 2
        ));
        assert_eq!(
            extractor.classify("HallucinatedHelpers: the template used helper 'Foo-Bar' which is not defined"),
            DiagnosticClass::Hallucinated
        );
        assert_eq!(
            extractor.classify("could not parse the plan"),
            DiagnosticClass::Malformed
        );
    }

    #[test]
    fn test_to_capability() {
        let gaps = extract_gaps(REFERENCE_DIAGNOSTIC).unwrap();
        let cap = gaps[1].to_capability();
        assert_eq!(cap.name, "EvenOddRatio");
        assert_eq!(cap.input_schema.len(), 1);
    }
}
