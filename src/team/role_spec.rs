//! Role specifications and validation of the generated team payload.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::CompositionError;
use crate::agents::AgentDefinition;
use crate::utilities::json_blocks::single_fenced_block;
use crate::utilities::prompts::MEMBER_BOUNDARY_SUFFIX;

pub const MIN_TEAM_SIZE: usize = 2;
pub const MAX_TEAM_SIZE: usize = 5;

/// One team member as proposed by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    pub role: String,
    pub instructions: String,
    pub description: String,
}

impl RoleSpec {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        instructions: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            instructions: instructions.into(),
            description: description.into(),
        }
    }

    /// Name of the member's agent: `"<name> - <role>"`.
    pub fn agent_name(&self) -> String {
        format!("{} - {}", self.name, self.role)
    }

    /// Role instructions followed by the boundary-of-responsibility suffix
    /// and the member's name.
    pub fn agent_instructions(&self) -> String {
        format!("{}{}{}", self.instructions, MEMBER_BOUNDARY_SUFFIX, self.name)
    }

    pub fn to_definition(&self) -> AgentDefinition {
        AgentDefinition::new(
            self.agent_name(),
            self.description.clone(),
            self.agent_instructions(),
        )
    }
}

/// Validate a generator response into 2 to 5 role specs.
///
/// The response must be a bare JSON array or contain exactly one fenced code
/// block holding the array. No best-effort recovery is attempted.
pub fn parse_roles(text: &str) -> Result<Vec<RoleSpec>, CompositionError> {
    let trimmed = text.trim();
    let body = if trimmed.starts_with('[') {
        trimmed
    } else {
        single_fenced_block(trimmed).ok_or_else(|| CompositionError::InvalidJson {
            reason: "expected a JSON array or a single fenced code block".to_string(),
            raw: text.to_string(),
        })?
    };

    let value: Value = serde_json::from_str(body).map_err(|e| CompositionError::InvalidJson {
        reason: e.to_string(),
        raw: text.to_string(),
    })?;
    let items = value.as_array().ok_or_else(|| CompositionError::InvalidJson {
        reason: "top-level value is not an array".to_string(),
        raw: text.to_string(),
    })?;

    if !(MIN_TEAM_SIZE..=MAX_TEAM_SIZE).contains(&items.len()) {
        return Err(CompositionError::TeamSize { count: items.len() });
    }

    let mut roles = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        let object = item.as_object().ok_or_else(|| CompositionError::InvalidJson {
            reason: format!("team member #{} is not an object", index),
            raw: text.to_string(),
        })?;

        let field = |field: &'static str| {
            object
                .get(field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(CompositionError::MissingField { index, field })
        };
        let name = field("name")?;
        let role = field("role")?;
        let instructions = field("instructions")?;
        let description = field("description")?;

        if !seen.insert(name.clone()) {
            return Err(CompositionError::DuplicateName { name });
        }
        roles.push(RoleSpec {
            name,
            role,
            instructions,
            description,
        });
    }

    Ok(roles)
}
