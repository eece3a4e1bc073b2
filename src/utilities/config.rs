//! Configuration for planning loops, team composition and conversations.
//!
//! Loaded from YAML with per-field defaults, then optionally overridden from
//! `AUTOCREW_*` environment variables:
//!
//! ```yaml
//! planning:
//!   max_iterations: 4
//! conversation:
//!   max_directed_turns: 20
//!   unroutable:
//!     mode: reprompt
//!     max_consecutive: 2
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utilities::deadline::CallGuard;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {variable}: '{value}'")]
    InvalidEnv { variable: String, value: String },
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Complete configuration for an autocrew deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoCrewConfig {
    #[serde(default)]
    pub planning: PlanningConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub composition: CompositionConfig,
}

impl AutoCrewConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded configuration from {}", path.as_ref().display());
        Self::from_yaml_str(&content)
    }

    /// Apply `AUTOCREW_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "AUTOCREW_PLANNING_MAX_ITERATIONS")? {
            self.planning.max_iterations = v;
        }
        if let Some(v) = parse_var(&lookup, "AUTOCREW_PLANNING_CALL_TIMEOUT_SECS")? {
            self.planning.call_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "AUTOCREW_CONVERSATION_CALL_TIMEOUT_SECS")? {
            self.conversation.call_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "AUTOCREW_CONVERSATION_MAX_DIRECTED_TURNS")? {
            self.conversation.max_directed_turns = v;
        }
        if let Some(v) = parse_var(&lookup, "AUTOCREW_COMPOSITION_CALL_TIMEOUT_SECS")? {
            self.composition.call_timeout_secs = v;
        }
        if let Some(name) = lookup("AUTOCREW_COORDINATOR_NAME") {
            self.composition.coordinator_name = name;
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, variable: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(variable) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                variable: variable.to_string(),
                value,
            }),
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Settings for [`GoalPlanningLoop`](crate::planning::GoalPlanningLoop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// Default iteration bound callers pass to `run`.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Timeout for each plan attempt and each sub-agent creation.
    #[serde(default = "default_planning_timeout")]
    pub call_timeout_secs: u64,
}

fn default_max_iterations() -> usize { 5 }
fn default_planning_timeout() -> u64 { 120 }

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            call_timeout_secs: default_planning_timeout(),
        }
    }
}

impl PlanningConfig {
    /// A fresh call guard with this config's timeout.
    pub fn call_guard(&self) -> CallGuard {
        CallGuard::new(Duration::from_secs(self.call_timeout_secs))
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// What the scheduler does when the coordinator names no routable speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UnroutablePolicy {
    /// Abort the conversation immediately.
    Fail,
    /// Re-invoke the coordinator, up to `max_consecutive` times in a row.
    Reprompt { max_consecutive: u32 },
}

impl Default for UnroutablePolicy {
    fn default() -> Self {
        Self::Reprompt { max_consecutive: 3 }
    }
}

/// Settings for [`ConversationScheduler`](crate::conversation::ConversationScheduler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Timeout for each thread operation and agent turn.
    #[serde(default = "default_conversation_timeout")]
    pub call_timeout_secs: u64,
    /// Upper bound on coordinator turns in the directed phase.
    #[serde(default = "default_max_directed_turns")]
    pub max_directed_turns: u32,
    /// Upper bound on back-to-back coordinator re-invocations while delegating.
    #[serde(default = "default_max_delegation_reinvocations")]
    pub max_delegation_reinvocations: u32,
    #[serde(default)]
    pub unroutable: UnroutablePolicy,
    /// Marker preceding the next speaker's name.
    #[serde(default = "default_next_speaker_marker")]
    pub next_speaker_marker: String,
    /// Marker declaring the conversation complete.
    #[serde(default = "default_completion_marker")]
    pub completion_marker: String,
    /// Marker the coordinator emits while a sub-capability is still working.
    #[serde(default = "default_delegation_marker")]
    pub delegation_marker: String,
}

fn default_conversation_timeout() -> u64 { 300 }
fn default_max_directed_turns() -> u32 { 40 }
fn default_max_delegation_reinvocations() -> u32 { 8 }
fn default_next_speaker_marker() -> String { "NEXT SPEAKER:".to_string() }
fn default_completion_marker() -> String { "FINAL ANSWER".to_string() }
fn default_delegation_marker() -> String { "NEXT SPEAKER: functions.".to_string() }

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_conversation_timeout(),
            max_directed_turns: default_max_directed_turns(),
            max_delegation_reinvocations: default_max_delegation_reinvocations(),
            unroutable: UnroutablePolicy::default(),
            next_speaker_marker: default_next_speaker_marker(),
            completion_marker: default_completion_marker(),
            delegation_marker: default_delegation_marker(),
        }
    }
}

impl ConversationConfig {
    /// A fresh call guard with this config's timeout.
    pub fn call_guard(&self) -> CallGuard {
        CallGuard::new(Duration::from_secs(self.call_timeout_secs))
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Settings for [`TeamComposer`](crate::team::TeamComposer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionConfig {
    /// Timeout for the generation call and each agent creation.
    #[serde(default = "default_composition_timeout")]
    pub call_timeout_secs: u64,
    /// Name given to the coordinator agent.
    #[serde(default = "default_coordinator_name")]
    pub coordinator_name: String,
    /// Replacement for the built-in composition prompt.
    #[serde(default)]
    pub prompt_template: Option<String>,
}

fn default_composition_timeout() -> u64 { 180 }
fn default_coordinator_name() -> String { "Project Manager".to_string() }

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_composition_timeout(),
            coordinator_name: default_coordinator_name(),
            prompt_template: None,
        }
    }
}

impl CompositionConfig {
    /// A fresh call guard with this config's timeout.
    pub fn call_guard(&self) -> CallGuard {
        CallGuard::new(Duration::from_secs(self.call_timeout_secs))
    }
}
