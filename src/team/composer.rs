//! Turning a free-form assignment into a team of agents.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::error::CompositionError;
use super::role_spec::{parse_roles, RoleSpec};
use crate::agents::{Agent, AgentDefinition, AgentFactory, ResourceScope};
use crate::generation::{PromptVariables, StructuredGenerationService};
use crate::utilities::config::{CompositionConfig, ConversationConfig};
use crate::utilities::deadline::CallGuard;
use crate::utilities::prompts::{
    coordinator_instructions, RosterEntry, ASSIGNMENT_VARIABLE, TEAM_COMPOSITION_PROMPT,
};

const COORDINATOR_DESCRIPTION: &str =
    "Coordinates the team, routes turns and declares the final result";

/// A composed team: one coordinator plus its members in roster order.
#[derive(Debug, Clone)]
pub struct Team {
    pub coordinator: Agent,
    pub members: Vec<Agent>,
    /// The role specs the members were created from, same order.
    pub roles: Vec<RoleSpec>,
}

impl Team {
    /// Coordinator first, then members.
    pub fn participants(&self) -> impl Iterator<Item = &Agent> {
        std::iter::once(&self.coordinator).chain(self.members.iter())
    }

    /// Number of agents including the coordinator.
    pub fn size(&self) -> usize {
        self.members.len() + 1
    }
}

/// Composes teams with one structured-generation call per assignment.
pub struct TeamComposer {
    generator: Arc<dyn StructuredGenerationService>,
    factory: Arc<dyn AgentFactory>,
    config: CompositionConfig,
    next_speaker_marker: String,
    completion_marker: String,
    guard: CallGuard,
}

impl TeamComposer {
    pub fn new(
        generator: Arc<dyn StructuredGenerationService>,
        factory: Arc<dyn AgentFactory>,
        config: CompositionConfig,
    ) -> Self {
        let markers = ConversationConfig::default();
        let guard = config.call_guard();
        Self {
            generator,
            factory,
            config,
            next_speaker_marker: markers.next_speaker_marker,
            completion_marker: markers.completion_marker,
            guard,
        }
    }

    /// Markers the coordinator is told to use; must match the scheduler's.
    pub fn with_markers(
        mut self,
        next_speaker: impl Into<String>,
        completion: impl Into<String>,
    ) -> Self {
        self.next_speaker_marker = next_speaker.into();
        self.completion_marker = completion.into();
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.guard = self.guard.with_cancellation(cancel);
        self
    }

    pub fn config(&self) -> &CompositionConfig {
        &self.config
    }

    /// Ask the generator for a team and validate it.
    pub async fn compose(&self, assignment: &str) -> Result<Vec<RoleSpec>, CompositionError> {
        let started = Instant::now();
        let template = self
            .config
            .prompt_template
            .as_deref()
            .unwrap_or(TEAM_COMPOSITION_PROMPT);
        let mut variables = PromptVariables::new();
        variables.insert(ASSIGNMENT_VARIABLE.to_string(), assignment.to_string());

        let text = self
            .guard
            .run("compose team", self.generator.generate(template, &variables))
            .await
            .map_err(CompositionError::Generation)?;

        let roles = parse_roles(&text)?;
        if let Some(clash) = roles
            .iter()
            .find(|r| r.name == self.config.coordinator_name)
        {
            return Err(CompositionError::DuplicateName {
                name: clash.name.clone(),
            });
        }

        log::info!(
            "Composed a team of {} in {:.2?}: {}",
            roles.len(),
            started.elapsed(),
            roles
                .iter()
                .map(RoleSpec::agent_name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(roles)
    }

    /// Compose a team and create its agents in `scope`.
    ///
    /// On error, agents already created stay in `scope` for the caller to
    /// release; no team is returned.
    pub async fn assemble(
        &self,
        assignment: &str,
        scope: &mut ResourceScope,
    ) -> Result<Team, CompositionError> {
        let roles = self.compose(assignment).await?;
        self.instantiate(assignment, roles, scope).await
    }

    /// Create member agents for `roles` plus the coordinator.
    pub async fn instantiate(
        &self,
        assignment: &str,
        roles: Vec<RoleSpec>,
        scope: &mut ResourceScope,
    ) -> Result<Team, CompositionError> {
        let started = Instant::now();

        let mut members = Vec::with_capacity(roles.len());
        for role in &roles {
            members.push(self.spawn(role.to_definition(), scope).await?);
        }

        let roster: Vec<RosterEntry> = members
            .iter()
            .map(|agent| RosterEntry {
                name: agent.name().to_string(),
                description: agent.description().to_string(),
            })
            .collect();
        let instructions = coordinator_instructions(
            assignment,
            &roster,
            &self.next_speaker_marker,
            &self.completion_marker,
        )?;
        let coordinator = self
            .spawn(
                AgentDefinition::new(
                    self.config.coordinator_name.clone(),
                    COORDINATOR_DESCRIPTION,
                    instructions,
                ),
                scope,
            )
            .await?;

        log::info!(
            "Created {} agent(s) in {:.2?}",
            members.len() + 1,
            started.elapsed()
        );
        Ok(Team {
            coordinator,
            members,
            roles,
        })
    }

    async fn spawn(
        &self,
        definition: AgentDefinition,
        scope: &mut ResourceScope,
    ) -> Result<Agent, CompositionError> {
        let name = definition.name.clone();
        scope
            .spawn(self.factory.as_ref(), definition, &self.guard)
            .await
            .map_err(|source| CompositionError::Instantiation { name, source })
    }
}
