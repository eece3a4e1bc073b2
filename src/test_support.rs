//! In-memory collaborators shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::agents::{Agent, AgentDefinition, AgentFactory, AgentHandle};
use crate::capabilities::CapabilityRegistry;
use crate::conversation::{ConversationTransport, ThreadHandle, ThreadMessage};
use crate::generation::{PromptVariables, StructuredGenerationService};
use crate::planning::{PlanOutcome, PlanningService};
use crate::utilities::errors::BoxError;

/// Route `log` output to the test harness.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A planner diagnostic embedding one gap entry per name.
pub(crate) fn gap_diagnostic<S: AsRef<str>>(names: &[S]) -> String {
    let entries: Vec<serde_json::Value> = names
        .iter()
        .map(|name| {
            serde_json::json!({
                "Name": name.as_ref(),
                "Description": format!("Provides {}", name.as_ref()),
                "Inputs": [{"Properties": {"input": {"type": "string", "description": "Input"}}}],
                "Outputs": {"type": "string", "description": "Result"}
            })
        })
        .collect();
    format!(
        "Unable to create plan for goal with available functions.\nAdditional helpers may be required:\n{}",
        serde_json::to_string_pretty(&entries).unwrap()
    )
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FactoryState {
    created: Vec<AgentDefinition>,
    released: Vec<String>,
    create_calls: usize,
    fail_create: HashSet<String>,
    fail_release: HashSet<String>,
}

/// Agent factory whose handles answer `"<name>: <input>"`.
#[derive(Clone, Default)]
pub(crate) struct StubFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl StubFactory {
    pub fn failing_create(self, name: &str) -> Self {
        self.state.lock().fail_create.insert(name.to_string());
        self
    }

    pub fn failing_release(self, name: &str) -> Self {
        self.state.lock().fail_release.insert(name.to_string());
        self
    }

    /// Definitions of successfully created agents, in creation order.
    pub fn created(&self) -> Vec<AgentDefinition> {
        self.state.lock().created.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().create_calls
    }

    /// Names of successfully released agents, in release order.
    pub fn released(&self) -> Vec<String> {
        self.state.lock().released.clone()
    }
}

#[async_trait]
impl AgentFactory for StubFactory {
    async fn create(&self, definition: &AgentDefinition) -> Result<Arc<dyn AgentHandle>, BoxError> {
        let mut state = self.state.lock();
        state.create_calls += 1;
        if state.fail_create.contains(&definition.name) {
            return Err(format!("backend refused to create '{}'", definition.name).into());
        }
        state.created.push(definition.clone());
        Ok(Arc::new(StubHandle {
            name: definition.name.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct StubHandle {
    name: String,
    state: Arc<Mutex<FactoryState>>,
}

#[async_trait]
impl AgentHandle for StubHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: &str) -> Result<String, BoxError> {
        Ok(format!("{}: {}", self.name, input))
    }

    async fn release(&self) -> Result<(), BoxError> {
        let mut state = self.state.lock();
        if state.fail_release.contains(&self.name) {
            return Err(format!("agent '{}' is busy", self.name).into());
        }
        state.released.push(self.name.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

type PlanFn = dyn Fn(&str, &CapabilityRegistry) -> PlanOutcome + Send + Sync;

enum PlanScript {
    Queue(Mutex<VecDeque<Result<PlanOutcome, BoxError>>>),
    Func(Box<PlanFn>),
}

/// Planner driven by a fixed queue of outcomes or by a closure.
#[derive(Clone)]
pub(crate) struct StubPlanner {
    script: Arc<PlanScript>,
    attempts: Arc<Mutex<usize>>,
}

impl StubPlanner {
    pub fn scripted(outcomes: Vec<Result<PlanOutcome, BoxError>>) -> Self {
        Self {
            script: Arc::new(PlanScript::Queue(Mutex::new(outcomes.into()))),
            attempts: Arc::default(),
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &CapabilityRegistry) -> PlanOutcome + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(PlanScript::Func(Box::new(f))),
            attempts: Arc::default(),
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl PlanningService for StubPlanner {
    async fn attempt(
        &self,
        goal: &str,
        capabilities: &CapabilityRegistry,
    ) -> Result<PlanOutcome, BoxError> {
        *self.attempts.lock() += 1;
        match self.script.as_ref() {
            PlanScript::Queue(queue) => queue
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted outcome left".into())),
            PlanScript::Func(f) => Ok(f(goal, capabilities)),
        }
    }
}

// ---------------------------------------------------------------------------
// Structured generation
// ---------------------------------------------------------------------------

/// Generator that always answers with the same text.
#[derive(Clone)]
pub(crate) struct StubGenerator {
    response: Result<String, String>,
    calls: Arc<Mutex<Vec<(String, PromptVariables)>>>,
}

impl StubGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
            calls: Arc::default(),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            response: Err(reason.into()),
            calls: Arc::default(),
        }
    }

    /// `(template, variables)` of every call.
    pub fn calls(&self) -> Vec<(String, PromptVariables)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StructuredGenerationService for StubGenerator {
    async fn generate(
        &self,
        prompt_template: &str,
        variables: &PromptVariables,
    ) -> Result<String, BoxError> {
        self.calls
            .lock()
            .push((prompt_template.to_string(), variables.clone()));
        self.response.clone().map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// Conversation transport
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TransportState {
    replies: HashMap<String, VecDeque<Vec<String>>>,
    failing: HashSet<String>,
    invocations: Vec<String>,
    user_messages: Vec<String>,
    threads: usize,
}

/// Transport whose agents answer from per-agent reply queues.
///
/// An agent with no scripted reply left answers `"<name> reporting"`.
#[derive(Clone, Default)]
pub(crate) struct StubTransport {
    state: Arc<Mutex<TransportState>>,
}

impl StubTransport {
    /// Queue one turn's messages for `agent`.
    pub fn reply(self, agent: &str, messages: &[&str]) -> Self {
        self.state
            .lock()
            .replies
            .entry(agent.to_string())
            .or_default()
            .push_back(messages.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn failing(self, agent: &str) -> Self {
        self.state.lock().failing.insert(agent.to_string());
        self
    }

    /// Names of invoked agents, in invocation order.
    pub fn invocations(&self) -> Vec<String> {
        self.state.lock().invocations.clone()
    }

    pub fn user_messages(&self) -> Vec<String> {
        self.state.lock().user_messages.clone()
    }

    pub fn threads(&self) -> usize {
        self.state.lock().threads
    }
}

#[async_trait]
impl ConversationTransport for StubTransport {
    async fn new_thread(&self) -> Result<Box<dyn ThreadHandle>, BoxError> {
        self.state.lock().threads += 1;
        Ok(Box::new(StubThread {
            state: Arc::clone(&self.state),
        }))
    }
}

struct StubThread {
    state: Arc<Mutex<TransportState>>,
}

#[async_trait]
impl ThreadHandle for StubThread {
    async fn add_user_message(&mut self, text: &str) -> Result<(), BoxError> {
        self.state.lock().user_messages.push(text.to_string());
        Ok(())
    }

    async fn invoke(&mut self, agent: &Agent) -> Result<Vec<ThreadMessage>, BoxError> {
        let mut state = self.state.lock();
        state.invocations.push(agent.name().to_string());
        if state.failing.contains(agent.name()) {
            return Err(format!("agent '{}' crashed", agent.name()).into());
        }
        let messages = state
            .replies
            .get_mut(agent.name())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| vec![format!("{} reporting", agent.name())]);
        Ok(messages.into_iter().map(ThreadMessage::new).collect())
    }
}
