//! The turn-based conversation state machine.
//!
//! ```text
//! FirstPass { next } ──(everyone spoke once)──▶ Directed { next } ──(completion)──▶ Terminal
//!         │                                            │
//!         └──────────────(any error)───────────────────┴──────────▶ Terminal (aborted)
//! ```
//!
//! In the first pass the coordinator speaks first and then every member
//! once, in roster order. In the directed phase the coordinator speaks on
//! every other turn and names the member who answers next.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::error::ConversationError;
use super::message::{Message, MessageRole};
use super::observer::{ConversationObserver, TurnRecord};
use super::routing::{resolve_speaker, DirectiveParser};
use super::transport::ThreadHandle;
use crate::agents::Agent;
use crate::utilities::config::{ConversationConfig, UnroutablePolicy};
use crate::utilities::deadline::CallGuard;

/// Sender name recorded for user messages.
pub const USER_SENDER: &str = "user";

/// Turn slot of the coordinator; members follow at `1..`.
const COORDINATOR_SLOT: usize = 0;

/// Scheduling phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// Fixed-order round; `next` is the slot that speaks next.
    FirstPass { next: usize },
    /// Coordinator-routed turns; `next` is the member slot the coordinator
    /// named, or `None` when it is the coordinator's turn.
    Directed { next: Option<usize> },
    Terminal,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

/// Why the conversation reached [`Phase::Terminal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The coordinator declared the result.
    Completed,
    /// An error stopped the conversation.
    Aborted,
}

/// Everything one conversation owns. Only the scheduler mutates it.
#[derive(Debug)]
pub struct ConversationState {
    coordinator: Agent,
    participants: Vec<Agent>,
    log: Vec<Message>,
    phase: Phase,
    reason: Option<TerminalReason>,
    final_answer: Option<String>,
}

impl ConversationState {
    fn new(coordinator: Agent, participants: Vec<Agent>) -> Self {
        Self {
            coordinator,
            participants,
            log: Vec::new(),
            phase: Phase::FirstPass {
                next: COORDINATOR_SLOT,
            },
            reason: None,
            final_answer: None,
        }
    }

    pub fn coordinator(&self) -> &Agent {
        &self.coordinator
    }

    /// Members in roster order.
    pub fn participants(&self) -> &[Agent] {
        &self.participants
    }

    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.reason
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    fn slots(&self) -> usize {
        self.participants.len() + 1
    }

    fn agent(&self, slot: usize) -> &Agent {
        match slot {
            COORDINATOR_SLOT => &self.coordinator,
            n => &self.participants[n - 1],
        }
    }

    fn append(&mut self, sender: &str, role: MessageRole, content: String) -> &Message {
        let sequence = self.log.len() as u64;
        self.log.push(Message::new(sender, role, content, sequence));
        &self.log[self.log.len() - 1]
    }

    fn finish(&mut self, reason: TerminalReason) {
        self.phase = Phase::Terminal;
        self.reason = Some(reason);
    }
}

/// Result of one [`ConversationScheduler::advance`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Who spoke; `None` if the conversation was already terminal.
    pub speaker: Option<String>,
    /// Messages appended by this call.
    pub appended: usize,
    /// Phase after the call.
    pub phase: Phase,
}

impl TurnOutcome {
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// The final state of a finished conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub log: Vec<Message>,
    pub final_answer: Option<String>,
    pub reason: TerminalReason,
}

/// Drives a coordinator and its members over one conversation thread.
pub struct ConversationScheduler {
    state: ConversationState,
    thread: Box<dyn ThreadHandle>,
    parser: DirectiveParser,
    config: ConversationConfig,
    guard: CallGuard,
    observers: Vec<Arc<dyn ConversationObserver>>,
    turns: usize,
    directed_turns: u32,
    consecutive_delegations: u32,
    consecutive_unroutable: u32,
}

impl ConversationScheduler {
    pub fn new(
        coordinator: Agent,
        participants: Vec<Agent>,
        thread: Box<dyn ThreadHandle>,
        config: ConversationConfig,
    ) -> Result<Self, ConversationError> {
        if participants.is_empty() {
            return Err(ConversationError::EmptyTeam);
        }
        let parser = DirectiveParser::from_config(&config)?;
        let guard = config.call_guard();
        Ok(Self {
            state: ConversationState::new(coordinator, participants),
            thread,
            parser,
            config,
            guard,
            observers: Vec::new(),
            turns: 0,
            directed_turns: 0,
            consecutive_delegations: 0,
            consecutive_unroutable: 0,
        })
    }

    pub fn with_call_guard(mut self, guard: CallGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ConversationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Post the assignment to the thread as the user's message.
    pub async fn start(&mut self, assignment: &str) -> Result<(), ConversationError> {
        let posted = self
            .guard
            .run("post assignment", self.thread.add_user_message(assignment))
            .await
            .map_err(ConversationError::Transport);
        if let Err(e) = posted {
            return Err(self.abort(e));
        }
        let message = self
            .state
            .append(USER_SENDER, MessageRole::User, assignment.to_string());
        for observer in &self.observers {
            observer.on_message(message);
        }
        Ok(())
    }

    /// Take one turn.
    ///
    /// Once the conversation is terminal this is a no-op that reports the
    /// terminal phase. An error aborts the conversation.
    pub async fn advance(&mut self) -> Result<TurnOutcome, ConversationError> {
        let before = self.state.log.len();
        let phase = self.state.phase;
        let started = Instant::now();

        let speaker = match phase {
            Phase::FirstPass { next } => self.first_pass_turn(next).await,
            Phase::Directed { next: Some(slot) } => self.member_turn(slot).await,
            Phase::Directed { next: None } => self.coordinator_turn().await,
            Phase::Terminal => {
                return Ok(TurnOutcome {
                    speaker: None,
                    appended: 0,
                    phase: Phase::Terminal,
                })
            }
        };
        let speaker = match speaker {
            Ok(speaker) => speaker,
            Err(e) => return Err(self.abort(e)),
        };

        self.turns += 1;
        let record = TurnRecord {
            turn: self.turns,
            speaker: speaker.clone(),
            phase,
            messages: self.state.log.len() - before,
            elapsed: started.elapsed(),
        };
        for observer in &self.observers {
            observer.on_turn(&record);
        }
        if let Some(reason) = self.state.reason {
            for observer in &self.observers {
                observer.on_terminal(reason);
            }
        }

        Ok(TurnOutcome {
            speaker: Some(speaker),
            appended: record.messages,
            phase: self.state.phase,
        })
    }

    /// Advance until the conversation is terminal.
    pub async fn run(&mut self) -> Result<Transcript, ConversationError> {
        while !self.state.is_terminal() {
            self.advance().await?;
        }
        Ok(self.transcript())
    }

    /// Snapshot of the log and outcome so far.
    pub fn transcript(&self) -> Transcript {
        Transcript {
            log: self.state.log.clone(),
            final_answer: self.state.final_answer.clone(),
            reason: self.state.reason.unwrap_or(TerminalReason::Aborted),
        }
    }

    async fn first_pass_turn(&mut self, slot: usize) -> Result<String, ConversationError> {
        let mut replies = self.speak(slot).await?;

        if slot == COORDINATOR_SLOT {
            let mut reinvocations = 0;
            while self.parser.parse(&replies).delegating {
                reinvocations += 1;
                self.check_delegation_limit(reinvocations)?;
                replies = self.speak(slot).await?;
            }
        }

        let next = slot + 1;
        self.state.phase = if next < self.state.slots() {
            Phase::FirstPass { next }
        } else {
            log::debug!("First pass complete; coordinator takes over routing");
            Phase::Directed { next: None }
        };
        Ok(self.state.agent(slot).name().to_string())
    }

    async fn member_turn(&mut self, slot: usize) -> Result<String, ConversationError> {
        self.speak(slot).await?;
        self.state.phase = Phase::Directed { next: None };
        Ok(self.state.agent(slot).name().to_string())
    }

    async fn coordinator_turn(&mut self) -> Result<String, ConversationError> {
        if self.directed_turns >= self.config.max_directed_turns {
            return Err(ConversationError::TurnLimitExceeded {
                limit: self.config.max_directed_turns,
            });
        }
        self.directed_turns += 1;

        let replies = self.speak(COORDINATOR_SLOT).await?;
        let directive = self.parser.parse(&replies);
        let coordinator = self.state.coordinator.name().to_string();

        if directive.complete {
            log::info!("'{}' declared the result", coordinator);
            self.state.final_answer = directive.final_answer;
            self.state.finish(TerminalReason::Completed);
            return Ok(coordinator);
        }

        if directive.delegating {
            self.consecutive_delegations += 1;
            self.check_delegation_limit(self.consecutive_delegations)?;
            log::debug!("'{}' is delegating; invoking it again", coordinator);
            return Ok(coordinator);
        }
        self.consecutive_delegations = 0;

        let target = directive.next_speaker.as_deref().and_then(|token| {
            resolve_speaker(token, self.state.participants.iter().map(Agent::name))
        });
        match target {
            Some(index) => {
                self.consecutive_unroutable = 0;
                let slot = index + 1;
                log::debug!("Routing to '{}'", self.state.agent(slot).name());
                self.state.phase = Phase::Directed { next: Some(slot) };
            }
            None => self.handle_unroutable(directive.next_speaker)?,
        }
        Ok(coordinator)
    }

    fn handle_unroutable(&mut self, token: Option<String>) -> Result<(), ConversationError> {
        self.consecutive_unroutable += 1;
        let attempts = self.consecutive_unroutable;
        match self.config.unroutable {
            UnroutablePolicy::Reprompt { max_consecutive } if attempts <= max_consecutive => {
                log::warn!(
                    "No routable speaker in coordinator turn (token: {:?}); reprompting ({}/{})",
                    token,
                    attempts,
                    max_consecutive
                );
                Ok(())
            }
            _ => Err(ConversationError::Unroutable { token, attempts }),
        }
    }

    fn check_delegation_limit(&self, count: u32) -> Result<(), ConversationError> {
        let limit = self.config.max_delegation_reinvocations;
        if count > limit {
            return Err(ConversationError::DelegationLimit {
                agent: self.state.coordinator.name().to_string(),
                limit,
            });
        }
        Ok(())
    }

    /// Invoke the agent in `slot` on the thread and append its replies.
    async fn speak(&mut self, slot: usize) -> Result<Vec<String>, ConversationError> {
        let agent = self.state.agent(slot);
        let operation = format!("turn of '{}'", agent.name());
        let replies = self
            .guard
            .run(&operation, self.thread.invoke(agent))
            .await
            .map_err(ConversationError::Transport)?;

        let sender = agent.name().to_string();
        let role = if slot == COORDINATOR_SLOT {
            MessageRole::Coordinator
        } else {
            MessageRole::Member
        };

        let mut contents = Vec::with_capacity(replies.len());
        for reply in replies {
            let message = self.state.append(&sender, role, reply.content.clone());
            for observer in &self.observers {
                observer.on_message(message);
            }
            contents.push(reply.content);
        }
        Ok(contents)
    }

    fn abort(&mut self, error: ConversationError) -> ConversationError {
        log::error!("Conversation aborted: {}", error);
        self.state.finish(TerminalReason::Aborted);
        for observer in &self.observers {
            observer.on_terminal(TerminalReason::Aborted);
        }
        error
    }
}
