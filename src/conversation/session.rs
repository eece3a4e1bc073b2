//! One end-to-end team conversation: compose, converse, release.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::SessionError;
use super::observer::ConversationObserver;
use super::scheduler::{ConversationScheduler, Transcript};
use super::transport::ConversationTransport;
use crate::agents::{AgentFactory, ResourceScope};
use crate::generation::StructuredGenerationService;
use crate::team::TeamComposer;
use crate::utilities::config::{AutoCrewConfig, ConversationConfig};

/// Runs a team conversation for an assignment.
///
/// Each [`run`](Self::run) composes a fresh team, talks it through the
/// assignment on a new thread, and releases every agent it created before
/// returning, whatever the outcome.
pub struct TeamSession {
    composer: TeamComposer,
    transport: Arc<dyn ConversationTransport>,
    config: ConversationConfig,
    observers: Vec<Arc<dyn ConversationObserver>>,
    cancel: CancellationToken,
}

impl TeamSession {
    pub fn new(
        generator: Arc<dyn StructuredGenerationService>,
        factory: Arc<dyn AgentFactory>,
        transport: Arc<dyn ConversationTransport>,
        config: &AutoCrewConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let composer = TeamComposer::new(generator, factory, config.composition.clone())
            .with_markers(
                config.conversation.next_speaker_marker.clone(),
                config.conversation.completion_marker.clone(),
            )
            .with_cancellation(cancel.clone());
        Self {
            composer,
            transport,
            config: config.conversation.clone(),
            observers: Vec::new(),
            cancel,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ConversationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Token that aborts a running session when cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, assignment: &str) -> Result<Transcript, SessionError> {
        let mut scope = ResourceScope::new();
        log::info!("Session {} started", scope.session_id());

        let result = self.converse(assignment, &mut scope).await;

        let report = scope.release_all().await;
        if !report.is_clean() {
            log::warn!(
                "Session {} left {} agent(s) unreleased",
                scope.session_id(),
                report.failures.len()
            );
        }
        result
    }

    async fn converse(
        &self,
        assignment: &str,
        scope: &mut ResourceScope,
    ) -> Result<Transcript, SessionError> {
        let team = self.composer.assemble(assignment, scope).await?;

        let guard = self
            .config
            .call_guard()
            .with_cancellation(self.cancel.clone());
        let thread = guard
            .run("open thread", self.transport.new_thread())
            .await
            .map_err(SessionError::Thread)?;

        let mut scheduler =
            ConversationScheduler::new(team.coordinator, team.members, thread, self.config.clone())
                .map_err(|source| SessionError::Conversation {
                    source,
                    log: Vec::new(),
                })?
                .with_call_guard(guard);
        for observer in &self.observers {
            scheduler = scheduler.with_observer(Arc::clone(observer));
        }

        let outcome = match scheduler.start(assignment).await {
            Ok(()) => scheduler.run().await,
            Err(e) => Err(e),
        };
        outcome.map_err(|source| SessionError::Conversation {
            source,
            log: scheduler.state().log().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::error::ConversationError;
    use crate::conversation::scheduler::TerminalReason;
    use crate::team::CompositionError;
    use crate::test_support::{StubFactory, StubGenerator, StubTransport};

    const TEAM: &str = r#"[
        {"name": "Ann", "role": "Writer", "instructions": "Write.", "description": "Writes"},
        {"name": "Bob", "role": "Editor", "instructions": "Edit.", "description": "Edits"}
    ]"#;
    const PM: &str = "Project Manager";

    fn session(generator: StubGenerator, factory: &StubFactory, transport: &StubTransport) -> TeamSession {
        TeamSession::new(
            Arc::new(generator),
            Arc::new(factory.clone()),
            Arc::new(transport.clone()),
            &AutoCrewConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_run_completes_and_releases_everything() {
        let factory = StubFactory::default();
        let transport = StubTransport::default()
            .reply(PM, &["Welcome."])
            .reply(PM, &["Ann, draft it. NEXT SPEAKER: Ann"])
            .reply("Ann - Writer", &["Draft: Ride on."])
            .reply(PM, &["FINAL ANSWER: Ride on."]);

        let transcript = session(StubGenerator::new(TEAM), &factory, &transport)
            .run("Write a slogan")
            .await
            .unwrap();

        assert_eq!(transcript.reason, TerminalReason::Completed);
        assert_eq!(transcript.final_answer.as_deref(), Some("Ride on."));
        assert_eq!(transcript.log[0].content, "Write a slogan");
        assert_eq!(transport.threads(), 1);

        let mut released = factory.released();
        released.sort();
        assert_eq!(released, vec!["Ann - Writer", "Bob - Editor", PM]);
    }

    #[tokio::test]
    async fn test_composition_failure_releases_nothing_extra() {
        let factory = StubFactory::default();
        let transport = StubTransport::default();
        let err = session(StubGenerator::new("not json"), &factory, &transport)
            .run("x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Composition(CompositionError::InvalidJson { .. })
        ));
        assert!(factory.created().is_empty());
        assert_eq!(transport.threads(), 0);
    }

    #[tokio::test]
    async fn test_conversation_error_still_releases() {
        let factory = StubFactory::default();
        let transport = StubTransport::default().failing("Bob - Editor");

        let err = session(StubGenerator::new(TEAM), &factory, &transport)
            .run("x")
            .await
            .unwrap_err();
        match err {
            SessionError::Conversation { source, log } => {
                assert!(matches!(source, ConversationError::Transport(_)));
                // user, coordinator, Ann
                assert_eq!(log.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(factory.released().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_session() {
        let factory = StubFactory::default();
        let transport = StubTransport::default();
        let session = session(StubGenerator::new(TEAM), &factory, &transport);
        session.cancellation().cancel();

        let err = session.run("x").await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(factory.created().is_empty());
    }
}
