//! Reading the coordinator's routing directives.
//!
//! The coordinator steers the directed phase with plain-text markers:
//!
//! * `NEXT SPEAKER: <name>` names the member who speaks next,
//! * `FINAL ANSWER` (any case) ends the conversation, followed by the result,
//! * `NEXT SPEAKER: functions.` means it is still waiting on one of its own
//!   capabilities and must be invoked again before anyone else speaks.
//!
//! The markers are configurable; see
//! [`ConversationConfig`](crate::utilities::config::ConversationConfig).

use regex::Regex;

use crate::utilities::config::ConversationConfig;

/// What a coordinator turn asks the scheduler to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorDirective {
    /// Raw next-speaker token, unresolved. Always `None` while delegating.
    pub next_speaker: Option<String>,
    pub complete: bool,
    pub delegating: bool,
    /// Text following the completion marker.
    pub final_answer: Option<String>,
}

/// Extracts [`CoordinatorDirective`]s from coordinator messages.
#[derive(Debug, Clone)]
pub struct DirectiveParser {
    next_speaker: Regex,
    completion: Regex,
    delegation: String,
}

impl DirectiveParser {
    pub fn new(
        next_speaker_marker: &str,
        completion_marker: &str,
        delegation_marker: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            next_speaker: Regex::new(&format!(
                r"{}\s*(\w+)",
                regex::escape(next_speaker_marker.trim_end())
            ))?,
            completion: Regex::new(&format!("(?i){}", regex::escape(completion_marker)))?,
            delegation: delegation_marker.to_string(),
        })
    }

    pub fn from_config(config: &ConversationConfig) -> Result<Self, regex::Error> {
        Self::new(
            &config.next_speaker_marker,
            &config.completion_marker,
            &config.delegation_marker,
        )
    }

    /// Parse every message of one coordinator turn.
    ///
    /// Completion is reported if any message carries the marker. The next
    /// speaker is the last token in the turn.
    pub fn parse<S: AsRef<str>>(&self, messages: &[S]) -> CoordinatorDirective {
        let mut directive = CoordinatorDirective::default();

        for message in messages {
            let text = message.as_ref();

            if let Some(m) = self.completion.find(text) {
                directive.complete = true;
                let answer = text[m.end()..]
                    .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace())
                    .trim_end();
                directive.final_answer = Some(answer.to_string());
            }
            if !self.delegation.is_empty() && text.contains(&self.delegation) {
                directive.delegating = true;
            }
            if let Some(token) = self
                .next_speaker
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .last()
            {
                directive.next_speaker = Some(token.as_str().to_string());
            }
        }

        if directive.delegating {
            directive.next_speaker = None;
        }
        directive
    }
}

/// Index of the participant a token designates.
///
/// An exact name wins; otherwise the first name (in the given order) that
/// starts with the token. Matching is case-sensitive.
pub fn resolve_speaker<'a, I>(token: &str, names: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    if token.is_empty() {
        return None;
    }
    let names: Vec<&str> = names.into_iter().collect();
    names
        .iter()
        .position(|name| *name == token)
        .or_else(|| names.iter().position(|name| name.starts_with(token)))
}
