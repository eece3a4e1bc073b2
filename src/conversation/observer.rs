//! Observer hooks for conversation progress.
//!
//! The scheduler never formats or displays messages itself. Anything that
//! wants to show the exchange (console, UI, transcript store) implements
//! [`ConversationObserver`]; every method has a no-op default.

use std::time::Duration;

use serde::Serialize;

use super::message::Message;
use super::scheduler::{Phase, TerminalReason};

/// Summary of one scheduler turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnRecord {
    /// 1-based turn counter over the whole conversation.
    pub turn: usize,
    pub speaker: String,
    /// Phase the turn was taken in.
    pub phase: Phase,
    /// Messages the turn appended to the log.
    pub messages: usize,
    pub elapsed: Duration,
}

pub trait ConversationObserver: Send + Sync {
    /// Called for every message appended to the log, in order.
    fn on_message(&self, _message: &Message) {}

    /// Called after each turn.
    fn on_turn(&self, _turn: &TurnRecord) {}

    /// Called once when the conversation reaches its terminal state.
    fn on_terminal(&self, _reason: TerminalReason) {}
}

/// Writes the exchange to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl ConversationObserver for LoggingObserver {
    fn on_message(&self, message: &Message) {
        log::info!(
            "#{} {} ({}): {}",
            message.sequence_number,
            message.sender_name,
            message.role,
            message.content
        );
    }

    fn on_turn(&self, turn: &TurnRecord) {
        log::debug!(
            "Turn {} by '{}' appended {} message(s) in {:.2?}",
            turn.turn,
            turn.speaker,
            turn.messages,
            turn.elapsed
        );
    }

    fn on_terminal(&self, reason: TerminalReason) {
        log::info!("Conversation finished: {:?}", reason);
    }
}
