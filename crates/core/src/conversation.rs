//! Turn-by-turn conversation engine.
//!
//! Once a scenario is accepted, [`Conversation`] tracks the exchange with
//! the in-scenario character: the message history, the per-turn tutor
//! feedback batch, the narrative arc position, and the final resolution
//! verdict. [`ConversationEngine`] drives it against the oracle, enforcing
//! one outstanding turn at a time and rolling back cleanly on failure.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::{ChatReply, ChatRequest, TutorApi};
use crate::error::SessionError;
use crate::scenario::ScenarioProposal;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Tutor feedback for the most recent exchange.
///
/// Each reply carries a fresh batch that *replaces* the previous one; tips
/// are never merged across exchanges.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TutorTips {
    #[serde(default)]
    pub corrections: Vec<String>,
    #[serde(default)]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub cultural: Vec<String>,
}

/// Narrative position of the conversation, as judged by the oracle.
///
/// The ordering is meaningful: a conversation progresses from `Beginning`
/// towards `Resolution`. The client only records the value; it never
/// computes arc progress locally.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum ArcProgress {
    #[default]
    Beginning,
    Rising,
    Climax,
    Resolution,
}

/// Final outcome classification of a concluded conversation. Set exactly
/// once, when the oracle declares completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Success,
    Adapted,
    GracefulFail,
}

/// Turn state of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingReply,
    Complete,
}

/// The state of one conversation within an accepted scenario.
#[derive(Debug, Clone)]
pub struct Conversation {
    history: Vec<Message>,
    exchange_count: u32,
    tips: TutorTips,
    arc: ArcProgress,
    resolution: Option<ResolutionStatus>,
    state: TurnState,
}

impl Conversation {
    /// An empty conversation, used before any scenario is accepted.
    pub fn empty() -> Self {
        Self {
            history: Vec::new(),
            exchange_count: 0,
            tips: TutorTips::default(),
            arc: ArcProgress::Beginning,
            resolution: None,
            state: TurnState::Idle,
        }
    }

    /// Starts a conversation for a freshly accepted scenario.
    pub fn start(scenario: &ScenarioProposal) -> Self {
        let mut conversation = Self::empty();
        conversation.reset(scenario);
        conversation
    }

    /// Reinitializes to the scenario's opening: history holds the single
    /// synthesized assistant message, exchange count and arc are back at
    /// their starting values.
    pub fn reset(&mut self, scenario: &ScenarioProposal) {
        self.history = vec![Message::assistant(&scenario.opening_line)];
        self.exchange_count = 0;
        self.tips = TutorTips::default();
        self.arc = ArcProgress::Beginning;
        self.resolution = None;
        self.state = TurnState::Idle;
    }

    /// The ordered message history, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Number of user-authored messages sent so far.
    pub fn exchange_count(&self) -> u32 {
        self.exchange_count
    }

    /// The most recent tutor feedback batch.
    pub fn tips(&self) -> &TutorTips {
        &self.tips
    }

    pub fn arc(&self) -> ArcProgress {
        self.arc
    }

    pub fn resolution(&self) -> Option<ResolutionStatus> {
        self.resolution
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == TurnState::Complete
    }
}

/// Drives a [`Conversation`] against the oracle, one turn at a time.
pub struct ConversationEngine {
    api: Arc<dyn TutorApi>,
}

impl ConversationEngine {
    pub fn new(api: Arc<dyn TutorApi>) -> Self {
        Self { api }
    }

    /// Sends one user turn and applies the oracle's verdict.
    ///
    /// On success the user utterance and the character's reply are appended
    /// to history in that order, the tips batch is replaced, the arc marker
    /// is recorded, and the exchange count increases by one. If the oracle
    /// declares completion the resolution verdict is recorded and the
    /// conversation becomes `Complete`.
    ///
    /// On any failure (transport error or oracle inconsistency), history is
    /// left exactly as it was and the conversation returns to `Idle` so the
    /// turn can be retried.
    pub async fn send_turn(
        &self,
        conversation: &mut Conversation,
        scenario: &ScenarioProposal,
        utterance: &str,
    ) -> Result<ChatReply, SessionError> {
        let text = utterance.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput("message"));
        }
        match conversation.state {
            TurnState::AwaitingReply => return Err(SessionError::RequestInFlight),
            TurnState::Complete => return Err(SessionError::ConversationComplete),
            TurnState::Idle => {}
        }

        conversation.state = TurnState::AwaitingReply;
        let request = ChatRequest {
            message: text.to_string(),
            conversation_history: conversation.history.clone(),
            scenario: scenario.clone(),
            exchange_count: conversation.exchange_count,
        };

        let reply = match self.api.chat(request).await {
            Ok(reply) => reply,
            Err(e) => {
                conversation.state = TurnState::Idle;
                return Err(SessionError::Turn(e));
            }
        };

        // A completion verdict without a resolution is an oracle bug, not a
        // completion. Leave the conversation retryable.
        if reply.conversation_complete && reply.resolution_status.is_none() {
            conversation.state = TurnState::Idle;
            return Err(SessionError::ContractViolation(
                "conversation_complete is true but resolution_status is absent".to_string(),
            ));
        }

        conversation.history.push(Message::user(text));
        conversation
            .history
            .push(Message::assistant(&reply.character_response));
        conversation.tips = reply.tutor_tips.clone();
        conversation.arc = reply.arc_progress;
        conversation.exchange_count += 1;

        if reply.conversation_complete {
            conversation.resolution = reply.resolution_status;
            conversation.state = TurnState::Complete;
            info!(
                exchanges = conversation.exchange_count,
                resolution = ?conversation.resolution,
                "conversation concluded"
            );
        } else {
            conversation.state = TurnState::Idle;
            debug!(
                exchanges = conversation.exchange_count,
                arc = ?conversation.arc,
                "turn applied"
            );
        }

        Ok(reply)
    }
}
