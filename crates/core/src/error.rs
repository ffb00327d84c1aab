//! Session-level error taxonomy.
//!
//! Every failure a collaborator can produce is mapped onto one of these
//! variants so callers can distinguish "try again" transport failures from
//! oracle inconsistencies and local validation failures without inspecting
//! message strings.

use thiserror::Error;

use crate::api::ApiError;
use crate::session::Phase;

/// Errors surfaced by the session orchestrator and its collaborators.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The locale catalog could not be fetched. Callers should fall back to
    /// [`crate::locale::fallback_languages`] instead of blocking the user.
    #[error("failed to fetch locale catalog: {0}")]
    Catalog(#[source] ApiError),

    /// Scenario generation or modification failed. The current proposal and
    /// the session phase are unchanged.
    #[error("scenario generation failed: {0}")]
    Generation(#[source] ApiError),

    /// A conversation turn failed. History is unchanged and the turn may be
    /// retried with the same or edited text.
    #[error("conversation turn failed: {0}")]
    Turn(#[source] ApiError),

    /// The oracle returned an internally inconsistent result, e.g. a
    /// completed conversation without a resolution verdict.
    #[error("oracle contract violation: {0}")]
    ContractViolation(String),

    /// Input was empty or whitespace-only. No network call was made.
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    /// Another request is already in flight for this session. Requests are
    /// rejected rather than queued.
    #[error("another request is already in flight")]
    RequestInFlight,

    /// The conversation has already concluded; no further turns are accepted.
    #[error("conversation is already complete")]
    ConversationComplete,

    /// The requested event is not legal in the session's current phase.
    #[error("'{event}' is not valid in phase {phase:?}")]
    InvalidTransition {
        phase: Phase,
        event: &'static str,
    },
}
